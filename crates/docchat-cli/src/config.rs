use std::{env, path::Path, path::PathBuf};

/// Load `.env` files (crate directory first, then the working directory).
pub fn init() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

/// Read and parse an environment variable. Unset and empty values are `None`;
/// unparsable values are logged and treated as unset.
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(val) => Some(val),
        Err(_) => {
            tracing::error!("Error parsing {}", key);
            None
        }
    }
}

/// Default database location: `<data dir>/docchat/docchat.sqlite3`.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docchat")
        .join("docchat.sqlite3")
}
