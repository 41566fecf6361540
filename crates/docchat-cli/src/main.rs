//! Terminal front end for the documentation chat pipeline.
//!
//! Stands in for the embedded widget: it submits queries, shows the progress
//! label while an answer streams in, and prints committed messages.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use docchat_core::observability::init_observability;
use docchat_core::prelude::*;
use tokio::io::{AsyncBufReadExt as _, BufReader};

#[derive(Parser, Debug)]
#[command(name = "docchat", about = "Chat with the documentation assistant")]
struct Cli {
    /// Chat service base URL (falls back to DOCCHAT_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,
    /// Page URL reported as the reader's location (falls back to DOCCHAT_PAGE_URL).
    #[arg(long)]
    page_url: Option<String>,
    /// Request timeout in seconds (falls back to DOCCHAT_TIMEOUT_SECS).
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// SQLite history file (falls back to DOCCHAT_DB_PATH).
    #[arg(long)]
    db: Option<PathBuf>,
    /// Keep the partial answer when a stream fails midway.
    #[arg(long)]
    keep_partial: bool,
    /// Ask a single question and exit instead of starting a prompt.
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init();
    init_observability();
    let cli = Cli::parse();

    let mut client_config = ChatClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.clone() {
        client_config = client_config.base_url(base_url);
    }
    if let Some(secs) = cli.timeout_secs {
        client_config = client_config.timeout(Duration::from_secs(secs));
    }
    let timeout = client_config.timeout;
    let client = ChatClient::new(client_config)?;

    let page_url = cli
        .page_url
        .clone()
        .or_else(|| config::get_env("DOCCHAT_PAGE_URL"))
        .unwrap_or_default();
    let db_path = cli
        .db
        .clone()
        .or_else(|| config::get_env("DOCCHAT_DB_PATH"))
        .unwrap_or_else(config::default_db_path);

    let store = Arc::new(ChatStore::new(&db_path));
    let mut consumer = ChatConsumer::new(
        Arc::new(client),
        store.clone(),
        Arc::new(PulldownMarkdownRenderer),
        ConsumerOptions::default()
            .page_url(page_url)
            .timeout(timeout)
            .keep_partial_on_error(cli.keep_partial),
    );
    spawn_progress_printer(&consumer);

    if !cli.query.is_empty() {
        let query = cli.query.join(" ");
        ask(&mut consumer, &query).await?;
        store.close().await;
        return Ok(());
    }

    let restored = consumer.load_history().await;
    eprintln!(
        "docchat: {restored} stored messages in {}. Commands: /history, /clear, /quit",
        db_path.display()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => {
                for message in consumer.messages() {
                    print_message(message);
                }
            }
            "/clear" => {
                let remote = consumer.clear_session().await?;
                eprintln!(
                    "history cleared{}",
                    if remote { "" } else { " locally (server did not confirm)" }
                );
            }
            query => ask(&mut consumer, query).await?,
        }
    }
    store.close().await;
    Ok(())
}

async fn ask(consumer: &mut ChatConsumer, query: &str) -> anyhow::Result<()> {
    let before = consumer.messages().len();
    let outcome = consumer.submit(query).await?;
    if let SubmitOutcome::Failed(err) = &outcome {
        tracing::debug!(error = ?err, "request failed");
    }
    // The user turn was echoed by the terminal already.
    for message in consumer.messages().iter().skip(before + 1) {
        print_message(message);
    }
    Ok(())
}

fn print_message(message: &ChatMessage) {
    if message.is_final {
        println!("[{}]\n{}", message.turn, message.content.trim_end());
    } else {
        println!("  ({})", message.content);
    }
}

fn spawn_progress_printer(consumer: &ChatConsumer) {
    let mut progress = consumer.subscribe_progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let label = progress.borrow_and_update().clone();
            if let Some(label) = label {
                eprintln!("  … {label}");
            }
        }
    });
}
