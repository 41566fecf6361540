//! Markdown to HTML rendering used for assistant answers.
//! The renderer is injected so hosts can plug in their own sanitizing pipeline.

use std::fmt;

/// Error from markdown rendering.
#[derive(Debug, Clone)]
pub struct RenderError(pub String);

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RenderError {}

/// Renderer abstraction: convert markdown to HTML.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Default implementation using pulldown-cmark.
pub struct PulldownMarkdownRenderer;

impl MarkdownRenderer for PulldownMarkdownRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        use pulldown_cmark::{Options, Parser, html};
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, options));
        Ok(out)
    }
}

/// Escapes text for inclusion in HTML (user turns are never rendered as
/// markdown).
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders `markdown`, falling back to escaped text when the renderer fails.
pub(crate) fn render_or_escape(renderer: &dyn MarkdownRenderer, markdown: &str) -> String {
    match renderer.render(markdown) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(error = %e, "markdown render failed, showing escaped text");
            escape_html(markdown)
        }
    }
}
