//! Markdown engine backed by pulldown-cmark.

use super::{Engine, EngineError};
use crate::config::MarkdownConfig;
use crate::data::Data;
use pulldown_cmark::{Options, Parser, html as md_html};

pub struct MarkdownEngine {
    config: MarkdownConfig,
}

impl MarkdownEngine {
    pub fn new(config: MarkdownConfig) -> Self {
        Self { config }
    }
}

impl Engine for MarkdownEngine {
    fn name(&self) -> &str {
        "md"
    }

    fn render(&self, content: &str, _data: &Data, _filename: &str) -> Result<String, EngineError> {
        Ok(render_markdown(content, &self.config))
    }
}

fn options(config: &MarkdownConfig) -> Options {
    let mut options = Options::empty();
    if config.tables {
        options.insert(Options::ENABLE_TABLES);
    }
    if config.footnotes {
        options.insert(Options::ENABLE_FOOTNOTES);
    }
    if config.strikethrough {
        options.insert(Options::ENABLE_STRIKETHROUGH);
    }
    if config.tasklists {
        options.insert(Options::ENABLE_TASKLISTS);
    }
    if config.smart_punctuation {
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
    }
    options
}

/// Convert markdown to HTML.
pub fn render_markdown(content: &str, config: &MarkdownConfig) -> String {
    let parser = Parser::new_ext(content, options(config));
    let mut html = String::with_capacity(content.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}

/// Convert a single line of markdown, without the wrapping paragraph.
pub fn render_inline(content: &str, config: &MarkdownConfig) -> String {
    let html = render_markdown(content, config);
    let trimmed = html.trim_end();
    match trimmed
        .strip_prefix("<p>")
        .and_then(|s| s.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner.to_string(),
        _ => html,
    }
}
