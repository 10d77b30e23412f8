//! Format registry: maps file extensions to how a file is loaded and rendered.
//!
//! Extensions may contain several dots (`.page.json`). Lookups pick the
//! longest registered extension that the filename ends with, so
//! `index.page.json` is a data page while `site.json` is a plain data file.

use std::path::Path;

/// How a source file becomes part of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Rendered through engines and layouts.
    Page,
    /// Loaded as text, not rendered, passed through processors.
    Asset,
}

/// How the raw file contents are turned into data and content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// Optional front matter followed by a template body.
    FrontMatter,
    /// JSON document.
    Json,
    /// TOML document.
    Toml,
    /// YAML document.
    Yaml,
    /// Plain text, no data.
    Text,
}

/// A registered file format.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    /// Extension including the leading dot, e.g. `.md` or `.page.json`.
    pub ext: String,
    pub page_type: Option<PageType>,
    pub loader: Loader,
    /// Engines applied to page content, in order.
    pub engines: Vec<String>,
    /// Usable as `_data.*` or inside `_data/` folders.
    pub data_file: bool,
    /// Usable as a component template or an include.
    pub template: bool,
}

impl Format {
    pub fn page(ext: &str, loader: Loader, engines: &[&str]) -> Self {
        Self {
            ext: ext.to_string(),
            page_type: Some(PageType::Page),
            loader,
            engines: engines.iter().map(|e| e.to_string()).collect(),
            data_file: false,
            template: loader == Loader::FrontMatter,
        }
    }

    pub fn asset(ext: &str) -> Self {
        Self {
            ext: ext.to_string(),
            page_type: Some(PageType::Asset),
            loader: Loader::Text,
            engines: Vec::new(),
            data_file: false,
            template: false,
        }
    }

    pub fn data(ext: &str, loader: Loader) -> Self {
        Self {
            ext: ext.to_string(),
            page_type: None,
            loader,
            engines: Vec::new(),
            data_file: true,
            template: false,
        }
    }
}

/// All known formats.
#[derive(Debug, Clone, Default)]
pub struct Formats {
    entries: Vec<Format>,
}

impl Formats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stock formats plus the configured asset extensions.
    pub fn stock(assets: &[String]) -> Self {
        let mut formats = Self::new();
        formats.set(Format::page(".md", Loader::FrontMatter, &["md"]));
        formats.set(Format::page(".tera", Loader::FrontMatter, &["tera"]));
        formats.set(Format::page(".page.json", Loader::Json, &[]));
        formats.set(Format::page(".page.toml", Loader::Toml, &[]));
        formats.set(Format::page(".page.yaml", Loader::Yaml, &[]));
        formats.set(Format::page(".page.yml", Loader::Yaml, &[]));
        formats.set(Format::data(".json", Loader::Json));
        formats.set(Format::data(".toml", Loader::Toml));
        formats.set(Format::data(".yaml", Loader::Yaml));
        formats.set(Format::data(".yml", Loader::Yaml));
        for ext in assets {
            formats.set(Format::asset(ext));
        }
        formats
    }

    /// Register a format, replacing any format with the same extension.
    pub fn set(&mut self, format: Format) {
        let ext = format.ext.to_ascii_lowercase();
        self.entries.retain(|f| f.ext != ext);
        self.entries.push(Format { ext, ..format });
        // Longest extension first so `search` can stop at the first match.
        self.entries.sort_by(|a, b| b.ext.len().cmp(&a.ext.len()));
    }

    pub fn get(&self, ext: &str) -> Option<&Format> {
        let ext = ext.to_ascii_lowercase();
        self.entries.iter().find(|f| f.ext == ext)
    }

    /// Find the format of a file by its longest matching extension.
    pub fn search(&self, path: &Path) -> Option<&Format> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        self.entries
            .iter()
            .find(|f| name.len() > f.ext.len() && name.ends_with(&f.ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Format> {
        self.entries.iter()
    }
}

/// Split a filename into the stem and the matched extension.
///
/// `index.page.json` with `.page.json` → `index`.
pub fn strip_ext<'a>(file_name: &'a str, format: &Format) -> &'a str {
    &file_name[..file_name.len() - format.ext.len()]
}
