//! Pages, static files and URL resolution.
//!
//! A page's URL is derived from its place in the source tree unless its data
//! sets `url`:
//!
//! ```text
//! posts/002-hello.md        → /posts/hello/        (pretty_urls)
//! posts/index.md            → /posts/
//! feed.xml.tera             → /feed.xml
//! url: /custom/             → /custom/
//! url: ./sibling/           → /posts/sibling/      (relative to the directory)
//! url: false                → rendered, not written
//! ```

use crate::data::{self, Data};
use crate::formats::PageType;
use crate::naming::stem_extension;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum UrlError {
    #[error("url '{0}' must start with '/', './' or '../'")]
    NotRooted(String),
    #[error("url '{0}' climbs above the site root")]
    AboveRoot(String),
    #[error("url must be a string or false, found {0}")]
    WrongType(String),
}

/// Where a page came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    /// Path relative to the source directory.
    pub rel_path: PathBuf,
    /// Registered extension of the source format, e.g. `.md`.
    pub ext: String,
    /// URL of the containing directory, prefixes stripped: `/posts/`.
    pub dir_url: String,
}

/// A page or asset moving through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub src: SourceInfo,
    pub page_type: PageType,
    pub data: Data,
    /// Template body before rendering.
    pub content: String,
    /// Output of the engine chain and layouts.
    pub rendered: String,
    /// `None` when the page is rendered but not written.
    pub url: Option<String>,
    /// Engines from the source format.
    pub engines: Vec<String>,
}

impl Page {
    /// Output path relative to `dest`.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.url.as_deref().map(output_path)
    }

    /// Extension of the output file including the dot, e.g. `.html`.
    pub fn output_ext(&self) -> Option<String> {
        let path = self.output_path()?;
        path.extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
    }

    /// Data plus `url` and rendered `content`, as seen by search and layouts.
    pub fn public_data(&self) -> Data {
        let mut data = self.data.clone();
        data.insert(
            data::URL.to_string(),
            self.url.clone().map(Value::String).unwrap_or(Value::Bool(false)),
        );
        data.insert(data::CONTENT.to_string(), Value::String(self.rendered.clone()));
        data
    }

    pub fn source_display(&self) -> String {
        self.src.rel_path.display().to_string()
    }
}

/// A file copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    /// Absolute source path.
    pub src: PathBuf,
    /// Path relative to `dest`.
    pub dest: PathBuf,
}

/// Turn a URL into a path relative to the output directory.
pub fn output_path(url: &str) -> PathBuf {
    let trimmed = url.trim_start_matches('/');
    if url.ends_with('/') {
        Path::new(trimmed).join("index.html")
    } else {
        PathBuf::from(trimmed)
    }
}

/// URL a page gets from its location: `dir_url` plus the basename.
///
/// A page `basename` may already carry an extension (`feed.xml`), which is
/// kept. Otherwise the output extension is applied, with pretty URLs turning
/// `name.html` into `name/`.
pub fn default_url(dir_url: &str, basename: &str, output_ext: &str, pretty_urls: bool) -> String {
    if output_ext == ".html" && stem_extension(basename).is_some() {
        return format!("{dir_url}{basename}");
    }
    if output_ext == ".html" && pretty_urls {
        if basename == "index" {
            return dir_url.to_string();
        }
        return format!("{dir_url}{basename}/");
    }
    format!("{dir_url}{basename}{output_ext}")
}

/// Resolve the `url` data value of a page.
///
/// Returns `Ok(None)` for `url = false` and `Ok(Some(default))` when the
/// value is absent.
pub fn resolve_url(
    value: Option<&Value>,
    dir_url: &str,
    default: String,
) -> Result<Option<String>, UrlError> {
    match value {
        None | Some(Value::Null) => Ok(Some(default)),
        Some(Value::Bool(false)) => Ok(None),
        Some(Value::Bool(true)) => Ok(Some(default)),
        Some(Value::String(url)) => resolve_url_str(url, dir_url).map(Some),
        Some(other) => Err(UrlError::WrongType(other.to_string())),
    }
}

/// Resolve an absolute or `./`/`../` relative URL against `dir_url`.
///
/// Absolute URLs are normalised too: `.` segments are dropped and a `..`
/// that would climb above the root is an error.
pub fn resolve_url_str(url: &str, dir_url: &str) -> Result<String, UrlError> {
    let (mut segments, path): (Vec<&str>, &str) = if let Some(path) = url.strip_prefix('/') {
        (Vec::new(), path)
    } else if url.starts_with("./") || url.starts_with("../") {
        (dir_url.split('/').filter(|s| !s.is_empty()).collect(), url)
    } else {
        return Err(UrlError::NotRooted(url.to_string()));
    };
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(UrlError::AboveRoot(url.to_string()));
                }
            }
            other => segments.push(other),
        }
    }
    let mut resolved = format!("/{}", segments.join("/"));
    if url.ends_with('/') && !resolved.ends_with('/') {
        resolved.push('/');
    }
    Ok(resolved)
}
