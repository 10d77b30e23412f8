//! Site configuration module.
//!
//! Handles loading, validating, and merging the `_config.toml` file at the
//! project root. Stock defaults are overridden by the user file; the user file
//! needs to contain only the keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! src = "."                   # Source directory, relative to the project root
//! dest = "_site"              # Output directory, relative to the project root
//! location = "http://localhost/"
//! pretty_urls = true          # /about/index.html instead of /about.html
//! includes = "_includes"      # Layouts and partials, relative to src
//! components = "_components"  # Component folder name (any depth)
//! empty_dest = true           # Remove dest before writing
//! show_drafts = false         # Build pages with `draft: true`
//! copy_remaining_files = false
//! ignore = []                 # Paths relative to src to skip entirely
//! assets = [".css", ".js"]    # Extensions loaded as processable assets
//!
//! [[copy]]
//! from = "img"                # Directory, file, or `.ext`
//! to = "images"               # Optional destination path
//!
//! [merged_keys]
//! tags = "string_array"       # object | array | string_array
//!
//! [markdown]
//! tables = true
//! footnotes = true
//! strikethrough = true
//! tasklists = true
//! smart_punctuation = false
//!
//! [multilanguage]
//! languages = []              # e.g. ["en", "gl"]; empty disables the plugin
//! default_language = ""       # Defaults to the first language
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::data::{MergedKeys, default_merged_keys};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Name of the configuration file at the project root.
pub const CONFIG_FILENAME: &str = "_config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `_config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Source directory, relative to the project root.
    pub src: String,
    /// Output directory, relative to the project root.
    pub dest: String,
    /// Public base URL of the site. Its path is prepended by the `url` filter.
    pub location: String,
    /// Emit `/name/index.html` instead of `/name.html` for HTML pages.
    pub pretty_urls: bool,
    /// Directory holding layouts and partials, relative to `src`.
    pub includes: String,
    /// Name of component folders; they may appear at any depth.
    pub components: String,
    /// Remove the output directory before writing.
    pub empty_dest: bool,
    /// Build pages marked `draft: true`.
    pub show_drafts: bool,
    /// Copy every file that is neither a page, an asset nor data.
    pub copy_remaining_files: bool,
    /// Paths relative to `src` that are skipped entirely.
    pub ignore: Vec<String>,
    /// Extensions loaded as assets (text files passed through processors).
    pub assets: Vec<String>,
    /// Static copy rules.
    pub copy: Vec<CopyRule>,
    /// Data keys that accumulate down the directory tree.
    pub merged_keys: MergedKeys,
    /// Markdown engine options.
    pub markdown: MarkdownConfig,
    /// Multilanguage plugin settings.
    pub multilanguage: MultilanguageConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            src: ".".to_string(),
            dest: "_site".to_string(),
            location: "http://localhost/".to_string(),
            pretty_urls: true,
            includes: "_includes".to_string(),
            components: "_components".to_string(),
            empty_dest: true,
            show_drafts: false,
            copy_remaining_files: false,
            ignore: Vec::new(),
            assets: vec![".css".to_string(), ".js".to_string()],
            copy: Vec::new(),
            merged_keys: default_merged_keys(),
            markdown: MarkdownConfig::default(),
            multilanguage: MultilanguageConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dest.trim().is_empty() {
            return Err(ConfigError::Validation("dest must not be empty".into()));
        }
        // `dest` may be emptied on every build: it must be a directory of
        // its own inside the project, never the root or the sources.
        let dest = plain_relative(&self.dest).ok_or_else(|| {
            ConfigError::Validation(format!(
                "dest must be a relative path without '..': {}",
                self.dest
            ))
        })?;
        if dest.is_empty() {
            return Err(ConfigError::Validation(
                "dest must not be the project root".into(),
            ));
        }
        if let Some(src) = plain_relative(&self.src) {
            if src.starts_with(&dest) {
                return Err(ConfigError::Validation(format!(
                    "dest '{}' must not be src or contain it",
                    self.dest
                )));
            }
        }
        if !self.includes.starts_with('_') {
            return Err(ConfigError::Validation(
                "includes must start with an underscore so it is never published".into(),
            ));
        }
        if !self.components.starts_with('_') {
            return Err(ConfigError::Validation(
                "components must start with an underscore so it is never published".into(),
            ));
        }
        for ext in &self.assets {
            if !ext.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "assets entries must start with a dot: {ext}"
                )));
            }
        }
        for rule in &self.copy {
            if rule.from.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "copy.from must not be empty".into(),
                ));
            }
        }
        let langs = &self.multilanguage;
        if !langs.default_language.is_empty()
            && !langs.languages.is_empty()
            && !langs.languages.contains(&langs.default_language)
        {
            return Err(ConfigError::Validation(format!(
                "multilanguage.default_language '{}' is not in languages",
                langs.default_language
            )));
        }
        Ok(())
    }

    /// Path component of `location`, always with leading and trailing slash.
    pub fn base_path(&self) -> String {
        let without_scheme = self
            .location
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.location);
        let path = without_scheme
            .find('/')
            .map(|i| &without_scheme[i..])
            .unwrap_or("/");
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }
}

/// Normal components of a relative path, `.` dropped. `None` for absolute
/// paths and paths with `..`.
fn plain_relative(path: &str) -> Option<Vec<String>> {
    Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// A static copy rule: `from` is a path relative to `src` or an extension
/// such as `.png`; `to` optionally renames the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyRule {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Markdown engine options, mapped onto `pulldown_cmark::Options`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    pub tables: bool,
    pub footnotes: bool,
    pub strikethrough: bool,
    pub tasklists: bool,
    pub smart_punctuation: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            tasklists: true,
            smart_punctuation: false,
        }
    }
}

/// Multilanguage settings. The plugin is installed only when `languages`
/// is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultilanguageConfig {
    pub languages: Vec<String>,
    /// Language whose URLs are not prefixed. Empty means the first language.
    pub default_language: String,
}

impl MultilanguageConfig {
    pub fn enabled(&self) -> bool {
        !self.languages.is_empty()
    }

    pub fn default_language(&self) -> &str {
        if self.default_language.is_empty() {
            self.languages.first().map(String::as_str).unwrap_or("")
        } else {
            &self.default_language
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `_config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `_config.toml` in the given project root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `_config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Lantern Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Source directory, relative to this file.
src = "."

# Output directory, relative to this file.
dest = "_site"

# Public base URL. Its path ("/" here) is prepended by the `url` filter.
location = "http://localhost/"

# Write /about/index.html instead of /about.html.
pretty_urls = true

# Layouts and partials, relative to src.
includes = "_includes"

# Name of component folders. They may appear at any depth.
components = "_components"

# Remove the output directory before writing.
empty_dest = true

# Build pages marked `draft: true`.
show_drafts = false

# Copy every file that is neither a page, an asset nor data.
copy_remaining_files = false

# Paths relative to src that are skipped entirely.
ignore = []

# Extensions loaded as assets: copied as text and passed through processors.
assets = [".css", ".js"]

# Static copy rules. `from` is a path relative to src or an extension.
# [[copy]]
# from = "img"
# to = "images"

# ---------------------------------------------------------------------------
# Data keys that accumulate down the directory tree instead of overriding.
# Strategies: "object", "array", "string_array".
# ---------------------------------------------------------------------------
[merged_keys]
tags = "string_array"

# ---------------------------------------------------------------------------
# Markdown
# ---------------------------------------------------------------------------
[markdown]
tables = true
footnotes = true
strikethrough = true
tasklists = true
smart_punctuation = false

# ---------------------------------------------------------------------------
# Multilanguage: leave `languages` empty to disable.
# ---------------------------------------------------------------------------
[multilanguage]
languages = []
default_language = ""

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
