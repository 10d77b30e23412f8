//! Data loading: front matter, data files, and `_data` folders.
//!
//! Front matter is a leading block delimited by `---` (YAML) or `+++`
//! (TOML). Everything after the closing delimiter is the template body:
//!
//! ```text
//! ---
//! title: Hello
//! tags: [news]
//! ---
//! # Hello
//! ```
//!
//! Directory data comes from `_data.{json,toml,yaml,yml}` files and `_data/`
//! folders. Inside a folder every file is keyed by its stem and every
//! subfolder by its name:
//!
//! ```text
//! _data/
//! ├── site.toml          → data.site
//! └── people/
//!     └── ada.yaml       → data.people.ada
//! ```

use crate::data::{self, Data};
use crate::formats::{Format, Formats, Loader, strip_ext};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Front matter must be a mapping: {0}")]
    NotAMapping(PathBuf),
}

/// A loaded file: its data and optional template body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loaded {
    pub data: Data,
    pub content: Option<String>,
}

/// Load a file with the given loader.
pub fn load(path: &Path, loader: Loader) -> Result<Loaded, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&raw, path, loader)
}

/// Parse already-read contents with the given loader.
pub fn parse(raw: &str, path: &Path, loader: Loader) -> Result<Loaded, LoadError> {
    match loader {
        Loader::FrontMatter => {
            let (data, body) = parse_front_matter(raw, path)?;
            Ok(Loaded {
                data,
                content: Some(body.to_string()),
            })
        }
        Loader::Text => Ok(Loaded {
            data: Data::new(),
            content: Some(raw.to_string()),
        }),
        Loader::Json | Loader::Toml | Loader::Yaml => {
            let value = parse_document(raw, path, loader)?;
            Ok(Loaded {
                data: into_data(value, path),
                content: None,
            })
        }
    }
}

/// Data for a whole data document. A list or scalar at the top level is
/// stored under the file name up to its first `.`.
fn into_data(value: Value, path: &Path) -> Data {
    match value {
        Value::Object(map) => map,
        Value::Null => Data::new(),
        other => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem = name.split('.').next().unwrap_or_default().to_string();
            Data::from_iter([(stem, other)])
        }
    }
}

fn parse_document(raw: &str, path: &Path, loader: Loader) -> Result<Value, LoadError> {
    match loader {
        Loader::Json => serde_json::from_str(raw).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
        Loader::Toml => {
            let value: toml::Value = toml::from_str(raw).map_err(|source| LoadError::Toml {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(data::from_toml(value))
        }
        Loader::Yaml => {
            if raw.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_yaml::from_str(raw).map_err(|source| LoadError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
        Loader::FrontMatter | Loader::Text => Ok(Value::String(raw.to_string())),
    }
}

/// Split front matter from the body.
///
/// Returns empty data and the full input when there is no front matter.
pub fn parse_front_matter<'a>(raw: &'a str, path: &Path) -> Result<(Data, &'a str), LoadError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let (delimiter, loader) = if raw.starts_with("---") {
        ("---", Loader::Yaml)
    } else if raw.starts_with("+++") {
        ("+++", Loader::Toml)
    } else {
        return Ok((Data::new(), raw));
    };

    let Some(first_newline) = raw.find('\n') else {
        return Ok((Data::new(), raw));
    };
    if raw[..first_newline].trim_end() != delimiter {
        return Ok((Data::new(), raw));
    }
    let rest = &raw[first_newline + 1..];

    // Closing delimiter must sit on its own line.
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == delimiter {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let value = parse_document(header, path, loader)?;
            let data = match value {
                Value::Object(map) => map,
                Value::Null => Data::new(),
                _ => return Err(LoadError::NotAMapping(path.to_path_buf())),
            };
            return Ok((data, body));
        }
        offset += line.len();
    }
    Ok((Data::new(), raw))
}

/// Load a single data file. Non-object documents are stored under `key`.
fn load_data_value(path: &Path, format: &Format) -> Result<Value, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&raw, path, format.loader)
}

/// Load the data declared in a directory: `_data.*` files, then the
/// `_data/` folder. Later sources override earlier ones key by key.
pub fn load_dir_data(dir: &Path, formats: &Formats) -> Result<Data, LoadError> {
    let mut data = Data::new();

    let mut data_files: Vec<PathBuf> = read_dir_sorted(dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("_data."))
                .unwrap_or(false)
        })
        .collect();
    data_files.sort();

    for path in data_files {
        let Some(format) = formats.search(&path).filter(|f| f.data_file) else {
            continue;
        };
        data.extend(into_data(load_data_value(&path, format)?, &path));
    }

    let folder = dir.join("_data");
    if folder.is_dir() {
        data.extend(load_data_folder(&folder, formats)?);
    }

    Ok(data)
}

/// Recursively load a `_data/` folder into nested data.
pub fn load_data_folder(folder: &Path, formats: &Formats) -> Result<Data, LoadError> {
    let mut data = Data::new();
    for path in read_dir_sorted(folder)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        if path.is_dir() {
            let nested = load_data_folder(&path, formats)?;
            data.insert(name, Value::Object(nested));
        } else if let Some(format) = formats.search(&path).filter(|f| f.data_file) {
            let key = strip_ext(&name, format).to_string();
            let value = load_data_value(&path, format)?;
            data.insert(key, value);
        } else {
            tracing::debug!("Skipping non-data file {}", path.display());
        }
    }
    Ok(data)
}

pub(crate) fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}
