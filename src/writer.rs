//! Writing the output tree.
//!
//! Every page with a URL and every static file lands under `dest`. Before
//! anything is written the output paths are checked for collisions: two
//! sources resolving to the same file is an error naming both.
//!
//! ## Incremental writes
//!
//! The writer keeps a manifest at `<dest>/.lantern-manifest.json` mapping
//! each output path to the SHA-256 of the bytes last written there. A file
//! whose new content hashes the same, and which still exists on disk, is
//! left alone. This keeps modification times stable for rsync-style deploys.
//!
//! With `empty_dest` (the default) the whole directory is removed first, so
//! every file is written fresh.

use crate::page::{Page, StaticFile};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the manifest file within the output directory.
pub const MANIFEST_FILENAME: &str = ".lantern-manifest.json";

/// Bump to invalidate existing manifests when the format changes.
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} would be written by both {first} and {second}")]
    DuplicateOutput {
        path: PathBuf,
        first: String,
        second: String,
    },
    #[error("{path} (from {source_path}) would be written outside the output directory")]
    OutsideDest { path: PathBuf, source_path: String },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WriteError + '_ {
    move |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Output path → content hash of the last build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteManifest {
    pub version: u32,
    pub entries: BTreeMap<String, String>,
}

impl WriteManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the output directory. Missing, unreadable or outdated
    /// manifests load as empty.
    pub fn load(dest: &Path) -> Self {
        let Ok(content) = fs::read_to_string(dest.join(MANIFEST_FILENAME)) else {
            return Self::empty();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            _ => Self::empty(),
        }
    }

    pub fn save(&self, dest: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dest.join(MANIFEST_FILENAME), json)
    }

    /// Whether `rel` already holds content with `hash`.
    pub fn is_current(&self, rel: &str, hash: &str, dest: &Path) -> bool {
        self.entries.get(rel).is_some_and(|h| h == hash) && dest.join(rel).is_file()
    }
}

/// SHA-256 of some bytes as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// What the writer did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub unchanged: usize,
    pub copied: usize,
}

impl WriteStats {
    pub fn total(&self) -> usize {
        self.written + self.unchanged + self.copied
    }
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} unchanged, {} copied ({} total)",
            self.written,
            self.unchanged,
            self.copied,
            self.total()
        )
    }
}

enum Outcome {
    Written,
    Unchanged,
    Copied,
}

/// Output paths must stay below `dest`: relative, without `..`.
fn stays_inside(rel: &Path) -> bool {
    rel.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Fail if two sources resolve to the same output file, or if any output
/// would land outside `dest`.
pub fn check_duplicates(pages: &[Page], static_files: &[StaticFile]) -> Result<(), WriteError> {
    let mut seen: BTreeMap<PathBuf, String> = BTreeMap::new();
    let outputs = pages
        .iter()
        .filter_map(|p| p.output_path().map(|path| (path, p.source_display())))
        .chain(
            static_files
                .iter()
                .map(|s| (s.dest.clone(), s.src.display().to_string())),
        );
    for (path, source) in outputs {
        if !stays_inside(&path) {
            return Err(WriteError::OutsideDest {
                path,
                source_path: source,
            });
        }
        if let Some(first) = seen.get(&path) {
            return Err(WriteError::DuplicateOutput {
                path,
                first: first.clone(),
                second: source,
            });
        }
        seen.insert(path, source);
    }
    Ok(())
}

/// Write pages and static files under `dest`.
pub fn write_site(
    dest: &Path,
    pages: &[Page],
    static_files: &[StaticFile],
    empty_dest: bool,
) -> Result<WriteStats, WriteError> {
    check_duplicates(pages, static_files)?;

    if empty_dest && dest.exists() {
        fs::remove_dir_all(dest).map_err(io_error(dest))?;
    }
    fs::create_dir_all(dest).map_err(io_error(dest))?;
    let previous = WriteManifest::load(dest);

    let page_results: Vec<(String, String, Outcome)> = pages
        .par_iter()
        .filter_map(|page| page.output_path().map(|path| (page, path)))
        .map(|(page, path)| write_one(dest, &path, page.rendered.as_bytes(), &previous))
        .collect::<Result<_, _>>()?;

    let static_results: Vec<(String, String, Outcome)> = static_files
        .par_iter()
        .map(|file| copy_one(dest, file, &previous))
        .collect::<Result<_, _>>()?;

    let mut manifest = WriteManifest::empty();
    let mut stats = WriteStats::default();
    for (rel, hash, outcome) in page_results.into_iter().chain(static_results) {
        match outcome {
            Outcome::Written => stats.written += 1,
            Outcome::Unchanged => stats.unchanged += 1,
            Outcome::Copied => stats.copied += 1,
        }
        manifest.entries.insert(rel, hash);
    }
    manifest.save(dest).map_err(io_error(dest))?;
    tracing::debug!("Wrote {}: {}", dest.display(), stats);
    Ok(stats)
}

fn manifest_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_one(
    dest: &Path,
    rel: &Path,
    bytes: &[u8],
    previous: &WriteManifest,
) -> Result<(String, String, Outcome), WriteError> {
    let key = manifest_key(rel);
    let hash = hash_bytes(bytes);
    if previous.is_current(&key, &hash, dest) {
        return Ok((key, hash, Outcome::Unchanged));
    }
    let path = dest.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::write(&path, bytes).map_err(io_error(&path))?;
    Ok((key, hash, Outcome::Written))
}

fn copy_one(
    dest: &Path,
    file: &StaticFile,
    previous: &WriteManifest,
) -> Result<(String, String, Outcome), WriteError> {
    let key = manifest_key(&file.dest);
    let bytes = fs::read(&file.src).map_err(io_error(&file.src))?;
    let hash = hash_bytes(&bytes);
    if previous.is_current(&key, &hash, dest) {
        return Ok((key, hash, Outcome::Unchanged));
    }
    let path = dest.join(&file.dest);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::copy(&file.src, &path).map_err(io_error(&path))?;
    Ok((key, hash, Outcome::Copied))
}
