//! Shared test utilities for the lantern test suite.
//!
//! Provides fixture setup, scratch-tree writers and lookup helpers that work
//! with scan-phase and render-phase data (`ScannedSite`, `Page`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let config = load_config(tmp.path()).unwrap();
//! let site = scan(tmp.path(), &config, &Formats::stock(&config.assets)).unwrap();
//!
//! let post = find_page(&site, "/blog/hello/");
//! assert_eq!(post.data["title"], "Hello");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::page::Page;
use crate::source::ScannedSite;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

// =========================================================================
// Page lookups: panic with the available keys on miss
// =========================================================================

/// Find a page by URL. Panics if not found.
pub fn find_page<'a>(site: &'a ScannedSite, url: &str) -> &'a Page {
    find_in(&site.pages, url)
}

/// Find a page by URL in a page list. Panics if not found.
pub fn find_in<'a>(pages: &'a [Page], url: &str) -> &'a Page {
    pages
        .iter()
        .find(|p| p.url.as_deref() == Some(url))
        .unwrap_or_else(|| {
            let urls: Vec<_> = pages.iter().map(|p| p.url.as_deref()).collect();
            panic!("page '{url}' not found. Available: {urls:?}")
        })
}

/// Find a page by its source path relative to `src`. Panics if not found.
pub fn find_by_source<'a>(site: &'a ScannedSite, rel: &str) -> &'a Page {
    site.pages
        .iter()
        .find(|p| p.src.rel_path == Path::new(rel))
        .unwrap_or_else(|| {
            let sources: Vec<String> = site.pages.iter().map(Page::source_display).collect();
            panic!("source '{rel}' not found. Available: {sources:?}")
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// Sorted URLs of every page that is written.
pub fn page_urls(site: &ScannedSite) -> Vec<String> {
    urls_of(&site.pages)
}

/// Sorted URLs of every written page in a page list.
pub fn urls_of(pages: &[Page]) -> Vec<String> {
    let mut urls: Vec<String> = pages.iter().filter_map(|p| p.url.clone()).collect();
    urls.sort();
    urls
}
