//! Source scanning: the first stage of the build.
//!
//! Walks the source tree, cascades directory data down to every page,
//! classifies files through the format registry and resolves URLs.
//!
//! ```text
//! src/
//! ├── _config.toml                 # ignored (config)
//! ├── _data.yml                    # data for every page
//! ├── _includes/                   # layouts and partials
//! ├── _components/                 # components
//! ├── index.md                     # page      → /
//! ├── 010-guides/
//! │   ├── _data.toml               # data for pages in guides/
//! │   └── 002-install.md           # page      → /guides/install/  (order = 2)
//! ├── css/site.css                 # asset     → /css/site.css
//! └── img/logo.png                 # static    (copy rule or copy_remaining_files)
//! ```
//!
//! Names starting with `.` or `_` are never pages. Ordering prefixes
//! (`010-`, `2024-03-09_`) are stripped from URLs and become `order` and
//! `date` in the data. What remains of directory and page names is slugified
//! (`020-Release Notes/` → `/release-notes/`); an explicit `basename` is not.

use crate::config::SiteConfig;
use crate::data::{self, Data};
use crate::formats::{Format, Formats, Loader, PageType, strip_ext};
use crate::loaders::{self, LoadError};
use crate::naming::{ParsedName, parse_entry_name, slugify, slugify_stem};
use crate::page::{Page, SourceInfo, StaticFile, UrlError, default_url, resolve_url};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source directory not found: {0}")]
    SourceMissing(PathBuf),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Invalid url in {path}: {source}")]
    InvalidUrl {
        path: PathBuf,
        #[source]
        source: UrlError,
    },
    #[error("Invalid date '{value}' in {path}")]
    InvalidDate { path: PathBuf, value: String },
}

/// A layout or partial from the includes directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    /// Path relative to the includes directory, `/`-separated.
    pub name: String,
    pub data: Data,
    pub content: String,
    /// Engines of the include's format.
    pub engines: Vec<String>,
}

/// Everything the scanner found.
#[derive(Debug, Default)]
pub struct ScannedSite {
    /// Pages and assets in source order.
    pub pages: Vec<Page>,
    pub static_files: Vec<StaticFile>,
    pub includes: BTreeMap<String, Include>,
    /// `_components` folders, shallowest first.
    pub component_folders: Vec<PathBuf>,
    pub drafts_skipped: usize,
}

impl ScannedSite {
    pub fn page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.page_type == PageType::Page)
            .count()
    }

    pub fn asset_count(&self) -> usize {
        self.pages.len() - self.page_count()
    }
}

/// Scan the source directory of a project.
pub fn scan(root: &Path, config: &SiteConfig, formats: &Formats) -> Result<ScannedSite, ScanError> {
    let src = root.join(&config.src);
    if !src.is_dir() {
        return Err(ScanError::SourceMissing(src));
    }
    let scanner = Scanner {
        config,
        formats,
        dest: root.join(&config.dest),
        src: src.clone(),
    };
    let mut site = ScannedSite::default();
    scanner.scan_dir(&src, Path::new(""), "/", &Data::new(), &mut site)?;
    site.includes = scanner.load_includes()?;
    tracing::debug!(
        "Scanned {} pages, {} static files, {} includes",
        site.pages.len(),
        site.static_files.len(),
        site.includes.len()
    );
    Ok(site)
}

struct Scanner<'a> {
    config: &'a SiteConfig,
    formats: &'a Formats,
    src: PathBuf,
    dest: PathBuf,
}

impl Scanner<'_> {
    fn scan_dir(
        &self,
        dir: &Path,
        rel: &Path,
        dir_url: &str,
        parent_data: &Data,
        site: &mut ScannedSite,
    ) -> Result<(), ScanError> {
        let merged_keys = &self.config.merged_keys;
        let own = loaders::load_dir_data(dir, self.formats)?;
        let dir_data = data::merge_data(parent_data, &own, merged_keys);

        for path in loaders::read_dir_sorted(dir)? {
            let name = file_name(&path);
            let entry_rel = rel.join(&name);

            if name.starts_with('.') || self.is_ignored(&path, &entry_rel) {
                continue;
            }
            if let Some(target) = self.copy_target(&entry_rel) {
                self.add_static(&path, target, site);
                continue;
            }

            if path.is_dir() {
                if name == self.config.components {
                    site.component_folders.push(path);
                    continue;
                }
                if name.starts_with('_') {
                    continue;
                }
                let parsed = parse_entry_name(&name);
                let child_data = data::merge_data(&dir_data, &prefix_data(&parsed), merged_keys);
                let child_url = format!("{dir_url}{}/", slugify(&parsed.name));
                self.scan_dir(&path, &entry_rel, &child_url, &child_data, site)?;
                continue;
            }

            if name.starts_with('_') {
                continue;
            }
            match self.formats.search(&path) {
                Some(format) if format.page_type == Some(PageType::Page) => {
                    match self.load_page(&path, &entry_rel, &name, format, dir_url, &dir_data)? {
                        Some(page) => site.pages.push(page),
                        None => site.drafts_skipped += 1,
                    }
                }
                Some(format) if format.page_type == Some(PageType::Asset) => {
                    let page = self.load_asset(&path, &entry_rel, &name, format, dir_url, &dir_data)?;
                    site.pages.push(page);
                }
                _ if self.config.copy_remaining_files => {
                    site.static_files.push(StaticFile {
                        src: path,
                        dest: entry_rel,
                    });
                }
                _ => tracing::debug!("Ignoring {}", entry_rel.display()),
            }
        }
        Ok(())
    }

    fn is_ignored(&self, path: &Path, rel: &Path) -> bool {
        if path == self.dest {
            return true;
        }
        self.config.ignore.iter().any(|pattern| {
            let pattern = pattern.trim_start_matches('/').trim_end_matches('/');
            rel.starts_with(pattern)
        })
    }

    /// Destination of a file or directory matched by a `[[copy]]` rule.
    ///
    /// A `from` that looks like an extension (`.png`) matches files by
    /// extension and keeps their path.
    fn copy_target(&self, rel: &Path) -> Option<PathBuf> {
        let name = rel.file_name()?.to_string_lossy().to_ascii_lowercase();
        for rule in &self.config.copy {
            let from = rule.from.trim_start_matches('/').trim_end_matches('/');
            if from.starts_with('.') && !from.contains('/') {
                if name.len() > from.len() && name.ends_with(&from.to_ascii_lowercase()) {
                    return Some(rel.to_path_buf());
                }
                continue;
            }
            if let Ok(rest) = rel.strip_prefix(from) {
                let base = match &rule.to {
                    Some(to) => PathBuf::from(to.trim_start_matches('/')),
                    None => PathBuf::from(from),
                };
                return Some(if rest.as_os_str().is_empty() {
                    base
                } else {
                    base.join(rest)
                });
            }
        }
        None
    }

    fn add_static(&self, path: &Path, target: PathBuf, site: &mut ScannedSite) {
        if path.is_file() {
            site.static_files.push(StaticFile {
                src: path.to_path_buf(),
                dest: target,
            });
            return;
        }
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let rest = entry.path().strip_prefix(path).unwrap_or(entry.path());
            site.static_files.push(StaticFile {
                src: entry.path().to_path_buf(),
                dest: target.join(rest),
            });
        }
    }

    fn load_page(
        &self,
        path: &Path,
        rel: &Path,
        name: &str,
        format: &Format,
        dir_url: &str,
        dir_data: &Data,
    ) -> Result<Option<Page>, ScanError> {
        let loaded = loaders::load(path, format.loader)?;
        let parsed = parse_entry_name(strip_ext(name, format));

        let merged_keys = &self.config.merged_keys;
        let with_prefix = data::merge_data(dir_data, &prefix_data(&parsed), merged_keys);
        let mut data = data::merge_data(&with_prefix, &loaded.data, merged_keys);
        data::normalize_tags(&mut data);

        if data::is_draft(&data) && !self.config.show_drafts {
            tracing::debug!("Skipping draft {}", rel.display());
            return Ok(None);
        }

        normalize_date(&mut data, path)?;
        let basename = data::get_str(&data, data::BASENAME)
            .map(String::from)
            .unwrap_or_else(|| slugify_stem(&parsed.name));
        data.insert(data::BASENAME.into(), Value::String(basename.clone()));

        let default = default_url(dir_url, &basename, ".html", self.config.pretty_urls);
        let url = resolve_url(data.get(data::URL), dir_url, default).map_err(|source| {
            ScanError::InvalidUrl {
                path: rel.to_path_buf(),
                source,
            }
        })?;

        Ok(Some(Page {
            src: SourceInfo {
                rel_path: rel.to_path_buf(),
                ext: format.ext.clone(),
                dir_url: dir_url.to_string(),
            },
            page_type: PageType::Page,
            data,
            content: loaded.content.unwrap_or_default(),
            rendered: String::new(),
            url,
            engines: format.engines.clone(),
        }))
    }

    fn load_asset(
        &self,
        path: &Path,
        rel: &Path,
        name: &str,
        format: &Format,
        dir_url: &str,
        dir_data: &Data,
    ) -> Result<Page, ScanError> {
        let loaded = loaders::load(path, Loader::Text)?;
        let basename = strip_ext(name, format).to_string();
        let url = default_url(dir_url, &basename, &format.ext, self.config.pretty_urls);
        let mut data = dir_data.clone();
        data.insert(data::BASENAME.into(), Value::String(basename));
        Ok(Page {
            src: SourceInfo {
                rel_path: rel.to_path_buf(),
                ext: format.ext.clone(),
                dir_url: dir_url.to_string(),
            },
            page_type: PageType::Asset,
            data,
            content: loaded.content.unwrap_or_default(),
            rendered: String::new(),
            url: Some(url),
            engines: Vec::new(),
        })
    }

    fn load_includes(&self) -> Result<BTreeMap<String, Include>, ScanError> {
        let dir = self.src.join(&self.config.includes);
        let mut includes = BTreeMap::new();
        if !dir.is_dir() {
            return Ok(includes);
        }
        for entry in WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let Some(format) = self.formats.search(path).filter(|f| f.template) else {
                tracing::debug!("Skipping non-template include {}", path.display());
                continue;
            };
            let loaded = loaders::load(path, format.loader)?;
            let name = path
                .strip_prefix(&dir)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            includes.insert(
                name.clone(),
                Include {
                    name,
                    data: loaded.data,
                    content: loaded.content.unwrap_or_default(),
                    engines: format.engines.clone(),
                },
            );
        }
        Ok(includes)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// `order` and `date` carried by an ordering prefix.
fn prefix_data(parsed: &ParsedName) -> Data {
    let mut data = Data::new();
    if let Some(number) = parsed.number {
        data.insert(data::ORDER.into(), Value::from(number));
    }
    if let Some(date) = parsed.date {
        data.insert(data::DATE.into(), Value::String(date.format("%Y-%m-%d").to_string()));
    }
    data
}

/// Normalise `date` to RFC 3339, falling back to the file's mtime.
fn normalize_date(data: &mut Data, path: &Path) -> Result<(), ScanError> {
    let date = match data.get(data::DATE) {
        Some(Value::String(raw)) => parse_date(raw).ok_or_else(|| ScanError::InvalidDate {
            path: path.to_path_buf(),
            value: raw.clone(),
        })?,
        Some(Value::Null) | None => match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(_) => return Ok(()),
        },
        Some(other) => {
            return Err(ScanError::InvalidDate {
                path: path.to_path_buf(),
                value: other.to_string(),
            });
        }
    };
    data.insert(
        data::DATE.into(),
        Value::String(date.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    Ok(())
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`, as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CopyRule;
    use crate::test_helpers::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn scan_tree(files: &[(&str, &str)], config: &SiteConfig) -> (TempDir, ScannedSite) {
        let tmp = TempDir::new().unwrap();
        for (rel, content) in files {
            write_file(tmp.path(), rel, content);
        }
        let formats = Formats::stock(&config.assets);
        let site = scan(tmp.path(), config, &formats).unwrap();
        (tmp, site)
    }

    // =========================================================================
    // URLs and prefixes
    // =========================================================================

    #[test]
    fn urls_strip_prefixes() {
        let (_tmp, site) = scan_tree(
            &[
                ("index.md", "# Home"),
                ("010-guides/002-install.md", "x"),
                ("010-guides/index.md", "x"),
                ("posts/2024-03-09_release.md", "x"),
            ],
            &SiteConfig::default(),
        );
        assert_eq!(page_urls(&site), vec!["/", "/guides/", "/guides/install/", "/posts/release/"]);
    }

    #[test]
    fn plain_urls_without_pretty() {
        let config = SiteConfig {
            pretty_urls: false,
            ..SiteConfig::default()
        };
        let (_tmp, site) = scan_tree(&[("about.md", "x"), ("feed.xml.tera", "x")], &config);
        assert_eq!(page_urls(&site), vec!["/about.html", "/feed.xml"]);
    }

    #[test]
    fn derived_segments_are_slugified() {
        let (_tmp, site) = scan_tree(
            &[
                ("020-Release Notes/001-Version 1!.md", "x"),
                ("Kept As Is.md", "---\nbasename: Kept_As_Is\n---\n"),
                ("Notes Über/v1.2.md", "x"),
                ("Site Feed.XML.tera", "x"),
            ],
            &SiteConfig::default(),
        );
        assert_eq!(
            page_urls(&site),
            vec![
                "/Kept_As_Is/",
                "/notes-uber/v1-2/",
                "/release-notes/version-1/",
                "/site-feed.xml",
            ]
        );
    }

    #[test]
    fn prefix_data_becomes_order_and_date() {
        let (_tmp, site) = scan_tree(
            &[("010-guides/002-install.md", "x"), ("2024-03-09_news.md", "x")],
            &SiteConfig::default(),
        );
        let install = find_page(&site, "/guides/install/");
        assert_eq!(install.data["order"], 2);
        let news = find_page(&site, "/news/");
        assert_eq!(news.data["date"], "2024-03-09T00:00:00Z");
    }

    #[test]
    fn url_data_overrides() {
        let (_tmp, site) = scan_tree(
            &[
                ("blog/a.md", "---\nurl: /custom/\n---\n"),
                ("blog/b.md", "---\nurl: ./bee/\n---\n"),
                ("blog/c.md", "---\nurl: false\n---\n"),
                ("blog/d.md", "---\nbasename: dee\n---\n"),
            ],
            &SiteConfig::default(),
        );
        assert_eq!(find_by_source(&site, "blog/a.md").url.as_deref(), Some("/custom/"));
        assert_eq!(find_by_source(&site, "blog/b.md").url.as_deref(), Some("/blog/bee/"));
        assert_eq!(find_by_source(&site, "blog/c.md").url, None);
        assert_eq!(find_by_source(&site, "blog/d.md").url.as_deref(), Some("/blog/dee/"));
    }

    #[test]
    fn bare_url_is_scan_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.md", "---\nurl: nowhere\n---\n");
        let config = SiteConfig::default();
        let result = scan(tmp.path(), &config, &Formats::stock(&config.assets));
        assert!(matches!(result, Err(ScanError::InvalidUrl { .. })));
    }

    // =========================================================================
    // Data cascade
    // =========================================================================

    #[test]
    fn directory_data_cascades() {
        let (_tmp, site) = scan_tree(
            &[
                ("_data.yml", "layout: base.tera\ntags: [site]\nauthor: Root"),
                ("blog/_data.toml", "tags = [\"blog\"]\nauthor = \"Blog\""),
                ("blog/post.md", "---\ntags: post\n---\n"),
                ("about.md", "x"),
            ],
            &SiteConfig::default(),
        );
        let post = find_page(&site, "/blog/post/");
        assert_eq!(post.data["layout"], "base.tera");
        assert_eq!(post.data["author"], "Blog");
        assert_eq!(post.data["tags"], json!(["site", "blog", "post"]));

        let about = find_page(&site, "/about/");
        assert_eq!(about.data["author"], "Root");
        assert_eq!(about.data["tags"], json!(["site"]));
    }

    #[test]
    fn data_folder_is_nested() {
        let (_tmp, site) = scan_tree(
            &[("_data/site.yml", "name: Lantern"), ("index.md", "x")],
            &SiteConfig::default(),
        );
        assert_eq!(find_page(&site, "/").data["site"]["name"], "Lantern");
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn drafts_are_skipped_unless_shown() {
        let files = [("a.md", "---\ndraft: true\n---\n"), ("b.md", "x")];
        let (_tmp, site) = scan_tree(&files, &SiteConfig::default());
        assert_eq!(page_urls(&site), vec!["/b/"]);
        assert_eq!(site.drafts_skipped, 1);

        let config = SiteConfig {
            show_drafts: true,
            ..SiteConfig::default()
        };
        let (_tmp, site) = scan_tree(&files, &config);
        assert_eq!(site.pages.len(), 2);
    }

    #[test]
    fn hidden_and_underscore_entries_are_skipped() {
        let (_tmp, site) = scan_tree(
            &[
                (".git/config.md", "x"),
                ("_drafts/a.md", "x"),
                ("_partial.md", "x"),
                ("_config.toml", ""),
                ("_site/old.md", "x"),
                ("page.md", "x"),
            ],
            &SiteConfig::default(),
        );
        assert_eq!(page_urls(&site), vec!["/page/"]);
    }

    #[test]
    fn ignore_list() {
        let config = SiteConfig {
            ignore: vec!["README.md".into(), "notes/".into()],
            ..SiteConfig::default()
        };
        let (_tmp, site) = scan_tree(
            &[("README.md", "x"), ("notes/a.md", "x"), ("keep.md", "x")],
            &config,
        );
        assert_eq!(page_urls(&site), vec!["/keep/"]);
    }

    #[test]
    fn assets_keep_extension() {
        let (_tmp, site) = scan_tree(&[("css/site.css", "body{}")], &SiteConfig::default());
        let asset = find_page(&site, "/css/site.css");
        assert_eq!(asset.page_type, PageType::Asset);
        assert_eq!(asset.content, "body{}");
        assert_eq!(site.asset_count(), 1);
    }

    #[test]
    fn asset_file_names_are_kept_as_written() {
        let (_tmp, site) = scan_tree(
            &[("010-css/010-Reset.min.css", "*{}")],
            &SiteConfig::default(),
        );
        assert_eq!(page_urls(&site), vec!["/css/010-Reset.min.css"]);
    }

    #[test]
    fn copy_rules_and_remaining_files() {
        let config = SiteConfig {
            copy: vec![
                CopyRule {
                    from: "img".into(),
                    to: Some("static/img".into()),
                },
                CopyRule {
                    from: ".pdf".into(),
                    to: None,
                },
            ],
            ..SiteConfig::default()
        };
        let (_tmp, site) = scan_tree(
            &[
                ("img/a.png", "png"),
                ("img/sub/b.md", "not a page"),
                ("docs/guide.pdf", "pdf"),
                ("other.bin", "bin"),
            ],
            &config,
        );
        let dests: Vec<String> = site
            .static_files
            .iter()
            .map(|s| s.dest.display().to_string())
            .collect();
        assert_eq!(dests, vec!["docs/guide.pdf", "static/img/a.png", "static/img/sub/b.md"]);
        assert!(site.pages.is_empty());

        let config = SiteConfig {
            copy_remaining_files: true,
            ..SiteConfig::default()
        };
        let (_tmp, site) = scan_tree(&[("other.bin", "bin")], &config);
        assert_eq!(site.static_files[0].dest, PathBuf::from("other.bin"));
    }

    #[test]
    fn includes_and_components() {
        let (_tmp, site) = scan_tree(
            &[
                ("_includes/base.tera", "---\nlayout: root.tera\n---\n<main>{{ content }}</main>"),
                ("_includes/partials/nav.tera", "<nav></nav>"),
                ("_includes/notes.txt", "ignored"),
                ("_components/card.tera", "card"),
                ("blog/_components/teaser.tera", "teaser"),
            ],
            &SiteConfig::default(),
        );
        let names: Vec<&str> = site.includes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["base.tera", "partials/nav.tera"]);
        assert_eq!(site.includes["base.tera"].data["layout"], "root.tera");
        assert_eq!(site.component_folders.len(), 2);
        assert!(site.component_folders[0].ends_with("_components"));
        assert!(site.component_folders[1].ends_with("blog/_components"));
    }

    // =========================================================================
    // Dates
    // =========================================================================

    #[test]
    fn date_forms() {
        assert_eq!(
            parse_date("2024-03-09").unwrap().to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-03-09T00:00:00Z"
        );
        assert_eq!(
            parse_date("2024-03-09T10:00:00+02:00")
                .unwrap()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-03-09T08:00:00Z"
        );
        assert!(parse_date("2024-03-09 10:30:00").is_some());
        assert!(parse_date("March 9").is_none());
    }

    #[test]
    fn front_matter_date_wins_and_mtime_fills_in() {
        let (_tmp, site) = scan_tree(
            &[
                ("2024-01-01_a.md", "---\ndate: 2023-05-05\n---\n"),
                ("b.md", "x"),
            ],
            &SiteConfig::default(),
        );
        assert_eq!(find_page(&site, "/a/").data["date"], "2023-05-05T00:00:00Z");
        let b = find_page(&site, "/b/").data["date"].as_str().unwrap().to_string();
        assert!(parse_date(&b).is_some());
    }

    #[test]
    fn invalid_date_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.md", "---\ndate: someday\n---\n");
        let config = SiteConfig::default();
        let result = scan(tmp.path(), &config, &Formats::stock(&config.assets));
        assert!(matches!(result, Err(ScanError::InvalidDate { .. })));
    }

    #[test]
    fn missing_source_dir() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig {
            src: "nope".into(),
            ..SiteConfig::default()
        };
        let result = scan(tmp.path(), &config, &Formats::stock(&config.assets));
        assert!(matches!(result, Err(ScanError::SourceMissing(_))));
    }
}
