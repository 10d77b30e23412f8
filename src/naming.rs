//! Centralized filename parsing for ordering prefixes.
//!
//! Files and directories may carry an optional prefix that controls ordering
//! and dating without leaking into the generated URLs:
//!
//! - `020-getting-started.md` → number `20`, name `getting-started`
//! - `2024-03-09_release-notes.md` → date `2024-03-09`, name `release-notes`
//! - `2024-03-09-release-notes.md` → same as above
//! - `about.md` → no prefix, name `about`
//!
//! The number ends up as `order` in the entry's data and the date as `date`.

use chrono::NaiveDate;

/// Result of parsing an entry name like `020-My-Page` or `2024-01-02_post`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Number prefix if present (e.g., `20` from `020-My-Page`)
    pub number: Option<u32>,
    /// Date prefix if present (e.g., `2024-01-02` from `2024-01-02_post`)
    pub date: Option<NaiveDate>,
    /// Name with the prefix removed. For unprefixed entries, the full input.
    pub name: String,
}

/// Parse an entry name following the ordering prefix conventions.
///
/// A date prefix is checked first so `2024-01-02-post` is not read as the
/// number `2024` followed by `01-02-post`.
pub fn parse_entry_name(name: &str) -> ParsedName {
    if let Some((date, rest)) = split_date_prefix(name) {
        return ParsedName {
            number: None,
            date: Some(date),
            name: rest.to_string(),
        };
    }
    if let Some(dash_pos) = name.find('-') {
        let prefix = &name[..dash_pos];
        if let Ok(num) = prefix.parse::<u32>() {
            let rest = &name[dash_pos + 1..];
            if !rest.is_empty() {
                return ParsedName {
                    number: Some(num),
                    date: None,
                    name: rest.to_string(),
                };
            }
        }
    }
    ParsedName {
        number: None,
        date: None,
        name: name.to_string(),
    }
}

fn split_date_prefix(name: &str) -> Option<(NaiveDate, &str)> {
    if name.len() < 11 || !name.is_char_boundary(10) {
        return None;
    }
    let (head, tail) = name.split_at(10);
    let date = NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()?;
    let rest = tail.strip_prefix('_').or_else(|| tail.strip_prefix('-'))?;
    if rest.is_empty() {
        return None;
    }
    Some((date, rest))
}

/// Turn arbitrary text into a URL-safe slug: lowercase ASCII letters and
/// digits joined by single dashes. Non-ASCII text is transliterated first
/// (`Café` → `cafe`); dots and underscores become dashes.
pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

/// The extension a page stem carries into its URL: the part after the last
/// `.` when it starts with a letter and is alphanumeric (`feed.xml` → `xml`).
/// Version-like stems (`v1.2`) have none.
pub fn stem_extension(stem: &str) -> Option<&str> {
    let (name, ext) = stem.rsplit_once('.')?;
    let is_ext = !name.is_empty()
        && ext.starts_with(|c: char| c.is_ascii_alphabetic())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    is_ext.then_some(ext)
}

/// Slug for a page stem, keeping an extension the stem already carries.
pub fn slugify_stem(stem: &str) -> String {
    match stem_extension(stem) {
        Some(ext) => {
            let name = &stem[..stem.len() - ext.len() - 1];
            format!("{}.{}", slugify(name), ext.to_ascii_lowercase())
        }
        None => slugify(stem),
    }
}
