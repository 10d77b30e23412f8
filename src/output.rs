//! CLI output formatting for the build.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every page is its identity (positional index, title and URL) with
//! the source file shown as secondary context on an indented `Source:` line.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Pages
//! 001 Home → /
//!     Source: index.md
//! 002 Installing → /guides/install/
//!     Source: 010-guides/002-install.md
//! 003 (sitemap.tera) → not written
//!     Source: sitemap.tera
//!
//! Assets
//! 001 /css/site.css
//!     Source: css/site.css
//!
//! Static files
//! 001 img/logo.png
//!
//! Includes
//!     layouts/base.tera
//!
//! 1 draft skipped
//! ```
//!
//! ## Build
//!
//! ```text
//! Scanned 3 pages, 1 asset, 1 static file, 2 includes
//! Loaded 2 components
//! Rendered 4 pages
//! Ran 1 processor
//! Wrote 4 written, 0 unchanged, 1 copied (5 total)
//! Built 4 outputs → _site in 0.04s
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure,
//! with no I/O.

use crate::data;
use crate::formats::PageType;
use crate::page::Page;
use crate::site::{BuildEvent, BuildReport};
use crate::source::ScannedSite;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 page`, `2 pages`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Strip HTML tags from a string (simple angle-bracket stripping).
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// Page header: titled pages show the title, untitled ones the filename.
///
/// ```text
/// 001 Home → /
/// 002 (feed.xml.tera) → /feed.xml
/// 003 Draft notes → not written
/// ```
fn page_line(index: usize, page: &Page) -> String {
    let title = data::get_str(&page.data, data::TITLE)
        .map(|t| truncate_desc(strip_html_tags(t).trim(), 60))
        .filter(|t| !t.is_empty());
    let label = match title {
        Some(t) => t,
        None => format!(
            "({})",
            page.src
                .rel_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default()
        ),
    };
    let target = page.url.as_deref().unwrap_or("not written");
    format!("{} {} \u{2192} {}", format_index(index), label, target)
}

// ============================================================================
// Check: scan inventory
// ============================================================================

/// Format the scanned site as a content inventory.
pub fn format_scan_output(site: &ScannedSite, source_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push("Pages".to_string());
    let pages = site.pages.iter().filter(|p| p.page_type == PageType::Page);
    for (i, page) in pages.enumerate() {
        lines.push(page_line(i + 1, page));
        lines.push(format!("{}Source: {}", indent(1), page.source_display()));
    }

    let assets: Vec<&Page> = site
        .pages
        .iter()
        .filter(|p| p.page_type == PageType::Asset)
        .collect();
    if !assets.is_empty() {
        lines.push(String::new());
        lines.push("Assets".to_string());
        for (i, asset) in assets.iter().enumerate() {
            lines.push(format!(
                "{} {}",
                format_index(i + 1),
                asset.url.as_deref().unwrap_or_default()
            ));
            lines.push(format!("{}Source: {}", indent(1), asset.source_display()));
        }
    }

    if !site.static_files.is_empty() {
        lines.push(String::new());
        lines.push("Static files".to_string());
        for (i, file) in site.static_files.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), file.dest.display()));
            let rel = file.src.strip_prefix(source_root).unwrap_or(&file.src);
            if rel != file.dest {
                lines.push(format!("{}Source: {}", indent(1), rel.display()));
            }
        }
    }

    if !site.includes.is_empty() {
        lines.push(String::new());
        lines.push("Includes".to_string());
        for name in site.includes.keys() {
            lines.push(format!("{}{}", indent(1), name));
        }
    }

    if !site.component_folders.is_empty() {
        lines.push(String::new());
        lines.push("Components".to_string());
        for folder in &site.component_folders {
            let rel = folder.strip_prefix(source_root).unwrap_or(folder);
            lines.push(format!("{}{}/", indent(1), rel.display()));
        }
    }

    if site.drafts_skipped > 0 {
        lines.push(String::new());
        lines.push(format!("{} skipped", plural(site.drafts_skipped, "draft")));
    }

    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(site: &ScannedSite, source_root: &Path) {
    for line in format_scan_output(site, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Build: progress and summary
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Scanned {
            pages,
            assets,
            static_files,
            includes,
            drafts_skipped,
        } => {
            let mut lines = vec![format!(
                "Scanned {}, {}, {}, {}",
                plural(*pages, "page"),
                plural(*assets, "asset"),
                plural(*static_files, "static file"),
                plural(*includes, "include"),
            )];
            if *drafts_skipped > 0 {
                lines.push(format!(
                    "{}{} skipped",
                    indent(1),
                    plural(*drafts_skipped, "draft")
                ));
            }
            lines
        }
        BuildEvent::ComponentsLoaded { count } => {
            vec![format!("Loaded {}", plural(*count, "component"))]
        }
        BuildEvent::Rendered { pages } => vec![format!("Rendered {}", plural(*pages, "page"))],
        BuildEvent::Processed { hooks: 0 } => vec!["No processors".to_string()],
        BuildEvent::Processed { hooks } => vec![format!("Ran {}", plural(*hooks, "processor"))],
        BuildEvent::Written { stats } => vec![format!("Wrote {}", stats)],
    }
}

/// Format the final build summary.
pub fn format_build_report(report: &BuildReport, root: &Path) -> Vec<String> {
    let dest = report.dest.strip_prefix(root).unwrap_or(&report.dest);
    let mut lines = vec![format!(
        "Built {} \u{2192} {} in {:.2}s",
        plural(report.outputs, "output"),
        dest.display(),
        report.duration.as_secs_f64()
    )];
    if report.unwritten > 0 {
        lines.push(format!(
            "{}{} rendered but not written",
            indent(1),
            plural(report.unwritten, "page")
        ));
    }
    lines
}

/// Print the build summary to stdout.
pub fn print_build_report(report: &BuildReport, root: &Path) {
    for line in format_build_report(report, root) {
        println!("{}", line);
    }
}
