//! # Lantern
//!
//! A static site generator built around your source tree. Directories carry
//! data down to the pages inside them, file names carry ordering and dates,
//! and pages render through a chain of template engines wrapped in layouts.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Scan      src/    →  ScannedSite   (files → pages with cascaded data and URLs)
//! 2. Render    pages   →  pages         (generators, engine chains, layouts)
//! 3. Process   pages   →  pages         (processor hooks on rendered output)
//! 4. Write     pages   →  dest/         (incremental, SHA-256 manifest)
//! ```
//!
//! Every stage works on plain [`page::Page`] values, so each one can be
//! tested on a hand-built page list without running the others. The
//! [`Site`] type wires the stages together and owns the extension points.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`site`] | Registries, extension points and the build pipeline |
//! | [`source`] | Stage 1: walks the source tree, cascades data, resolves URLs |
//! | [`renderer`] | Stage 2: render-order groups, engine chains, layouts |
//! | [`hooks`] | Preprocessor and processor chains |
//! | [`writer`] | Stage 4: output files and the incremental write manifest |
//! | [`config`] | `_config.toml` loading, validation and stock defaults |
//! | [`data`] | Page data values and the cascade merge |
//! | [`formats`] | Extension → format registry |
//! | [`loaders`] | Front matter, data files and `_data` folders |
//! | [`components`] | Reusable template snippets from `_components` folders |
//! | [`engines`] | The `Engine` trait, Markdown and Tera engines |
//! | [`search`] | Page queries for templates and generators |
//! | [`generators`] | Pagination and named generators |
//! | [`page`] | Page types, URL resolution and output paths |
//! | [`plugins`] | The `Plugin` trait and the multilanguage plugin |
//! | [`naming`] | `NNN-name` and `YYYY-MM-DD_name` prefix parsing |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Data Cascades, Front Matter Wins
//!
//! A page's data is built from the outside in:
//!
//! ```text
//! src/_data.yml               ← every page
//! src/blog/_data.toml         ← pages under blog/ (overrides the root)
//! src/blog/2024-03-09_a.md    ← name prefix sets `date`
//!   --- front matter ---      ← wins over everything above
//! ```
//!
//! Keys listed in `[merged_keys]` accumulate instead of overriding, which is
//! how a directory can add `tags` without erasing the ones its parent set.
//!
//! ## Tera for Templates, Maud for Markup We Generate
//!
//! User templates are [Tera](https://keats.github.io/tera/): they are files in
//! the source tree and have to be compiled at runtime. HTML that lantern
//! itself injects (hreflang links) is written with Maud so it is escaped and
//! checked at compile time.
//!
//! ## Render Order Instead of Dependency Tracking
//!
//! Pages that list other pages (indexes, feeds) need those pages rendered
//! first. Rather than track dependencies, pages declare `render_order`; each
//! group renders in parallel and sees everything rendered by earlier groups
//! through [`search`].
//!
//! ## Extension Points Over Built-ins
//!
//! Anything that is not scanning, data or rendering is a hook or a
//! [`plugins::Plugin`]. The multilanguage support ships as a plugin that uses
//! nothing a third-party plugin could not.

pub mod components;
pub mod config;
pub mod data;
pub mod engines;
pub mod formats;
pub mod generators;
pub mod hooks;
pub mod loaders;
pub mod naming;
pub mod output;
pub mod page;
pub mod plugins;
pub mod renderer;
pub mod search;
pub mod site;
pub mod source;
pub mod writer;

pub use site::{BuildError, BuildEvent, BuildReport, Site};

#[cfg(test)]
pub(crate) mod test_helpers;
