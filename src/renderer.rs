//! Rendering: generators, preprocessors, engine chains and layouts.
//!
//! Pages are rendered in groups by `render_order` (ascending). Within a
//! group every page renders in parallel; the search snapshot is refreshed
//! after each group, so a listing page with a higher `render_order` sees the
//! rendered content of the pages before it.
//!
//! ```text
//! for each render_order group:
//!     expand generators → preprocess → preload → render content → refresh search
//! then, for all pages:
//!     layout → layout's layout → ...
//! ```

use crate::data::{self, Data, MergedKeys};
use crate::engines::{EngineError, EngineRegistry};
use crate::formats::PageType;
use crate::generators::{self, GeneratorError, Generators};
use crate::hooks::{HookChain, HookError};
use crate::page::Page;
use crate::search::Searcher;
use crate::source::Include;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Layout '{layout}' not found (used by {page})")]
    LayoutNotFound { page: String, layout: String },
    #[error("Layout loop in {page}: {chain}")]
    LayoutLoop { page: String, chain: String },
}

/// Everything rendering needs, borrowed from the site.
pub struct Renderer<'a> {
    pub engines: &'a EngineRegistry,
    pub includes: &'a BTreeMap<String, Include>,
    pub generators: &'a Generators,
    pub preprocessors: &'a HookChain,
    pub searcher: &'a Searcher,
    pub merged_keys: &'a MergedKeys,
}

impl Renderer<'_> {
    /// Render every page. Generator pages come back expanded.
    pub fn render(&self, pages: Vec<Page>) -> Result<Vec<Page>, RenderError> {
        let mut groups: BTreeMap<i64, Vec<Page>> = BTreeMap::new();
        for page in pages {
            groups.entry(data::render_order(&page.data)).or_default().push(page);
        }
        let mut groups: Vec<(i64, Vec<Page>)> = groups.into_iter().collect();
        self.refresh_search(&groups);

        for index in 0..groups.len() {
            let (order, group) = &mut groups[index];
            tracing::debug!("Rendering group {} ({} pages)", order, group.len());

            let mut expanded = Vec::with_capacity(group.len());
            for page in std::mem::take(group) {
                if generators::is_generator(&page) {
                    expanded.extend(generators::expand(
                        page,
                        self.generators,
                        self.searcher,
                        self.merged_keys,
                    )?);
                } else {
                    expanded.push(page);
                }
            }
            *group = expanded;

            self.preprocessors.run(group)?;
            self.preload(group)?;
            group.par_iter_mut().try_for_each(|page| self.render_content(page))?;
            self.refresh_search(&groups);
        }

        let mut pages: Vec<Page> = groups.into_iter().flat_map(|(_, group)| group).collect();
        pages.par_iter_mut().try_for_each(|page| self.render_layouts(page))?;
        Ok(pages)
    }

    fn refresh_search(&self, groups: &[(i64, Vec<Page>)]) {
        let snapshot = groups
            .iter()
            .flat_map(|(_, group)| group)
            .filter(|page| page.page_type == PageType::Page)
            .map(Page::public_data)
            .collect();
        self.searcher.update(snapshot);
    }

    /// Hand each engine the templates it is about to render first.
    fn preload(&self, group: &[Page]) -> Result<(), RenderError> {
        let mut batches: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for page in group.iter().filter(|p| p.page_type == PageType::Page) {
            if let Some(first) = engine_chain(page).into_iter().next() {
                batches
                    .entry(first)
                    .or_default()
                    .push((page.source_display(), page.content.clone()));
            }
        }
        for (name, templates) in batches {
            self.engines.get(&name)?.preload(&templates)?;
        }
        Ok(())
    }

    fn render_content(&self, page: &mut Page) -> Result<(), RenderError> {
        if page.page_type == PageType::Asset {
            page.rendered = page.content.clone();
            return Ok(());
        }
        let chain = engine_chain(page);
        let data = render_data(page);
        page.rendered =
            self.engines
                .render_chain(&chain, &page.content, &data, &page.source_display())?;
        Ok(())
    }

    fn render_layouts(&self, page: &mut Page) -> Result<(), RenderError> {
        if page.page_type == PageType::Asset {
            return Ok(());
        }
        let mut next = data::get_str(&page.data, data::LAYOUT).map(String::from);
        let mut visited: Vec<String> = Vec::new();

        while let Some(name) = next {
            if visited.contains(&name) {
                visited.push(name);
                return Err(RenderError::LayoutLoop {
                    page: page.source_display(),
                    chain: visited.join(" → "),
                });
            }
            let layout = self
                .includes
                .get(&name)
                .ok_or_else(|| RenderError::LayoutNotFound {
                    page: page.source_display(),
                    layout: name.clone(),
                })?;

            let mut layout_data = data::merge_data(&layout.data, &page.data, self.merged_keys);
            layout_data.insert(data::URL.into(), url_value(page));
            layout_data.insert(data::CONTENT.into(), Value::String(page.rendered.clone()));
            page.rendered =
                self.engines
                    .render_chain(&layout.engines, &layout.content, &layout_data, &name)?;

            next = data::get_str(&layout.data, data::LAYOUT).map(String::from);
            visited.push(name);
        }
        Ok(())
    }
}

/// The page's engines, unless its data overrides them.
fn engine_chain(page: &Page) -> Vec<String> {
    data::template_engines(&page.data).unwrap_or_else(|| page.engines.clone())
}

fn url_value(page: &Page) -> Value {
    page.url
        .clone()
        .map(Value::String)
        .unwrap_or(Value::Bool(false))
}

/// Context for rendering a page's own content.
fn render_data(page: &Page) -> Data {
    let mut data = page.data.clone();
    data.insert(data::URL.into(), url_value(page));
    data
}
