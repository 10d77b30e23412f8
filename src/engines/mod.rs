//! Template engines.
//!
//! A page's content runs through a chain of engines (its format's engines,
//! or the `template_engine` data override). Each engine receives the output
//! of the previous one. Layouts run through the engines of the layout's own
//! format.
//!
//! Engines are shared across rendering threads, so they take `&self`;
//! engines that compile templates keep their cache behind a lock.

pub mod markdown;
pub mod tera;

use crate::components::ComponentSet;
use crate::config::MarkdownConfig;
use crate::data::Data;
use crate::search::Searcher;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

pub use self::markdown::MarkdownEngine;
pub use self::tera::TeraEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown template engine '{0}'")]
    Unknown(String),
    #[error("{engine} failed to render {filename}: {message}")]
    Render {
        engine: String,
        filename: String,
        message: String,
    },
}

/// Shared services handed to engines once the site is scanned.
#[derive(Clone)]
pub struct Helpers {
    pub search: Arc<Searcher>,
    pub components: Arc<ComponentSet>,
    /// Public base URL of the site.
    pub location: String,
    /// Path component of `location`, with leading and trailing slash.
    pub base_path: String,
}

/// A template engine.
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    /// Render `content` with `data` as the context.
    ///
    /// `filename` identifies the template in error messages and caches.
    fn render(&self, content: &str, data: &Data, filename: &str) -> Result<String, EngineError>;

    /// Register templates ahead of a parallel render. Engines without a
    /// compile step ignore this.
    fn preload(&self, _templates: &[(String, String)]) -> Result<(), EngineError> {
        Ok(())
    }

    /// Register the includes directory so templates can reference partials
    /// and parent layouts by their relative path.
    fn load_includes(&mut self, _includes: &[(String, String)]) -> Result<(), EngineError> {
        Ok(())
    }

    /// Install site helpers (search, components, URL helpers).
    fn install_helpers(&mut self, _helpers: &Helpers) {}
}

/// Engines by name.
#[derive(Default)]
pub struct EngineRegistry {
    engines: BTreeMap<String, Box<dyn Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markdown and Tera engines configured from site settings.
    pub fn stock(markdown: &MarkdownConfig) -> Self {
        let mut registry = Self::new();
        registry.insert(Box::new(MarkdownEngine::new(markdown.clone())));
        registry.insert(Box::new(TeraEngine::new(markdown.clone())));
        registry
    }

    /// Register an engine, replacing any engine with the same name.
    pub fn insert(&mut self, engine: Box<dyn Engine>) {
        self.engines.insert(engine.name().to_string(), engine);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Engine, EngineError> {
        self.engines
            .get(name)
            .map(|e| e.as_ref())
            .ok_or_else(|| EngineError::Unknown(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Engine>> {
        self.engines.values_mut()
    }

    /// Run `content` through the named engines in order.
    pub fn render_chain(
        &self,
        engines: &[String],
        content: &str,
        data: &Data,
        filename: &str,
    ) -> Result<String, EngineError> {
        let mut output = content.to_string();
        for name in engines {
            output = self.get(name)?.render(&output, data, filename)?;
        }
        Ok(output)
    }
}
