//! The site: registries, extension points and the build pipeline.
//!
//! ```text
//! Site::load(root)
//!     │  _config.toml → formats, engines, plugins
//!     ▼
//! scan ──► components + includes ──► render ──► process ──► write
//! ```
//!
//! Customisation goes through the registration methods, each returning
//! `&mut Self` so they chain:
//!
//! ```rust,ignore
//! let mut site = Site::load(Path::new("."))?;
//! site.process(ExtFilter::exts(&[".html"]), |page| {
//!         page.rendered = page.rendered.replace("{{year}}", "2024");
//!         Ok(())
//!     })
//!     .generator("tags", |_data, search| Ok(tag_pages(search)));
//! let report = site.build(None)?;
//! ```

use crate::components::{ComponentError, ComponentSet};
use crate::config::{self, ConfigError, SiteConfig};
use crate::data::Data;
use crate::engines::{Engine, EngineError, EngineRegistry, Helpers};
use crate::formats::{Format, Formats};
use crate::generators::Generators;
use crate::hooks::{ExtFilter, HookChain, HookError, Stage};
use crate::page::Page;
use crate::plugins::{Multilanguage, Plugin};
use crate::renderer::{RenderError, Renderer};
use crate::search::Searcher;
use crate::source::{self, ScanError, ScannedSite};
use crate::writer::{self, WriteError, WriteStats};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Component(#[from] ComponentError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Processor failed: {0}")]
    Process(#[from] HookError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Progress reported while a build runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Scanned {
        pages: usize,
        assets: usize,
        static_files: usize,
        includes: usize,
        drafts_skipped: usize,
    },
    ComponentsLoaded {
        count: usize,
    },
    Rendered {
        pages: usize,
    },
    Processed {
        hooks: usize,
    },
    Written {
        stats: WriteStats,
    },
}

/// Result of a finished build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub dest: PathBuf,
    /// Pages and assets written to `dest`.
    pub outputs: usize,
    /// Pages rendered but not written (`url = false`).
    pub unwritten: usize,
    pub static_files: usize,
    pub write: WriteStats,
    pub duration: Duration,
}

pub struct Site {
    root: PathBuf,
    config: SiteConfig,
    formats: Formats,
    engines: EngineRegistry,
    preprocessors: HookChain,
    processors: HookChain,
    generators: Generators,
    searcher: Arc<Searcher>,
    plugins: Vec<String>,
}

impl Site {
    /// A site rooted at `root` with the given configuration.
    ///
    /// Installs the multilanguage plugin when languages are configured.
    pub fn new(root: impl Into<PathBuf>, config: SiteConfig) -> Self {
        let mut site = Self {
            root: root.into(),
            formats: Formats::stock(&config.assets),
            engines: EngineRegistry::stock(&config.markdown),
            preprocessors: HookChain::new(Stage::Preprocess),
            processors: HookChain::new(Stage::Process),
            generators: Generators::default(),
            searcher: Arc::new(Searcher::new()),
            plugins: Vec::new(),
            config,
        };
        if site.config.multilanguage.enabled() {
            let plugin = Multilanguage::from_config(&site.config);
            site.use_plugin(plugin);
        }
        site
    }

    /// Load `_config.toml` from `root` and create the site.
    pub fn load(root: &Path) -> Result<Self, BuildError> {
        let config = config::load_config(root)?;
        Ok(Self::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn dest(&self) -> PathBuf {
        self.root.join(&self.config.dest)
    }

    /// Names of the installed plugins, in install order.
    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a file format, replacing one with the same extension.
    pub fn format(&mut self, format: Format) -> &mut Self {
        self.formats.set(format);
        self
    }

    /// Register a template engine, replacing one with the same name.
    pub fn engine(&mut self, engine: impl Engine + 'static) -> &mut Self {
        self.engines.insert(Box::new(engine));
        self
    }

    /// Run `hook` on each page with a matching source extension, before rendering.
    pub fn preprocess<F>(&mut self, filter: ExtFilter, hook: F) -> &mut Self
    where
        F: Fn(&mut Page) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.preprocessors.each(filter, hook);
        self
    }

    /// Run `hook` once on all pages with a matching source extension, before rendering.
    pub fn preprocess_all<F>(&mut self, filter: ExtFilter, hook: F) -> &mut Self
    where
        F: Fn(&mut Vec<Page>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.preprocessors.all(filter, hook);
        self
    }

    /// Run `hook` on each page with a matching output extension, after rendering.
    pub fn process<F>(&mut self, filter: ExtFilter, hook: F) -> &mut Self
    where
        F: Fn(&mut Page) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.processors.each(filter, hook);
        self
    }

    /// Run `hook` once on all pages with a matching output extension, after rendering.
    pub fn process_all<F>(&mut self, filter: ExtFilter, hook: F) -> &mut Self
    where
        F: Fn(&mut Vec<Page>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.processors.all(filter, hook);
        self
    }

    /// Register a named generator for pages with `generator = "<name>"`.
    pub fn generator<F>(&mut self, name: &str, generator: F) -> &mut Self
    where
        F: Fn(&Data, &Searcher) -> Result<Vec<Data>, String> + Send + Sync + 'static,
    {
        self.generators.insert(name, generator);
        self
    }

    pub fn use_plugin(&mut self, plugin: impl Plugin) -> &mut Self {
        tracing::debug!("Installing plugin {}", plugin.name());
        plugin.install(self);
        self.plugins.push(plugin.name().to_string());
        self
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Scan the source tree without rendering.
    pub fn scan(&self) -> Result<ScannedSite, BuildError> {
        Ok(source::scan(&self.root, &self.config, &self.formats)?)
    }

    /// Scan, render, process and write the site.
    pub fn build(&mut self, events: Option<Sender<BuildEvent>>) -> Result<BuildReport, BuildError> {
        // `Site::new` takes the config as given; check it before `dest` is touched.
        self.config.validate()?;
        let start = Instant::now();
        let emit = |event: BuildEvent| {
            if let Some(tx) = &events {
                tx.send(event).ok();
            }
        };

        let scanned = self.scan()?;
        emit(BuildEvent::Scanned {
            pages: scanned.page_count(),
            assets: scanned.asset_count(),
            static_files: scanned.static_files.len(),
            includes: scanned.includes.len(),
            drafts_skipped: scanned.drafts_skipped,
        });

        let components = ComponentSet::load(
            &scanned.component_folders,
            &self.formats,
            self.config.markdown.clone(),
        )?;
        emit(BuildEvent::ComponentsLoaded {
            count: components.len(),
        });
        self.prepare_engines(&scanned, components)?;

        let renderer = Renderer {
            engines: &self.engines,
            includes: &scanned.includes,
            generators: &self.generators,
            preprocessors: &self.preprocessors,
            searcher: &self.searcher,
            merged_keys: &self.config.merged_keys,
        };
        let mut pages = renderer.render(scanned.pages)?;
        emit(BuildEvent::Rendered { pages: pages.len() });

        self.processors.run(&mut pages)?;
        emit(BuildEvent::Processed {
            hooks: self.processors.len(),
        });

        let dest = self.dest();
        let stats = writer::write_site(
            &dest,
            &pages,
            &scanned.static_files,
            self.config.empty_dest,
        )?;
        emit(BuildEvent::Written {
            stats: stats.clone(),
        });

        let outputs = pages.iter().filter(|p| p.url.is_some()).count();
        Ok(BuildReport {
            dest,
            outputs,
            unwritten: pages.len() - outputs,
            static_files: scanned.static_files.len(),
            write: stats,
            duration: start.elapsed(),
        })
    }

    /// Give every engine the site helpers and the includes it can render.
    fn prepare_engines(
        &mut self,
        scanned: &ScannedSite,
        components: ComponentSet,
    ) -> Result<(), BuildError> {
        let helpers = Helpers {
            search: Arc::clone(&self.searcher),
            components: Arc::new(components),
            location: self.config.location.clone(),
            base_path: self.config.base_path(),
        };
        for engine in self.engines.iter_mut() {
            engine.install_helpers(&helpers);
            let includes: Vec<(String, String)> = scanned
                .includes
                .values()
                .filter(|include| include.engines.iter().any(|e| e == engine.name()))
                .map(|include| (include.name.clone(), include.content.clone()))
                .collect();
            if !includes.is_empty() {
                engine.load_includes(&includes)?;
            }
        }
        Ok(())
    }
}
