//! Preprocessors and processors.
//!
//! Both are ordered chains of hooks. Each hook is bound to an extension
//! filter: preprocessors match the source format (`.md`), processors match
//! the output file (`.html`). A hook either handles one page at a time,
//! run in parallel, or receives the whole matching set and may add or
//! remove pages.
//!
//! ```text
//! scan → [preprocess] → render → [process] → write
//! ```

use crate::page::Page;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("{0}")]
    Message(String),
    #[error("Hook failed on {page}: {message}")]
    OnPage { page: String, message: String },
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        HookError::Message(message.into())
    }
}

pub type PageHook = dyn Fn(&mut Page) -> Result<(), HookError> + Send + Sync;
pub type SetHook = dyn Fn(&mut Vec<Page>) -> Result<(), HookError> + Send + Sync;

/// Which pages a hook sees, by extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtFilter {
    All,
    Only(Vec<String>),
}

impl ExtFilter {
    /// Filter on the given extensions. Leading dots are optional.
    pub fn exts(exts: &[&str]) -> Self {
        ExtFilter::Only(
            exts.iter()
                .map(|e| format!(".{}", e.trim_start_matches('.').to_ascii_lowercase()))
                .collect(),
        )
    }

    pub fn matches(&self, ext: Option<&str>) -> bool {
        match self {
            ExtFilter::All => true,
            ExtFilter::Only(exts) => {
                ext.is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            }
        }
    }
}

/// Which extension a chain filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Source format extension.
    Preprocess,
    /// Output file extension.
    Process,
}

impl Stage {
    fn ext(self, page: &Page) -> Option<String> {
        match self {
            Stage::Preprocess => Some(page.src.ext.clone()),
            Stage::Process => page.output_ext(),
        }
    }
}

enum HookKind {
    Each(Box<PageHook>),
    All(Box<SetHook>),
}

struct Hook {
    filter: ExtFilter,
    kind: HookKind,
}

/// An ordered chain of hooks.
pub struct HookChain {
    stage: Stage,
    hooks: Vec<Hook>,
}

impl HookChain {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            hooks: Vec::new(),
        }
    }

    /// Add a hook that runs once per matching page.
    pub fn each<F>(&mut self, filter: ExtFilter, hook: F)
    where
        F: Fn(&mut Page) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.push(Hook {
            filter,
            kind: HookKind::Each(Box::new(hook)),
        });
    }

    /// Add a hook that receives every matching page at once.
    pub fn all<F>(&mut self, filter: ExtFilter, hook: F)
    where
        F: Fn(&mut Vec<Page>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.push(Hook {
            filter,
            kind: HookKind::All(Box::new(hook)),
        });
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in order over `pages`.
    pub fn run(&self, pages: &mut Vec<Page>) -> Result<(), HookError> {
        let stage = self.stage;
        for hook in &self.hooks {
            match &hook.kind {
                HookKind::Each(f) => pages
                    .par_iter_mut()
                    .filter(|page| hook.filter.matches(stage.ext(page).as_deref()))
                    .try_for_each(|page| {
                        f(page).map_err(|e| match e {
                            HookError::Message(message) => HookError::OnPage {
                                page: page.source_display(),
                                message,
                            },
                            other => other,
                        })
                    })?,
                HookKind::All(f) => {
                    if hook.filter == ExtFilter::All {
                        f(pages)?;
                        continue;
                    }
                    let (mut matching, others): (Vec<Page>, Vec<Page>) = std::mem::take(pages)
                        .into_iter()
                        .partition(|page| hook.filter.matches(stage.ext(page).as_deref()));
                    let result = f(&mut matching);
                    *pages = others;
                    pages.append(&mut matching);
                    result?;
                }
            }
        }
        Ok(())
    }
}
