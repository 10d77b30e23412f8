//! Reusable components loaded from `_components` folders.
//!
//! Any directory named `_components` (configurable) contributes components.
//! Names are the dot-joined path inside the folder, without extension:
//!
//! ```text
//! _components/
//! ├── card.tera            → card
//! └── forms/
//!     └── button.tera      → forms.button
//! ```
//!
//! Components are rendered with their arguments as the only context. Tera
//! templates call them through the `comp` function:
//!
//! ```text
//! {{ comp(name="forms.button", label="Send") }}
//! ```

use crate::config::MarkdownConfig;
use crate::data::Data;
use crate::engines::markdown;
use crate::formats::{Formats, strip_ext};
use crate::loaders::{self, LoadError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Component '{0}' not found")]
    NotFound(String),
    #[error("Component '{name}' failed to render: {message}")]
    Render { name: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentKind {
    Tera,
    Markdown,
}

#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub source: PathBuf,
    /// Default arguments from the component's front matter.
    pub defaults: Data,
    kind: ComponentKind,
    body: String,
}

/// All loaded components, ready to render.
pub struct ComponentSet {
    components: BTreeMap<String, Component>,
    tera: tera::Tera,
    markdown: MarkdownConfig,
}

impl std::fmt::Debug for ComponentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSet")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ComponentSet {
    fn default() -> Self {
        Self::empty(MarkdownConfig::default())
    }
}

impl ComponentSet {
    pub fn empty(markdown: MarkdownConfig) -> Self {
        let mut tera = tera::Tera::default();
        tera.autoescape_on(vec![]);
        Self {
            components: BTreeMap::new(),
            tera,
            markdown,
        }
    }

    /// Load every component from the given folders.
    ///
    /// Folders are processed in order; a later (deeper) folder replaces a
    /// component of the same name.
    pub fn load(
        folders: &[PathBuf],
        formats: &Formats,
        markdown: MarkdownConfig,
    ) -> Result<Self, ComponentError> {
        let mut set = Self::empty(markdown);
        for folder in folders {
            for entry in WalkDir::new(folder)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                let Some(format) = formats.search(path).filter(|f| f.template) else {
                    tracing::debug!("Skipping non-template component file {}", path.display());
                    continue;
                };
                let kind = match format.engines.first().map(String::as_str) {
                    Some("tera") => ComponentKind::Tera,
                    Some("md") => ComponentKind::Markdown,
                    _ => continue,
                };
                let file_name = entry.file_name().to_string_lossy().to_string();
                let name = component_name(folder, path, strip_ext(&file_name, format));
                let loaded = loaders::load(path, format.loader)?;
                set.insert(Component {
                    name,
                    source: path.to_path_buf(),
                    defaults: loaded.data,
                    kind,
                    body: loaded.content.unwrap_or_default(),
                });
            }
        }
        Ok(set)
    }

    fn insert(&mut self, component: Component) {
        if let Some(previous) = self.components.get(&component.name) {
            tracing::warn!(
                "Component '{}' in {} replaces {}",
                component.name,
                component.source.display(),
                previous.source.display()
            );
        }
        if component.kind == ComponentKind::Tera {
            // Registration errors surface when the component is rendered.
            if let Err(e) = self.tera.add_raw_template(&component.name, &component.body) {
                tracing::warn!("Component '{}' does not compile: {e}", component.name);
            }
        }
        self.components.insert(component.name.clone(), component);
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Render a component with the given arguments over its defaults.
    pub fn render(&self, name: &str, args: &Data) -> Result<String, ComponentError> {
        let component = self
            .components
            .get(name)
            .ok_or_else(|| ComponentError::NotFound(name.to_string()))?;
        let mut context_data = component.defaults.clone();
        context_data.extend(args.clone());

        match component.kind {
            ComponentKind::Markdown => Ok(markdown::render_markdown(&component.body, &self.markdown)),
            ComponentKind::Tera => {
                let context = tera::Context::from_value(serde_json::Value::Object(context_data))
                    .map_err(|e| render_error(name, &e))?;
                self.tera
                    .render(name, &context)
                    .map_err(|e| render_error(name, &e))
            }
        }
    }
}

fn render_error(name: &str, err: &tera::Error) -> ComponentError {
    ComponentError::Render {
        name: name.to_string(),
        message: crate::engines::tera::error_chain(err),
    }
}

/// `folder/forms/button.tera` → `forms.button`.
fn component_name(folder: &Path, path: &Path, stem: &str) -> String {
    let rel = path.strip_prefix(folder).unwrap_or(path);
    let mut parts: Vec<String> = rel
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    parts.push(stem.to_string());
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn args(value: serde_json::Value) -> Data {
        value.as_object().cloned().unwrap()
    }

    fn setup() -> (TempDir, ComponentSet) {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("_components");
        fs::create_dir_all(folder.join("forms")).unwrap();
        fs::write(
            folder.join("card.tera"),
            "---\ntone: plain\n---\n<div class=\"card {{ tone }}\">{{ title }}</div>",
        )
        .unwrap();
        fs::write(
            folder.join("forms/button.tera"),
            "<button>{{ label }}</button>",
        )
        .unwrap();
        fs::write(folder.join("note.md"), "**Note**").unwrap();
        fs::write(folder.join("readme.txt"), "ignored").unwrap();

        let set = ComponentSet::load(
            &[folder],
            &Formats::stock(&[]),
            MarkdownConfig::default(),
        )
        .unwrap();
        (tmp, set)
    }

    #[test]
    fn names_follow_folder_structure() {
        let (_tmp, set) = setup();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["card", "forms.button", "note"]);
    }

    #[test]
    fn renders_with_arguments() {
        let (_tmp, set) = setup();
        let html = set.render("forms.button", &args(json!({"label": "Send"}))).unwrap();
        assert_eq!(html, "<button>Send</button>");
    }

    #[test]
    fn front_matter_provides_defaults() {
        let (_tmp, set) = setup();
        let html = set.render("card", &args(json!({"title": "T"}))).unwrap();
        assert_eq!(html, "<div class=\"card plain\">T</div>");
        let html = set
            .render("card", &args(json!({"title": "T", "tone": "loud"})))
            .unwrap();
        assert!(html.contains("card loud"));
    }

    #[test]
    fn markdown_components_render_html() {
        let (_tmp, set) = setup();
        let html = set.render("note", &Data::new()).unwrap();
        assert!(html.contains("<strong>Note</strong>"));
    }

    #[test]
    fn missing_component_is_error() {
        let (_tmp, set) = setup();
        let result = set.render("nope", &Data::new());
        assert!(matches!(result, Err(ComponentError::NotFound(_))));
    }

    #[test]
    fn later_folder_replaces_component() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("_components");
        let nested = tmp.path().join("blog/_components");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.join("card.tera"), "root").unwrap();
        fs::write(nested.join("card.tera"), "nested").unwrap();

        let set = ComponentSet::load(
            &[root, nested],
            &Formats::stock(&[]),
            MarkdownConfig::default(),
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.render("card", &Data::new()).unwrap(), "nested");
    }
}
