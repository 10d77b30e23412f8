//! Tera engine.
//!
//! Templates are compiled once and cached under `filename#hash`, so pages
//! generated from the same source share one compiled template while edited
//! content gets a fresh one. Files from the includes directory are registered
//! under their relative path for `{% include %}` and `{% extends %}`.
//!
//! Autoescaping is off: page content is already HTML by the time a layout
//! interpolates it.
//!
//! Helpers available in templates:
//!
//! | Name | Kind | Purpose |
//! |------|------|---------|
//! | `md` | filter | markdown to HTML (`inline=true` drops the paragraph) |
//! | `url` | filter | prefix a site path with the base path (`abs=true` for the full location) |
//! | `comp` | function | render a component: `comp(name="card", title=...)` |
//! | `search_pages` | function | `search_pages(query="post", sort="date=desc", limit=5)` |
//! | `search_values` | function | `search_values(key="tags", query="post")` |

use super::markdown::{render_inline, render_markdown};
use super::{Engine, EngineError, Helpers};
use crate::config::MarkdownConfig;
use crate::data::Data;
use ::tera::{Context, Tera, Value};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

struct State {
    tera: Tera,
    compiled: HashSet<String>,
}

pub struct TeraEngine {
    state: RwLock<State>,
}

impl TeraEngine {
    pub fn new(markdown: MarkdownConfig) -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter(
            "md",
            move |value: &Value, args: &HashMap<String, Value>| -> ::tera::Result<Value> {
                let text = value
                    .as_str()
                    .ok_or_else(|| ::tera::Error::msg("md filter expects a string"))?;
                let inline = args.get("inline").and_then(Value::as_bool).unwrap_or(false);
                let html = if inline {
                    render_inline(text, &markdown)
                } else {
                    render_markdown(text, &markdown)
                };
                Ok(Value::String(html))
            },
        );
        Self {
            state: RwLock::new(State {
                tera,
                compiled: HashSet::new(),
            }),
        }
    }

    fn compile(&self, key: &str, content: &str, filename: &str) -> Result<(), EngineError> {
        let already = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            state.compiled.contains(key)
        };
        if already {
            return Ok(());
        }
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.compiled.contains(key) {
            return Ok(());
        }
        state
            .tera
            .add_raw_template(key, content)
            .map_err(|e| render_error(filename, &e))?;
        state.compiled.insert(key.to_string());
        Ok(())
    }
}

impl Engine for TeraEngine {
    fn name(&self) -> &str {
        "tera"
    }

    fn render(&self, content: &str, data: &Data, filename: &str) -> Result<String, EngineError> {
        let key = template_key(filename, content);
        self.compile(&key, content, filename)?;
        let context = Context::from_value(Value::Object(data.clone()))
            .map_err(|e| render_error(filename, &e))?;
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .tera
            .render(&key, &context)
            .map_err(|e| render_error(filename, &e))
    }

    fn preload(&self, templates: &[(String, String)]) -> Result<(), EngineError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let pending: Vec<(String, &str)> = templates
            .iter()
            .map(|(filename, content)| (template_key(filename, content), content.as_str()))
            .filter(|(key, _)| !state.compiled.contains(key))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        // A failing template is left for `render` to report against its page.
        match state.tera.add_raw_templates(pending.iter().map(|(k, c)| (k.as_str(), *c))) {
            Ok(()) => {
                for (key, _) in pending {
                    state.compiled.insert(key);
                }
            }
            Err(e) => tracing::debug!("Batch template preload failed: {}", error_chain(&e)),
        }
        Ok(())
    }

    fn load_includes(&mut self, includes: &[(String, String)]) -> Result<(), EngineError> {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        state
            .tera
            .add_raw_templates(includes.iter().map(|(n, c)| (n.as_str(), c.as_str())))
            .map_err(|e| render_error("includes", &e))?;
        for (name, _) in includes {
            state.compiled.insert(name.clone());
        }
        Ok(())
    }

    fn install_helpers(&mut self, helpers: &Helpers) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        let tera = &mut state.tera;

        let base_path = helpers.base_path.clone();
        let location = helpers.location.clone();
        tera.register_filter(
            "url",
            move |value: &Value, args: &HashMap<String, Value>| -> ::tera::Result<Value> {
                let path = value
                    .as_str()
                    .ok_or_else(|| ::tera::Error::msg("url filter expects a string"))?;
                let abs = args.get("abs").and_then(Value::as_bool).unwrap_or(false);
                Ok(Value::String(site_url(path, &base_path, &location, abs)))
            },
        );

        let components = Arc::clone(&helpers.components);
        tera.register_function(
            "comp",
            move |args: &HashMap<String, Value>| -> ::tera::Result<Value> {
                let name = args
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ::tera::Error::msg("comp requires a `name` argument"))?;
                let data: Data = args
                    .iter()
                    .filter(|(k, _)| k.as_str() != "name")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                components
                    .render(name, &data)
                    .map(Value::String)
                    .map_err(|e| ::tera::Error::msg(e.to_string()))
            },
        );

        let search = Arc::clone(&helpers.search);
        tera.register_function(
            "search_pages",
            move |args: &HashMap<String, Value>| -> ::tera::Result<Value> {
                let query = args.get("query").and_then(Value::as_str).unwrap_or("");
                let sort = args.get("sort").and_then(Value::as_str).unwrap_or("");
                let limit = args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize);
                let pages = search.pages(query, sort, limit);
                Ok(Value::Array(pages.into_iter().map(Value::Object).collect()))
            },
        );

        let search = Arc::clone(&helpers.search);
        tera.register_function(
            "search_values",
            move |args: &HashMap<String, Value>| -> ::tera::Result<Value> {
                let key = args
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ::tera::Error::msg("search_values requires a `key` argument"))?;
                let query = args.get("query").and_then(Value::as_str).unwrap_or("");
                Ok(Value::Array(search.values(key, query)))
            },
        );
    }
}

fn template_key(filename: &str, content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex = format!("{:x}", digest);
    format!("{}#{}", filename, &hex[..16])
}

/// Join a site path with the base path, optionally with the full location.
pub fn site_url(path: &str, base_path: &str, location: &str, abs: bool) -> String {
    if path.contains("://") || path.starts_with("//") || path.starts_with('#') {
        return path.to_string();
    }
    let joined = format!(
        "{}{}",
        base_path.trim_end_matches('/'),
        if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    );
    if !abs {
        return joined;
    }
    let origin = location
        .split_once("://")
        .map(|(scheme, rest)| {
            let host = rest.split('/').next().unwrap_or(rest);
            format!("{scheme}://{host}")
        })
        .unwrap_or_default();
    format!("{origin}{joined}")
}

fn render_error(filename: &str, err: &::tera::Error) -> EngineError {
    EngineError::Render {
        engine: "tera".to_string(),
        filename: filename.to_string(),
        message: error_chain(err),
    }
}

/// Flatten a Tera error and its sources into one line.
pub fn error_chain(err: &::tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentSet;
    use crate::search::Searcher;
    use serde_json::json;

    fn data(value: Value) -> Data {
        value.as_object().cloned().unwrap()
    }

    fn engine() -> TeraEngine {
        TeraEngine::new(MarkdownConfig::default())
    }

    #[test]
    fn renders_variables() {
        let html = engine()
            .render("Hi {{ name }}", &data(json!({"name": "Ada"})), "a.tera")
            .unwrap();
        assert_eq!(html, "Hi Ada");
    }

    #[test]
    fn autoescape_is_off() {
        let html = engine()
            .render("{{ content }}", &data(json!({"content": "<p>x</p>"})), "l.tera")
            .unwrap();
        assert_eq!(html, "<p>x</p>");
    }

    #[test]
    fn same_filename_different_content() {
        let e = engine();
        assert_eq!(e.render("one", &Data::new(), "x.tera").unwrap(), "one");
        assert_eq!(e.render("two", &Data::new(), "x.tera").unwrap(), "two");
    }

    #[test]
    fn syntax_error_names_the_file() {
        let err = engine()
            .render("{% if %}", &Data::new(), "broken.tera")
            .unwrap_err();
        assert!(err.to_string().contains("broken.tera"));
    }

    #[test]
    fn includes_resolve_by_relative_path() {
        let mut e = engine();
        e.load_includes(&[
            ("partials/nav.tera".into(), "<nav>{{ title }}</nav>".into()),
            (
                "layouts/base.tera".into(),
                "<body>{% block main %}{% endblock %}</body>".into(),
            ),
        ])
        .unwrap();
        let html = e
            .render(
                "{% include \"partials/nav.tera\" %}",
                &data(json!({"title": "T"})),
                "p.tera",
            )
            .unwrap();
        assert_eq!(html, "<nav>T</nav>");

        let html = e
            .render(
                "{% extends \"layouts/base.tera\" %}{% block main %}hi{% endblock %}",
                &Data::new(),
                "child.tera",
            )
            .unwrap();
        assert_eq!(html, "<body>hi</body>");
    }

    #[test]
    fn preload_then_render() {
        let e = engine();
        e.preload(&[("a.tera".into(), "A{{ n }}".into())]).unwrap();
        assert_eq!(e.render("A{{ n }}", &data(json!({"n": 1})), "a.tera").unwrap(), "A1");
    }

    #[test]
    fn preload_with_broken_template_defers_error() {
        let e = engine();
        e.preload(&[
            ("ok.tera".into(), "ok".into()),
            ("bad.tera".into(), "{% for %}".into()),
        ])
        .unwrap();
        assert_eq!(e.render("ok", &Data::new(), "ok.tera").unwrap(), "ok");
        assert!(e.render("{% for %}", &Data::new(), "bad.tera").is_err());
    }

    #[test]
    fn md_filter() {
        let html = engine()
            .render("{{ text | md(inline=true) }}", &data(json!({"text": "*hi*"})), "m.tera")
            .unwrap();
        assert_eq!(html, "<em>hi</em>");
    }

    fn helpers() -> Helpers {
        let search = Searcher::new();
        search.update(vec![
            data(json!({"url": "/a/", "title": "A", "tags": ["post"], "date": "2024-01-01"})),
            data(json!({"url": "/b/", "title": "B", "tags": ["post", "rust"], "date": "2024-02-01"})),
            data(json!({"url": "/c/", "title": "C", "tags": ["page"]})),
        ]);
        Helpers {
            search: Arc::new(search),
            components: Arc::new(ComponentSet::default()),
            location: "https://example.com/docs/".into(),
            base_path: "/docs/".into(),
        }
    }

    #[test]
    fn url_filter_prefixes_base_path() {
        let mut e = engine();
        e.install_helpers(&helpers());
        let html = e.render("{{ \"/about/\" | url }}", &Data::new(), "u.tera").unwrap();
        assert_eq!(html, "/docs/about/");
        let html = e
            .render("{{ \"/about/\" | url(abs=true) }}", &Data::new(), "u.tera")
            .unwrap();
        assert_eq!(html, "https://example.com/docs/about/");
    }

    #[test]
    fn search_pages_function() {
        let mut e = engine();
        e.install_helpers(&helpers());
        let html = e
            .render(
                "{% for p in search_pages(query=\"post\", sort=\"date=desc\") %}{{ p.title }}{% endfor %}",
                &Data::new(),
                "s.tera",
            )
            .unwrap();
        assert_eq!(html, "BA");
    }

    #[test]
    fn search_values_function() {
        let mut e = engine();
        e.install_helpers(&helpers());
        let html = e
            .render(
                "{{ search_values(key=\"tags\") | join(sep=\",\") }}",
                &Data::new(),
                "v.tera",
            )
            .unwrap();
        assert_eq!(html, "post,rust,page");
    }

    #[test]
    fn comp_without_component_is_error() {
        let mut e = engine();
        e.install_helpers(&helpers());
        let result = e.render("{{ comp(name=\"missing\") }}", &Data::new(), "c.tera");
        assert!(result.is_err());
    }

    #[test]
    fn site_url_leaves_external_links() {
        assert_eq!(
            site_url("https://x.org/a", "/docs/", "https://example.com/docs/", false),
            "https://x.org/a"
        );
        assert_eq!(site_url("about/", "/", "http://localhost/", false), "/about/");
    }
}
