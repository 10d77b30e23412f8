//! Multilanguage sites.
//!
//! Configured through `[multilanguage]` in `_config.toml`:
//!
//! ```toml
//! [multilanguage]
//! languages = ["en", "gl"]
//! default_language = "en"
//! ```
//!
//! A page whose `lang` is a list becomes one page per language. Values under
//! a language code override the shared data for that language:
//!
//! ```yaml
//! lang: [en, gl]
//! title: Welcome
//! gl:
//!   title: Benvida
//! ```
//!
//! Non-default languages live under `/<lang>/` unless their data sets `url`.
//! Pages that share an `id` (split pages share one automatically) get an
//! `alternates` list, and HTML output gets `<link rel="alternate">` tags and
//! a `lang` attribute on `<html>`.

use super::Plugin;
use crate::config::SiteConfig;
use crate::data::{self, Data};
use crate::engines::tera::site_url;
use crate::hooks::{ExtFilter, HookError};
use crate::page::{Page, resolve_url};
use crate::site::Site;
use maud::html;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ALTERNATES: &str = "alternates";

#[derive(Debug, Clone)]
pub struct Multilanguage {
    languages: Vec<String>,
    default_language: String,
    location: String,
    base_path: String,
}

impl Multilanguage {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            languages: config.multilanguage.languages.clone(),
            default_language: config.multilanguage.default_language().to_string(),
            location: config.location.clone(),
            base_path: config.base_path(),
        }
    }

    fn is_configured(&self, lang: &str) -> bool {
        self.languages.iter().any(|l| l == lang)
    }

    fn position(&self, lang: &str) -> usize {
        self.languages
            .iter()
            .position(|l| l == lang)
            .unwrap_or(usize::MAX)
    }

    /// URL of `url` in `lang`.
    fn prefixed(&self, url: &str, lang: &str) -> String {
        if lang == self.default_language {
            return url.to_string();
        }
        let prefix = format!("/{lang}");
        if url == prefix || url.starts_with(&format!("{prefix}/")) {
            url.to_string()
        } else {
            format!("{prefix}{url}")
        }
    }

    /// Split multi-language pages, prefix URLs and link alternates.
    pub fn localize(&self, pages: &mut Vec<Page>) -> Result<(), HookError> {
        let mut localized = Vec::with_capacity(pages.len());
        for page in std::mem::take(pages) {
            match page.data.get(data::LANG) {
                Some(Value::Array(_)) => localized.extend(self.split(page)?),
                Some(Value::String(lang)) if self.is_configured(lang) => {
                    let lang = lang.clone();
                    let mut page = page;
                    page.url = page.url.map(|url| self.prefixed(&url, &lang));
                    localized.push(page);
                }
                Some(Value::String(lang)) => {
                    tracing::warn!(
                        "{}: language '{}' is not configured",
                        page.source_display(),
                        lang
                    );
                    localized.push(page);
                }
                _ => localized.push(page),
            }
        }
        self.link_alternates(&mut localized);
        *pages = localized;
        Ok(())
    }

    fn split(&self, page: Page) -> Result<Vec<Page>, HookError> {
        let langs: Vec<String> = match page.data.get(data::LANG) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => return Ok(vec![page]),
        };

        let mut shared = page.data.clone();
        for code in self.languages.iter().chain(langs.iter()) {
            shared.remove(code);
        }
        let id = page
            .data
            .get(data::ID)
            .cloned()
            .unwrap_or_else(|| Value::String(page.source_display()));

        let mut split = Vec::with_capacity(langs.len());
        for lang in langs {
            if !self.is_configured(&lang) {
                tracing::warn!(
                    "{}: language '{}' is not configured",
                    page.source_display(),
                    lang
                );
                continue;
            }
            let specific: Data = match page.data.get(&lang) {
                Some(Value::Object(map)) => map.clone(),
                _ => Data::new(),
            };
            let mut localized = page.clone();
            localized.data = shared.clone();
            localized.data.extend(specific.clone());
            localized.data.insert(data::LANG.into(), Value::String(lang.clone()));
            localized.data.insert(data::ID.into(), id.clone());

            localized.url = match specific.get(data::URL) {
                Some(url) => {
                    let default = page.url.clone().unwrap_or_default();
                    resolve_url(Some(url), &page.src.dir_url, default).map_err(|e| {
                        HookError::OnPage {
                            page: page.source_display(),
                            message: e.to_string(),
                        }
                    })?
                }
                None => page.url.as_deref().map(|url| self.prefixed(url, &lang)),
            };
            split.push(localized);
        }
        Ok(split)
    }

    fn link_alternates(&self, pages: &mut [Page]) {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, page) in pages.iter().enumerate() {
            let Some(lang) = data::get_str(&page.data, data::LANG) else {
                continue;
            };
            if !self.is_configured(lang) {
                continue;
            }
            if let Some(id) = page.data.get(data::ID) {
                let key = match id {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                groups.entry(key).or_default().push(index);
            }
        }

        for indices in groups.values() {
            let mut members: Vec<&Page> = indices.iter().map(|&i| &pages[i]).collect();
            members.sort_by_key(|p| {
                self.position(data::get_str(&p.data, data::LANG).unwrap_or_default())
            });
            let alternates: Vec<Value> = members
                .iter()
                .filter_map(|p| {
                    let url = p.url.as_ref()?;
                    Some(json!({
                        "lang": p.data.get(data::LANG),
                        "url": url,
                        "title": p.data.get(data::TITLE),
                    }))
                })
                .collect();
            for &index in indices {
                pages[index]
                    .data
                    .insert(ALTERNATES.into(), Value::Array(alternates.clone()));
            }
        }
    }

    /// Add `<link rel="alternate">` tags and `<html lang>` to HTML output.
    pub fn inject_links(&self, page: &mut Page) {
        if let Some(lang) = data::get_str(&page.data, data::LANG) {
            page.rendered = set_html_lang(&page.rendered, lang);
        }
        let Some(Value::Array(alternates)) = page.data.get(ALTERNATES) else {
            return;
        };
        if alternates.len() < 2 {
            return;
        }
        let links = html! {
            @for alt in alternates {
                @if let (Some(lang), Some(url)) = (alt["lang"].as_str(), alt["url"].as_str()) {
                    link rel="alternate" hreflang=(lang) href=(site_url(url, &self.base_path, &self.location, true));
                }
            }
        }
        .into_string();
        if let Some(pos) = page.rendered.find("</head>") {
            page.rendered.insert_str(pos, &links);
        }
    }
}

/// Add `lang="..."` to the `<html>` tag unless it already has one.
fn set_html_lang(html: &str, lang: &str) -> String {
    let Some(start) = html.find("<html") else {
        return html.to_string();
    };
    let after = start + "<html".len();
    if !html[after..].starts_with(['>', ' ', '\n', '\t']) {
        return html.to_string();
    }
    let Some(end) = html[after..].find('>').map(|i| after + i) else {
        return html.to_string();
    };
    if html[after..end].contains("lang=") {
        return html.to_string();
    }
    format!("{} lang=\"{}\"{}", &html[..after], lang, &html[after..])
}

impl Plugin for Multilanguage {
    fn name(&self) -> &str {
        "multilanguage"
    }

    fn install(&self, site: &mut Site) {
        let plugin = Arc::new(self.clone());
        let localize = Arc::clone(&plugin);
        site.preprocess_all(ExtFilter::All, move |pages| localize.localize(pages));
        site.process(ExtFilter::exts(&[".html"]), move |page| {
            plugin.inject_links(page);
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MultilanguageConfig;
    use crate::formats::PageType;
    use crate::page::SourceInfo;
    use crate::test_helpers::{find_in, urls_of};
    use std::path::PathBuf;

    fn plugin() -> Multilanguage {
        let config = SiteConfig {
            location: "https://example.com/".into(),
            multilanguage: MultilanguageConfig {
                languages: vec!["en".into(), "gl".into(), "es".into()],
                default_language: String::new(),
            },
            ..SiteConfig::default()
        };
        Multilanguage::from_config(&config)
    }

    fn page(src: &str, data: Value, url: &str) -> Page {
        Page {
            src: SourceInfo {
                rel_path: PathBuf::from(src),
                ext: ".md".into(),
                dir_url: "/about/".into(),
            },
            page_type: PageType::Page,
            data: data.as_object().cloned().unwrap(),
            content: String::new(),
            rendered: String::new(),
            url: Some(url.into()),
            engines: vec!["md".into()],
        }
    }

    #[test]
    fn splits_list_languages() {
        let mut pages = vec![page(
            "about/index.md",
            json!({"lang": ["en", "gl"], "title": "About", "gl": {"title": "Acerca"}}),
            "/about/",
        )];
        plugin().localize(&mut pages).unwrap();
        assert_eq!(urls_of(&pages), vec!["/about/", "/gl/about/"]);

        let gl = find_in(&pages, "/gl/about/");
        assert_eq!(gl.data["title"], "Acerca");
        assert_eq!(gl.data["lang"], "gl");
        assert!(!gl.data.contains_key("gl"));
        assert_eq!(gl.data["id"], "about/index.md");

        let en = find_in(&pages, "/about/");
        assert_eq!(en.data["title"], "About");
    }

    #[test]
    fn language_data_can_set_url() {
        let mut pages = vec![page(
            "about/index.md",
            json!({"lang": ["en", "gl"], "gl": {"url": "/sobre/"}}),
            "/about/",
        )];
        plugin().localize(&mut pages).unwrap();
        assert_eq!(urls_of(&pages), vec!["/about/", "/sobre/"]);
    }

    #[test]
    fn single_language_pages_are_prefixed() {
        let mut pages = vec![
            page("a.md", json!({"lang": "es"}), "/a/"),
            page("b.md", json!({"lang": "es"}), "/es/b/"),
            page("c.md", json!({"lang": "fr"}), "/c/"),
            page("d.md", json!({}), "/d/"),
        ];
        plugin().localize(&mut pages).unwrap();
        assert_eq!(urls_of(&pages), vec!["/c/", "/d/", "/es/a/", "/es/b/"]);
    }

    #[test]
    fn alternates_follow_language_order() {
        let mut pages = vec![
            page("es.md", json!({"lang": "es", "id": "home", "title": "Inicio"}), "/inicio/"),
            page("en.md", json!({"lang": "en", "id": "home", "title": "Home"}), "/"),
        ];
        plugin().localize(&mut pages).unwrap();
        let alternates = pages[0].data[ALTERNATES].as_array().unwrap();
        let langs: Vec<&str> = alternates.iter().map(|a| a["lang"].as_str().unwrap()).collect();
        assert_eq!(langs, vec!["en", "es"]);
        assert_eq!(alternates[1]["url"], "/es/inicio/");
        assert_eq!(alternates[1]["title"], "Inicio");
        assert_eq!(pages[1].data[ALTERNATES], pages[0].data[ALTERNATES]);
    }

    #[test]
    fn injects_links_and_lang() {
        let ml = plugin();
        let mut pages = vec![page(
            "index.md",
            json!({"lang": ["en", "gl"]}),
            "/",
        )];
        ml.localize(&mut pages).unwrap();
        let mut en = pages.remove(0);
        en.rendered = "<html><head><title>x</title></head><body></body></html>".into();
        ml.inject_links(&mut en);
        assert!(en.rendered.starts_with("<html lang=\"en\"><head>"));
        assert!(en.rendered.contains(
            "<link rel=\"alternate\" hreflang=\"gl\" href=\"https://example.com/gl/\">"
        ));
        assert!(en.rendered.contains("</title><link rel=\"alternate\" hreflang=\"en\""));
    }

    #[test]
    fn html_lang_is_not_duplicated() {
        assert_eq!(
            set_html_lang("<html lang=\"gl\"><body>", "en"),
            "<html lang=\"gl\"><body>"
        );
        assert_eq!(set_html_lang("<htmlx>", "en"), "<htmlx>");
        assert_eq!(set_html_lang("<p>no html</p>", "en"), "<p>no html</p>");
    }
}
