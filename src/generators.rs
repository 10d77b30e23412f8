//! Generator pages: one source page that expands into many.
//!
//! Two forms are supported. Pagination is declared in data:
//!
//! ```yaml
//! paginate:
//!   search: post          # or `items: some.data.key`
//!   sort: date=desc
//!   size: 10
//!   url: ./page-{page}/   # pages after the first; relative to the directory
//! ```
//!
//! Each generated page receives `results` (the items of its chunk) and
//! `pagination = { page, total_pages, total_results, previous, next }`.
//!
//! Named generators are functions registered on the site and selected with
//! `generator = "name"`. Every item they return is merged over the page data;
//! when more than one item comes back each one must carry its own `url`.

use crate::data::{self, Data, MergedKeys};
use crate::page::{Page, UrlError, resolve_url, resolve_url_str};
use crate::search::{self, Searcher};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub const PAGINATE: &str = "paginate";
pub const GENERATOR: &str = "generator";
pub const RESULTS: &str = "results";
pub const PAGINATION: &str = "pagination";

/// A named generator: receives the page data and the searcher, returns the
/// data of each page to produce.
pub type GeneratorFn = dyn Fn(&Data, &Searcher) -> Result<Vec<Data>, String> + Send + Sync;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Invalid paginate options in {path}: {message}")]
    InvalidPaginate { path: PathBuf, message: String },
    #[error("Paginate items '{key}' in {path} is not a list")]
    ItemsNotAList { path: PathBuf, key: String },
    #[error("Unknown generator '{name}' in {path}")]
    Unknown { path: PathBuf, name: String },
    #[error("Generator '{name}' failed for {path}: {message}")]
    Failed {
        path: PathBuf,
        name: String,
        message: String,
    },
    #[error("Generator '{name}' for {path} returned {count} pages; item {index} has no url")]
    MissingUrl {
        path: PathBuf,
        name: String,
        count: usize,
        index: usize,
    },
    #[error("Invalid generated url in {path}: {source}")]
    InvalidUrl {
        path: PathBuf,
        #[source]
        source: UrlError,
    },
}

/// Named generators registered on a site.
#[derive(Default)]
pub struct Generators {
    named: BTreeMap<String, Box<GeneratorFn>>,
}

impl Generators {
    pub fn insert<F>(&mut self, name: &str, generator: F)
    where
        F: Fn(&Data, &Searcher) -> Result<Vec<Data>, String> + Send + Sync + 'static,
    {
        self.named.insert(name.to_string(), Box::new(generator));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaginateOptions {
    items: Option<String>,
    search: Option<String>,
    #[serde(default)]
    sort: String,
    #[serde(default = "default_size")]
    size: usize,
    #[serde(default = "default_url_template")]
    url: String,
}

fn default_size() -> usize {
    10
}

fn default_url_template() -> String {
    "./page-{page}/".to_string()
}

/// Whether a page expands into other pages.
pub fn is_generator(page: &Page) -> bool {
    page.data.contains_key(PAGINATE) || page.data.contains_key(GENERATOR)
}

/// Expand a generator page. Other pages come back unchanged.
pub fn expand(
    page: Page,
    generators: &Generators,
    searcher: &Searcher,
    merged_keys: &MergedKeys,
) -> Result<Vec<Page>, GeneratorError> {
    if let Some(options) = page.data.get(PAGINATE).cloned() {
        return paginate(page, options, searcher);
    }
    match page.data.get(GENERATOR).cloned() {
        Some(Value::String(name)) => run_named(page, &name, generators, searcher, merged_keys),
        Some(other) => Err(GeneratorError::Unknown {
            path: page.src.rel_path.clone(),
            name: other.to_string(),
        }),
        None => Ok(vec![page]),
    }
}

fn paginate(page: Page, options: Value, searcher: &Searcher) -> Result<Vec<Page>, GeneratorError> {
    let path = page.src.rel_path.clone();
    let options: PaginateOptions = match options {
        Value::String(query) => PaginateOptions {
            items: None,
            search: Some(query),
            sort: String::new(),
            size: default_size(),
            url: default_url_template(),
        },
        other => serde_json::from_value(other).map_err(|e| GeneratorError::InvalidPaginate {
            path: path.clone(),
            message: e.to_string(),
        })?,
    };
    if options.size == 0 {
        return Err(GeneratorError::InvalidPaginate {
            path,
            message: "size must be at least 1".into(),
        });
    }

    let items: Vec<Value> = match &options.items {
        Some(key) => {
            let Some(Value::Array(items)) = data::lookup(&page.data, key) else {
                return Err(GeneratorError::ItemsNotAList {
                    path,
                    key: key.clone(),
                });
            };
            let mut items = items.clone();
            if !options.sort.is_empty() && items.iter().all(Value::is_object) {
                let mut objects: Vec<Data> = items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect();
                search::sort_pages(&mut objects, &options.sort);
                items = objects.into_iter().map(Value::Object).collect();
            }
            items
        }
        None => {
            let query = options.search.as_deref().unwrap_or("");
            let own_url = page.url.clone().map(Value::String);
            searcher
                .pages(query, &options.sort, None)
                .into_iter()
                .filter(|p| p.get(data::URL) != own_url.as_ref())
                .map(Value::Object)
                .collect()
        }
    };

    let total_results = items.len();
    let chunks: Vec<Vec<Value>> = if items.is_empty() {
        vec![Vec::new()]
    } else {
        items.chunks(options.size).map(<[Value]>::to_vec).collect()
    };
    let total_pages = chunks.len();

    let mut urls: Vec<Option<String>> = Vec::with_capacity(total_pages);
    for number in 1..=total_pages {
        if number == 1 {
            urls.push(page.url.clone());
        } else {
            let template = options.url.replace("{page}", &number.to_string());
            let url = resolve_url_str(&template, &page.src.dir_url).map_err(|source| {
                GeneratorError::InvalidUrl {
                    path: path.clone(),
                    source,
                }
            })?;
            urls.push(Some(url));
        }
    }

    let pages = chunks
        .into_iter()
        .enumerate()
        .map(|(index, results)| {
            let mut generated = page.clone();
            generated.data.remove(PAGINATE);
            generated.data.insert(RESULTS.into(), Value::Array(results));
            generated.data.insert(
                PAGINATION.into(),
                json!({
                    "page": index + 1,
                    "total_pages": total_pages,
                    "total_results": total_results,
                    "previous": index.checked_sub(1).and_then(|i| urls[i].clone()),
                    "next": urls.get(index + 1).cloned().flatten(),
                }),
            );
            generated.url = urls[index].clone();
            generated
        })
        .collect();
    Ok(pages)
}

fn run_named(
    page: Page,
    name: &str,
    generators: &Generators,
    searcher: &Searcher,
    merged_keys: &MergedKeys,
) -> Result<Vec<Page>, GeneratorError> {
    let path = page.src.rel_path.clone();
    let generator = generators
        .named
        .get(name)
        .ok_or_else(|| GeneratorError::Unknown {
            path: path.clone(),
            name: name.to_string(),
        })?;
    let items = generator(&page.data, searcher).map_err(|message| GeneratorError::Failed {
        path: path.clone(),
        name: name.to_string(),
        message,
    })?;

    let count = items.len();
    if count > 1 {
        if let Some(index) = items.iter().position(|item| !item.contains_key(data::URL)) {
            return Err(GeneratorError::MissingUrl {
                path,
                name: name.to_string(),
                count,
                index,
            });
        }
    }

    let mut base = page;
    base.data.remove(GENERATOR);
    items
        .into_iter()
        .map(|item| {
            let mut generated = base.clone();
            generated.data = data::merge_data(&base.data, &item, merged_keys);
            let default = base.url.clone().unwrap_or_default();
            generated.url = match item.get(data::URL) {
                Some(value) => resolve_url(Some(value), &base.src.dir_url, default).map_err(
                    |source| GeneratorError::InvalidUrl {
                        path: path.clone(),
                        source,
                    },
                )?,
                None => base.url.clone(),
            };
            Ok(generated)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_merged_keys;
    use crate::formats::PageType;
    use crate::page::SourceInfo;
    use crate::test_helpers::urls_of;

    fn page(data: Value, url: &str) -> Page {
        Page {
            src: SourceInfo {
                rel_path: PathBuf::from("blog/index.tera"),
                ext: ".tera".into(),
                dir_url: "/blog/".into(),
            },
            page_type: PageType::Page,
            data: data.as_object().cloned().unwrap(),
            content: String::new(),
            rendered: String::new(),
            url: Some(url.to_string()),
            engines: vec!["tera".into()],
        }
    }

    fn searcher(count: usize) -> Searcher {
        let s = Searcher::new();
        s.update(
            (1..=count)
                .map(|i| {
                    json!({"url": format!("/blog/p{i}/"), "tags": ["post"], "date": format!("2024-01-{i:02}")})
                        .as_object()
                        .cloned()
                        .unwrap()
                })
                .collect(),
        );
        s
    }

    fn expand_one(p: Page, s: &Searcher) -> Vec<Page> {
        expand(p, &Generators::default(), s, &default_merged_keys()).unwrap()
    }

    #[test]
    fn plain_pages_pass_through() {
        let pages = expand_one(page(json!({"title": "x"}), "/blog/"), &Searcher::new());
        assert_eq!(pages.len(), 1);
        assert!(!pages[0].data.contains_key(RESULTS));
    }

    #[test]
    fn paginates_search_results() {
        let p = page(json!({"paginate": {"search": "post", "size": 2, "sort": "date=desc"}}), "/blog/");
        let pages = expand_one(p, &searcher(5));
        assert_eq!(urls_of(&pages), vec!["/blog/", "/blog/page-2/", "/blog/page-3/"]);

        let first = &pages[0];
        assert_eq!(first.data[RESULTS][0]["url"], "/blog/p5/");
        assert_eq!(first.data[PAGINATION]["total_pages"], 3);
        assert_eq!(first.data[PAGINATION]["total_results"], 5);
        assert_eq!(first.data[PAGINATION]["previous"], Value::Null);
        assert_eq!(first.data[PAGINATION]["next"], "/blog/page-2/");

        let last = &pages[2];
        assert_eq!(last.data[RESULTS].as_array().unwrap().len(), 1);
        assert_eq!(last.data[PAGINATION]["previous"], "/blog/page-2/");
        assert_eq!(last.data[PAGINATION]["next"], Value::Null);
        assert!(!last.data.contains_key(PAGINATE));
    }

    #[test]
    fn paginates_data_items_with_custom_url() {
        let p = page(
            json!({"people": ["a", "b", "c"], "paginate": {"items": "people", "size": 1, "url": "/people/{page}/"}}),
            "/people/",
        );
        let pages = expand_one(p, &Searcher::new());
        assert_eq!(urls_of(&pages), vec!["/people/", "/people/2/", "/people/3/"]);
        assert_eq!(pages[1].data[RESULTS], json!(["b"]));
    }

    #[test]
    fn empty_results_still_produce_a_page() {
        let p = page(json!({"paginate": "missing-tag"}), "/blog/");
        let pages = expand_one(p, &searcher(3));
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].data[PAGINATION]["total_results"], 0);
    }

    #[test]
    fn invalid_paginate_options() {
        let s = Searcher::new();
        let gens = Generators::default();
        let keys = default_merged_keys();
        let p = page(json!({"paginate": {"size": 0}}), "/blog/");
        assert!(matches!(
            expand(p, &gens, &s, &keys),
            Err(GeneratorError::InvalidPaginate { .. })
        ));
        let p = page(json!({"paginate": {"bogus": 1}}), "/blog/");
        assert!(matches!(
            expand(p, &gens, &s, &keys),
            Err(GeneratorError::InvalidPaginate { .. })
        ));
        let p = page(json!({"n": 1, "paginate": {"items": "n"}}), "/blog/");
        assert!(matches!(
            expand(p, &gens, &s, &keys),
            Err(GeneratorError::ItemsNotAList { .. })
        ));
    }

    fn tag_pages() -> Generators {
        let mut gens = Generators::default();
        gens.insert(
            "tags",
            |_data: &Data, searcher: &Searcher| {
                Ok(searcher
                    .values("tags", "")
                    .into_iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .map(|tag| {
                        json!({"url": format!("./{tag}/"), "title": tag, "tag": tag})
                            .as_object()
                            .cloned()
                            .unwrap()
                    })
                    .collect())
            },
        );
        gens
    }

    #[test]
    fn named_generator_expands() {
        let s = Searcher::new();
        s.update(vec![json!({"tags": ["rust", "web"]}).as_object().cloned().unwrap()]);
        let p = page(json!({"generator": "tags", "layout": "tag.tera"}), "/blog/");
        let pages = expand(p, &tag_pages(), &s, &default_merged_keys()).unwrap();
        assert_eq!(urls_of(&pages), vec!["/blog/rust/", "/blog/web/"]);
        assert_eq!(pages[0].data["layout"], "tag.tera");
        assert_eq!(pages[0].data["title"], "rust");
        assert!(!pages[0].data.contains_key(GENERATOR));
    }

    #[test]
    fn named_generator_errors() {
        let s = Searcher::new();
        let keys = default_merged_keys();
        let p = page(json!({"generator": "nope"}), "/blog/");
        assert!(matches!(
            expand(p, &Generators::default(), &s, &keys),
            Err(GeneratorError::Unknown { .. })
        ));

        let mut gens = Generators::default();
        gens.insert("two", |_: &Data, _: &Searcher| Ok(vec![Data::new(), Data::new()]));
        gens.insert("fails", |_: &Data, _: &Searcher| Err("boom".to_string()));
        let p = page(json!({"generator": "two"}), "/blog/");
        assert!(matches!(
            expand(p, &gens, &s, &keys),
            Err(GeneratorError::MissingUrl { count: 2, index: 0, .. })
        ));
        let p = page(json!({"generator": "fails"}), "/blog/");
        assert!(matches!(
            expand(p, &gens, &s, &keys),
            Err(GeneratorError::Failed { .. })
        ));
    }

    #[test]
    fn single_item_keeps_page_url() {
        let mut gens = Generators::default();
        gens.insert("one", |_: &Data, _: &Searcher| {
            Ok(vec![json!({"title": "Only"}).as_object().cloned().unwrap()])
        });
        let p = page(json!({"generator": "one"}), "/blog/");
        let pages = expand(p, &gens, &Searcher::new(), &default_merged_keys()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url.as_deref(), Some("/blog/"));
        assert_eq!(pages[0].data["title"], "Only");
    }
}
