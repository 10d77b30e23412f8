//! Page search used by templates and generators.
//!
//! Queries are whitespace-separated conditions that must all hold:
//!
//! | Condition | Matches when |
//! |-----------|--------------|
//! | `post` | `tags` contains `post` |
//! | `!post` | `tags` does not contain `post` |
//! | `lang=en` | value equals (or, for lists, contains) `en` |
//! | `lang!=en` | the above does not hold |
//! | `url^=/blog/` | value starts with the text |
//! | `title*=rust` | value contains the text |
//! | `order<=3`, `date>=2024` | compared numerically when both sides are numbers |
//!
//! Keys may be dotted (`author.name`). Sorting takes `key` or `key=asc|desc`
//! entries; pages without the key sort last.

use crate::data::{self, Data};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

const DEFAULT_SORT: &str = "date=asc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Tag,
    NotTag,
    Eq,
    Ne,
    Prefix,
    Contains,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    key: String,
    op: Op,
    value: String,
}

fn parse_query(query: &str) -> Vec<Condition> {
    query.split_whitespace().map(parse_condition).collect()
}

fn parse_condition(token: &str) -> Condition {
    let Some(eq) = token.find('=') else {
        return match token.strip_prefix('!') {
            Some(tag) => Condition {
                key: data::TAGS.to_string(),
                op: Op::NotTag,
                value: tag.to_string(),
            },
            None => Condition {
                key: data::TAGS.to_string(),
                op: Op::Tag,
                value: token.to_string(),
            },
        };
    };
    let value = token[eq + 1..].to_string();
    let (key, op) = match token[..eq].chars().last() {
        Some('!') => (&token[..eq - 1], Op::Ne),
        Some('^') => (&token[..eq - 1], Op::Prefix),
        Some('*') => (&token[..eq - 1], Op::Contains),
        Some('<') => (&token[..eq - 1], Op::Le),
        Some('>') => (&token[..eq - 1], Op::Ge),
        _ => (&token[..eq], Op::Eq),
    };
    Condition {
        key: key.to_string(),
        op,
        value,
    }
}

/// String form used for comparisons.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn equals(value: &Value, expected: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| text(v) == expected),
        other => text(other) == expected,
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

impl Condition {
    fn matches(&self, page: &Data) -> bool {
        let found = data::lookup(page, &self.key);
        match self.op {
            Op::Tag => found.is_some_and(|v| equals(v, &self.value)),
            Op::NotTag | Op::Ne => !found.is_some_and(|v| equals(v, &self.value)),
            Op::Eq => found.is_some_and(|v| equals(v, &self.value)),
            Op::Prefix => found.is_some_and(|v| text(v).starts_with(&self.value)),
            Op::Contains => found.is_some_and(|v| text(v).contains(&self.value)),
            Op::Le => found.is_some_and(|v| compare_text(&text(v), &self.value).is_le()),
            Op::Ge => found.is_some_and(|v| compare_text(&text(v), &self.value).is_ge()),
        }
    }
}

/// Whether `page` satisfies every condition of `query`.
pub fn matches(page: &Data, query: &str) -> bool {
    parse_query(query).iter().all(|c| c.matches(page))
}

fn parse_sort(sort: &str) -> Vec<(String, bool)> {
    let sort = if sort.trim().is_empty() {
        DEFAULT_SORT
    } else {
        sort
    };
    sort.split_whitespace()
        .map(|entry| match entry.split_once('=') {
            Some((key, dir)) => (key.to_string(), dir.eq_ignore_ascii_case("desc")),
            None => (entry.to_string(), false),
        })
        .collect()
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => text(a).cmp(&text(b)),
    }
}

/// Sort pages in place by a sort string such as `order date=desc`.
pub fn sort_pages(pages: &mut [Data], sort: &str) {
    let keys = parse_sort(sort);
    pages.sort_by(|a, b| {
        for (key, desc) in &keys {
            let ordering = match (data::lookup(a, key), data::lookup(b, key)) {
                (Some(x), Some(y)) => {
                    let o = compare_values(x, y);
                    if *desc { o.reverse() } else { o }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Searchable snapshot of page data.
///
/// The renderer replaces the snapshot after each render-order group, so a
/// group sees the content rendered by the groups before it.
#[derive(Debug, Default)]
pub struct Searcher {
    pages: RwLock<Arc<Vec<Data>>>,
}

impl Searcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, pages: Vec<Data>) {
        let mut guard = self.pages.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(pages);
    }

    pub fn snapshot(&self) -> Arc<Vec<Data>> {
        let guard = self.pages.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Pages matching `query`, sorted, optionally limited.
    pub fn pages(&self, query: &str, sort: &str, limit: Option<usize>) -> Vec<Data> {
        let snapshot = self.snapshot();
        let conditions = parse_query(query);
        let mut found: Vec<Data> = snapshot
            .iter()
            .filter(|page| conditions.iter().all(|c| c.matches(page)))
            .cloned()
            .collect();
        sort_pages(&mut found, sort);
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        found
    }

    /// Distinct values of `key` across matching pages, in first-seen order.
    /// List values contribute each item.
    pub fn values(&self, key: &str, query: &str) -> Vec<Value> {
        let snapshot = self.snapshot();
        let conditions = parse_query(query);
        let mut values: Vec<Value> = Vec::new();
        for page in snapshot
            .iter()
            .filter(|page| conditions.iter().all(|c| c.matches(page)))
        {
            let items = match data::lookup(page, key) {
                Some(Value::Array(items)) => items.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => vec![other.clone()],
            };
            for item in items {
                if !values.contains(&item) {
                    values.push(item);
                }
            }
        }
        values
    }
}
