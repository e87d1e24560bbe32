//! Path traversal over documents.
//!
//! A traversal resolves one indexed path against a document and yields
//! every value the path reaches. Arrays met on the way expand to their
//! elements; the outermost array of documents crossed is remembered as the
//! occurrence's anchor so correlated generation can regroup by element.

use crate::{options::IndexedPath, value::Value};
use std::borrow::Cow;

///
/// Anchor
///
/// Outermost array of documents crossed to reach an occurrence.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Anchor {
    pub array_path: String,
    pub element: usize,
}

///
/// Leaf
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Leaf<'a> {
    Value(&'a Value),
    /// An empty array at the leaf.
    Undefined,
    /// Some elements of an array of documents lack the remaining path.
    MaybeUndefined,
}

///
/// Occurrence
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Occurrence<'a> {
    pub path: Cow<'a, str>,
    pub leaf: Leaf<'a>,
    pub anchor: Option<Anchor>,
}

///
/// PathMatches
///

#[derive(Debug, Default)]
pub(crate) struct PathMatches<'a> {
    pub occurrences: Vec<Occurrence<'a>>,
    pub has_array_values: bool,
}

/// Resolve `indexed` against `document`.
pub(crate) fn collect<'a>(document: &'a Value, indexed: &'a IndexedPath) -> PathMatches<'a> {
    let parts: Vec<&str> = if indexed.path.is_empty() {
        Vec::new()
    } else {
        indexed.path.split('.').collect()
    };

    let mut walker = Walker {
        indexed,
        parts,
        matches: PathMatches::default(),
    };

    if indexed.is_wildcard {
        walker.walk_wildcard_prefix(document, 0, None);
    } else {
        let mut partial = false;
        walker.walk(document, 0, None, &mut partial);
        if partial {
            walker.matches.occurrences.push(Occurrence {
                path: Cow::Borrowed(indexed.path.as_str()),
                leaf: Leaf::MaybeUndefined,
                anchor: None,
            });
        }
    }

    walker.matches
}

struct Walker<'a> {
    indexed: &'a IndexedPath,
    parts: Vec<&'a str>,
    matches: PathMatches<'a>,
}

impl<'a> Walker<'a> {
    fn push(&mut self, path: Cow<'a, str>, leaf: Leaf<'a>, anchor: Option<&Anchor>) {
        self.matches.occurrences.push(Occurrence {
            path,
            leaf,
            anchor: anchor.cloned(),
        });
    }

    fn array_path(&self, depth: usize) -> String {
        self.parts[..depth].join(".")
    }

    // Returns whether anything was emitted below `current`.
    fn walk(
        &mut self,
        current: &'a Value,
        depth: usize,
        anchor: Option<&Anchor>,
        partial: &mut bool,
    ) -> bool {
        let Some(part) = self.parts.get(depth).copied() else {
            self.emit_leaf(current, anchor);
            return true;
        };

        match current {
            Value::Document(_) => current
                .get(part)
                .is_some_and(|next| self.walk(next, depth + 1, anchor, partial)),
            Value::Array(items) => {
                self.matches.has_array_values = true;

                let mut found = false;
                if let Some(item) = part.parse::<usize>().ok().and_then(|i| items.get(i)) {
                    found |= self.walk(item, depth + 1, anchor, partial);
                }

                let (mut element_found, mut missing) = (false, false);
                for (element, item) in items.iter().enumerate() {
                    if !item.is_document() {
                        continue;
                    }

                    let element_anchor = anchor.cloned().unwrap_or_else(|| Anchor {
                        array_path: self.array_path(depth),
                        element,
                    });
                    if self.walk(item, depth, Some(&element_anchor), partial) {
                        element_found = true;
                    } else {
                        missing = true;
                    }
                }

                if element_found && missing {
                    *partial = true;
                }

                found || element_found
            }
            _ => false,
        }
    }

    fn emit_leaf(&mut self, value: &'a Value, anchor: Option<&Anchor>) {
        let path = Cow::Borrowed(self.indexed.path.as_str());

        match value {
            Value::Array(items) => {
                self.matches.has_array_values = true;
                if items.is_empty() {
                    self.push(path.clone(), Leaf::Undefined, anchor);
                }
                for item in items {
                    self.push(path.clone(), Leaf::Value(item), anchor);
                }
            }
            other => self.push(path, Leaf::Value(other), anchor),
        }
    }

    // Resolve the wildcard prefix, then descend below it.
    fn walk_wildcard_prefix(&mut self, current: &'a Value, depth: usize, anchor: Option<&Anchor>) {
        if depth == self.parts.len() {
            let prefix = self.indexed.path.as_str();
            match current {
                Value::Document(fields) => {
                    for (key, value) in fields {
                        self.descend(join(prefix, key), value, anchor);
                    }
                }
                Value::Array(_) if depth > 0 => {
                    self.descend(Cow::Borrowed(prefix), current, anchor);
                }
                _ => {}
            }
            return;
        }

        let part = self.parts[depth];
        match current {
            Value::Document(_) => {
                if let Some(next) = current.get(part) {
                    self.walk_wildcard_prefix(next, depth + 1, anchor);
                }
            }
            Value::Array(items) => {
                self.matches.has_array_values = true;
                for (element, item) in items.iter().enumerate() {
                    if item.is_document() {
                        let element_anchor = anchor.cloned().unwrap_or_else(|| Anchor {
                            array_path: self.array_path(depth),
                            element,
                        });
                        self.walk_wildcard_prefix(item, depth, Some(&element_anchor));
                    }
                }
            }
            _ => {}
        }
    }

    fn descend(&mut self, path: Cow<'a, str>, value: &'a Value, anchor: Option<&Anchor>) {
        match value {
            Value::Document(fields) if !fields.is_empty() => {
                for (key, nested) in fields {
                    self.descend(join(&path, key), nested, anchor);
                }
            }
            Value::Array(items) => {
                self.matches.has_array_values = true;
                for (element, item) in items.iter().enumerate() {
                    match item {
                        Value::Document(fields) if !fields.is_empty() => {
                            let element_anchor = anchor.cloned().unwrap_or_else(|| Anchor {
                                array_path: path.to_string(),
                                element,
                            });
                            for (key, nested) in fields {
                                self.descend(join(&path, key), nested, Some(&element_anchor));
                            }
                        }
                        other => self.push(path.clone(), Leaf::Value(other), anchor),
                    }
                }
            }
            other => self.push(path, Leaf::Value(other), anchor),
        }
    }
}

fn join<'a>(prefix: &str, key: &str) -> Cow<'a, str> {
    if prefix.is_empty() {
        Cow::Owned(key.to_string())
    } else {
        Cow::Owned(format!("{prefix}.{key}"))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> Value {
        Value::parse_json(json).expect("json")
    }

    fn values<'a>(matches: &PathMatches<'a>) -> Vec<(String, Leaf<'a>)> {
        matches
            .occurrences
            .iter()
            .map(|o| (o.path.to_string(), o.leaf))
            .collect()
    }

    #[test]
    fn plain_path_reaches_nested_value() {
        let document = doc(r#"{"a": {"b": 5}}"#);
        let path = IndexedPath::ascending("a.b");
        let matches = collect(&document, &path);

        assert_eq!(values(&matches), vec![("a.b".to_string(), Leaf::Value(&Value::Int32(5)))]);
        assert!(!matches.has_array_values);
    }

    #[test]
    fn leaf_array_expands_to_elements() {
        let document = doc(r#"{"a": [1, [2], null]}"#);
        let path = IndexedPath::ascending("a");
        let matches = collect(&document, &path);

        assert!(matches.has_array_values);
        assert_eq!(matches.occurrences.len(), 3);
        assert_eq!(
            matches.occurrences[1].leaf,
            Leaf::Value(&Value::Array(vec![Value::Int32(2)]))
        );
        assert_eq!(matches.occurrences[2].leaf, Leaf::Value(&Value::Null));
    }

    #[test]
    fn empty_leaf_array_is_undefined() {
        let document = doc(r#"{"a": []}"#);
        let path = IndexedPath::ascending("a");

        assert_eq!(
            values(&collect(&document, &path)),
            vec![("a".to_string(), Leaf::Undefined)]
        );
    }

    #[test]
    fn missing_path_yields_nothing() {
        let document = doc(r#"{"a": 1}"#);
        let path = IndexedPath::ascending("a.b");

        assert!(collect(&document, &path).occurrences.is_empty());
    }

    #[test]
    fn array_of_documents_is_anchored_and_partial() {
        let document = doc(r#"{"a": [{"b": 1}, {"c": 2}, {"b": 3}]}"#);
        let path = IndexedPath::ascending("a.b");
        let matches = collect(&document, &path);

        assert_eq!(matches.occurrences.len(), 3);
        assert_eq!(
            matches.occurrences[1].anchor,
            Some(Anchor {
                array_path: "a".to_string(),
                element: 2
            })
        );
        assert_eq!(matches.occurrences[2].leaf, Leaf::MaybeUndefined);
        assert_eq!(matches.occurrences[2].anchor, None);
    }

    #[test]
    fn numeric_components_address_positions() {
        let document = doc(r#"{"a": [{"b": 1}, {"b": 2}]}"#);
        let path = IndexedPath::ascending("a.1.b");

        assert_eq!(
            values(&collect(&document, &path)),
            vec![("a.1.b".to_string(), Leaf::Value(&Value::Int32(2)))]
        );
    }

    #[test]
    fn wildcard_emits_full_leaf_paths() {
        let document = doc(r#"{"a": {"b": 1, "c": {"d": "x"}, "e": [{"f": 2}, 3, [4]], "g": {}}}"#);
        let path = IndexedPath::parse("a.$**", false);
        let matches = collect(&document, &path);
        let paths: Vec<String> = values(&matches).into_iter().map(|(p, _)| p).collect();

        assert_eq!(paths, vec!["a.b", "a.c.d", "a.e.f", "a.e", "a.e", "a.g"]);
        assert!(matches.has_array_values);
        assert_eq!(
            matches.occurrences[2].anchor,
            Some(Anchor {
                array_path: "a.e".to_string(),
                element: 0
            })
        );
    }

    #[test]
    fn root_wildcard_skips_the_top_level_document() {
        let document = doc(r#"{"a": 1, "b": {"c": 2}}"#);
        let path = IndexedPath::parse("$**", false);
        let paths: Vec<String> = values(&collect(&document, &path))
            .into_iter()
            .map(|(p, _)| p)
            .collect();

        assert_eq!(paths, vec!["a", "b.c"]);
    }
}
