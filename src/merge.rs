//! Deep merge engine for configuration values.
//!
//! Implements last-writer-wins merging: tables merge field-by-field, arrays
//! merge index-wise, scalars overwrite. Also provides the generic walk used
//! to find and replace values anywhere in a tree.

use crate::value::{Table, Value};

/// Deep-merge `src` into `dest` in place.
///
/// - Equal values are skipped (the destination, including any table
///   metadata, is left untouched).
/// - A source table merges recursively into the destination; a destination
///   that is not a table is treated as an empty one.
/// - A source array merges index-wise into the destination; a destination
///   that is not an array is treated as an empty one. Index `i` of the
///   source merges into index `i` of the destination; extra source elements
///   are appended, extra destination elements survive.
/// - Anything else (scalars, strings, pending references) overwrites the
///   destination entirely.
pub fn merge(dest: &mut Value, src: Value) {
    if *dest == src {
        return;
    }
    match src {
        Value::Table(src_table) => match dest {
            Value::Table(dest_table) => merge_table(dest_table, src_table),
            other => {
                let mut fresh = Table::new();
                merge_table(&mut fresh, src_table);
                *other = Value::Table(fresh);
            }
        },
        Value::Array(src_items) => match dest {
            Value::Array(dest_items) => merge_array(dest_items, src_items),
            other => {
                let mut fresh = Vec::new();
                merge_array(&mut fresh, src_items);
                *other = Value::Array(fresh);
            }
        },
        other => *dest = other,
    }
}

/// Merge every entry of `src` into `dest`.
pub fn merge_table(dest: &mut Table, src: Table) {
    for (key, src_value) in src {
        match dest.get_mut(&key) {
            Some(dest_value) => merge(dest_value, src_value),
            None => {
                dest.insert(key, src_value);
            }
        }
    }
}

/// Merge arrays element-by-element: source index `i` merges into
/// destination index `i`, a longer source appends its tail.
pub fn merge_array(dest: &mut Vec<Value>, src: Vec<Value>) {
    for (index, src_value) in src.into_iter().enumerate() {
        match dest.get_mut(index) {
            Some(dest_value) => merge(dest_value, src_value),
            None => dest.push(src_value),
        }
    }
}

/// Depth-first walk over every entry of `root`, recursing through tables
/// and arrays (array indices become numeric path segments).
///
/// The closure receives each value with its key and full dotted path and
/// may return a replacement; a replaced value is installed as-is and not
/// re-visited. Pending references are visited as leaves — the walk never
/// descends into their captured overrides.
pub fn walk_replace<F>(root: &mut Table, visit: &mut F)
where
    F: FnMut(&Value, &str, &str) -> Option<Value>,
{
    walk_table(root, "", visit);
}

fn walk_table<F>(table: &mut Table, prefix: &str, visit: &mut F)
where
    F: FnMut(&Value, &str, &str) -> Option<Value>,
{
    for (key, value) in table.iter_mut() {
        let path = join_path(prefix, key);
        visit_value(value, key, &path, visit);
    }
}

fn walk_array<F>(items: &mut [Value], prefix: &str, visit: &mut F)
where
    F: FnMut(&Value, &str, &str) -> Option<Value>,
{
    for (index, value) in items.iter_mut().enumerate() {
        let key = index.to_string();
        let path = join_path(prefix, &key);
        visit_value(value, &key, &path, visit);
    }
}

fn visit_value<F>(value: &mut Value, key: &str, path: &str, visit: &mut F)
where
    F: FnMut(&Value, &str, &str) -> Option<Value>,
{
    if let Some(replacement) = visit(value, key, path) {
        *value = replacement;
        return;
    }
    match value {
        Value::Table(t) => walk_table(t, path, visit),
        Value::Array(items) => walk_array(items, path, visit),
        _ => {}
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(json: serde_json::Value) -> Table {
        match Value::from(json) {
            Value::Table(t) => t,
            other => panic!("expected a table, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_simple_tables() {
        let mut dest = table(json!({"a": 1, "b": 2}));
        merge_table(&mut dest, table(json!({"b": 3, "c": 4})));
        assert_eq!(dest.to_json(), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_nested_tables() {
        let mut dest = table(json!({"server": {"host": "localhost", "port": 8080}}));
        merge_table(&mut dest, table(json!({"server": {"port": 9000}})));
        assert_eq!(
            dest.to_json(),
            json!({"server": {"host": "localhost", "port": 9000}})
        );
    }

    #[test]
    fn test_scalar_overwrites_table() {
        let mut dest = table(json!({"value": {"nested": true}}));
        merge_table(&mut dest, table(json!({"value": 42})));
        assert_eq!(dest.to_json(), json!({"value": 42}));
    }

    #[test]
    fn test_table_overwrites_scalar() {
        let mut dest = table(json!({"value": 42}));
        merge_table(&mut dest, table(json!({"value": {"nested": true}})));
        assert_eq!(dest.to_json(), json!({"value": {"nested": true}}));
    }

    #[test]
    fn test_arrays_merge_by_index() {
        let mut dest = table(json!({"items": [1, 2, 3]}));
        merge_table(&mut dest, table(json!({"items": [9]})));
        assert_eq!(dest.to_json(), json!({"items": [9, 2, 3]}));
    }

    #[test]
    fn test_longer_source_array_appends() {
        let mut dest = table(json!({"items": [1]}));
        merge_table(&mut dest, table(json!({"items": [9, 8, 7]})));
        assert_eq!(dest.to_json(), json!({"items": [9, 8, 7]}));
    }

    #[test]
    fn test_arrays_of_tables_merge_elementwise() {
        let mut dest = table(json!({"servers": [{"host": "a", "port": 1}, {"host": "b"}]}));
        merge_table(&mut dest, table(json!({"servers": [{"port": 2}]})));
        assert_eq!(
            dest.to_json(),
            json!({"servers": [{"host": "a", "port": 2}, {"host": "b"}]})
        );
    }

    #[test]
    fn test_array_overwrites_scalar_and_back() {
        let mut dest = table(json!({"x": 5}));
        merge_table(&mut dest, table(json!({"x": [1, 2]})));
        assert_eq!(dest.to_json(), json!({"x": [1, 2]}));

        merge_table(&mut dest, table(json!({"x": "done"})));
        assert_eq!(dest.to_json(), json!({"x": "done"}));
    }

    #[test]
    fn test_null_overwrites() {
        let mut dest = table(json!({"a": 1}));
        merge_table(&mut dest, table(json!({"a": null})));
        assert_eq!(dest.to_json(), json!({"a": null}));
    }

    #[test]
    fn test_merge_preserves_dest_metadata_on_equal_values() {
        let mut dest = table(json!({"k": {"x": 1}}));
        if let Some(Value::Table(inner)) = dest.get_mut("k") {
            inner.set_origin(std::path::PathBuf::from("/from/disk.conf"));
        }
        merge_table(&mut dest, table(json!({"k": {"x": 1}})));
        let inner = dest.get("k").and_then(Value::as_table).unwrap();
        assert!(inner.origin().is_some());
    }

    #[test]
    fn test_walk_replace_paths_and_replacement() {
        let mut root = table(json!({"a": {"b": "hit"}, "list": ["hit", {"c": "hit"}]}));
        let mut seen = Vec::new();
        walk_replace(&mut root, &mut |value, _key, path| {
            if value.as_str() == Some("hit") {
                seen.push(path.to_string());
                Some(Value::from("replaced"))
            } else {
                None
            }
        });
        seen.sort();
        assert_eq!(seen, vec!["a.b", "list.0", "list.1.c"]);
        assert_eq!(
            root.to_json(),
            json!({"a": {"b": "replaced"}, "list": ["replaced", {"c": "replaced"}]})
        );
    }

    #[test]
    fn test_walk_replace_does_not_revisit_replacement() {
        let mut root = table(json!({"a": "hit"}));
        let mut visits = 0;
        walk_replace(&mut root, &mut |value, _, _| {
            visits += 1;
            if value.as_str() == Some("hit") {
                Some(Value::from(json!({"inner": "hit"})))
            } else {
                None
            }
        });
        assert_eq!(visits, 1);
        assert_eq!(root.to_json(), json!({"a": {"inner": "hit"}}));
    }
}
