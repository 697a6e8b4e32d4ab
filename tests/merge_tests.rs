//! Integration tests for the in-memory merge pipeline: ordering, array
//! semantics, globals, templates, and error recovery.

use conflate::{ErrorCode, Merger, Monitor, Options, Source};
use serde_json::json;
use std::sync::{Arc, Mutex};

type Calls = Arc<Mutex<Vec<(Option<ErrorCode>, String, usize)>>>;

/// Monitor that records every callback into a shared vector.
fn recording_monitor() -> (Monitor, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let monitor: Monitor = Box::new(move |err, label, index| {
        sink.lock()
            .unwrap()
            .push((err.map(|e| e.code()), label.to_string(), index));
    });
    (monitor, calls)
}

mod ordering_tests {
    use super::*;

    #[test]
    fn later_sources_win_scalar_conflicts() {
        let mut merger = Merger::new();
        merger.merge([json!({"a": 1})]).unwrap();
        merger.merge([json!({"a": 2})]).unwrap();
        assert_eq!(merger.to_json(), json!({"a": 2}));
    }

    #[test]
    fn nested_tables_merge_field_by_field() {
        let mut merger = Merger::new();
        merger
            .merge([
                json!({"second": {"foo": 1, "bar": 1}}),
                json!({"second": {"foo": 2}}),
                json!({"second": {"baz": 3}}),
            ])
            .unwrap();
        assert_eq!(
            merger.to_json(),
            json!({"second": {"foo": 2, "bar": 1, "baz": 3}})
        );
    }

    #[test]
    fn second_merge_call_can_flatten_everything() {
        let mut merger = Merger::new();
        merger
            .merge([json!({"first": 1, "second": {"foo": 2}})])
            .unwrap();
        merger
            .merge([json!({"first": "updated", "second": "updated"})])
            .unwrap();
        assert_eq!(
            merger.to_json(),
            json!({"first": "updated", "second": "updated"})
        );
    }

    #[test]
    fn arrays_merge_by_index_not_replaced() {
        let mut merger = Merger::new();
        merger.merge([json!({"items": [1, 2, 3]})]).unwrap();
        merger.merge([json!({"items": [9]})]).unwrap();
        assert_eq!(merger.to_json(), json!({"items": [9, 2, 3]}));
    }

    #[test]
    fn arrays_of_tables_merge_elementwise() {
        let mut merger = Merger::new();
        merger
            .merge([
                json!({"servers": [{"host": "a", "port": 1}, {"host": "b"}]}),
                json!({"servers": [{"port": 2}]}),
            ])
            .unwrap();
        assert_eq!(
            merger.to_json(),
            json!({"servers": [{"host": "a", "port": 2}, {"host": "b"}]})
        );
    }
}

mod global_field_tests {
    use super::*;

    #[test]
    fn templates_resolve_against_construction_globals() {
        let mut merger = Merger::with_options(Options {
            global_fields: Some(json!({"ROOT_PATH": "/tmp"})),
            ..Default::default()
        });
        merger.merge([json!({"p": "{{ROOT_PATH}}/x"})]).unwrap();
        assert_eq!(merger.to_json(), json!({"p": "/tmp/x"}));
    }

    #[test]
    fn unresolvable_placeholder_stays_verbatim() {
        let mut merger = Merger::new();
        merger.merge([json!({"p": "{{FOO}}"})]).unwrap();
        assert_eq!(merger.to_json(), json!({"p": "{{FOO}}"}));
    }

    #[test]
    fn protected_globals_resist_source_overwrite() {
        let mut merger = Merger::with_options(Options {
            global_fields: Some(json!({"NODE_ENV": "x"})),
            ..Default::default()
        });
        merger.merge([json!({"global": {"NODE_ENV": "y"}})]).unwrap();
        assert_eq!(merger.global().to_json(), json!({"NODE_ENV": "x"}));
        assert_eq!(
            merger.field("global").map(|v| v.to_json()),
            Some(json!({"NODE_ENV": "x"}))
        );
    }

    #[test]
    fn globals_defined_by_a_later_source_resolve_in_same_call() {
        let mut merger = Merger::new();
        merger
            .merge([
                json!({"greeting": "hello {{NAME}}"}),
                json!({"global": {"NAME": "world"}}),
            ])
            .unwrap();
        assert_eq!(merger.to_json(), json!({"greeting": "hello world"}));
    }

    #[test]
    fn globals_defined_by_a_later_merge_call_resolve_then() {
        let mut merger = Merger::new();
        merger.merge([json!({"greeting": "hello {{NAME}}"})]).unwrap();
        assert_eq!(merger.to_json(), json!({"greeting": "hello {{NAME}}"}));

        merger.merge([json!({"global": {"NAME": "world"}})]).unwrap();
        assert_eq!(merger.to_json(), json!({"greeting": "hello world"}));
    }

    #[test]
    fn placeholders_cannot_enter_the_global_store() {
        let mut merger = Merger::new();
        merger
            .merge([json!({"global": {"sneaky": "{{HOME}}"}})])
            .unwrap();
        assert_eq!(merger.global().to_json(), json!({"sneaky": "__HOME__"}));
    }

    #[test]
    fn pullout_removes_global_from_output() {
        let mut merger = Merger::new();
        merger
            .merge([json!({"global": {"A": 1}, "kept": true})])
            .unwrap();
        assert_eq!(merger.to_json(), json!({"kept": true}));
    }
}

mod error_recovery_tests {
    use super::*;

    #[test]
    fn unsupported_type_is_reported_and_skipped() {
        let (monitor, calls) = recording_monitor();
        let mut merger = Merger::with_options(Options {
            monitor: Some(monitor),
            ..Default::default()
        });

        merger
            .merge([json!(12345), json!({"a": 1}), json!(true)])
            .unwrap();

        assert_eq!(merger.to_json(), json!({"a": 1}));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], (Some(ErrorCode::UnsupportedType), "12345".to_string(), 0));
        assert_eq!(calls[1], (None, "anonymous".to_string(), 1));
        assert_eq!(calls[2], (Some(ErrorCode::UnsupportedType), "true".to_string(), 2));
    }

    #[test]
    fn empty_string_source_is_rejected() {
        let (monitor, calls) = recording_monitor();
        let mut merger = Merger::with_options(Options {
            monitor: Some(monitor),
            ..Default::default()
        });

        merger.merge([Source::from(""), Source::from(json!({"ok": 1}))]).unwrap();

        assert_eq!(merger.to_json(), json!({"ok": 1}));
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, Some(ErrorCode::UnsupportedType));
    }

    #[test]
    fn merge_without_sources_changes_nothing() {
        let mut merger = Merger::with_options(Options {
            global_fields: Some(json!({"E": "v"})),
            ..Default::default()
        });
        merger
            .merge([json!({"a": "{{E}}", "b": [1, {"c": "{{MISSING}}"}]})])
            .unwrap();
        let before = merger.to_json();

        merger.merge(Vec::<Source>::new()).unwrap();
        assert_eq!(merger.to_json(), before);
    }
}
