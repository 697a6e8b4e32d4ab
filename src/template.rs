//! `{{name}}` placeholder substitution.
//!
//! Substitution is a single pass: output is never re-scanned, so a value
//! containing brace syntax cannot smuggle a second round of expansion.

use crate::global::GlobalFields;
use crate::value::Value;
use regex_lite::{Captures, Regex};
use std::sync::OnceLock;
use tracing::warn;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"))
}

/// Replace every `{{name}}` occurrence in `text` using `lookup`.
///
/// The captured name is passed through verbatim (dotted paths allowed, no
/// trimming). A `None` from the lookup leaves the match in place and logs a
/// warning; the result is always a string.
pub fn substitute<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    placeholder()
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            match lookup(name) {
                Some(value) => value,
                None => {
                    warn!("placeholder {} has no value, left verbatim", &caps[0]);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Substitute placeholders throughout a value tree against the global
/// field store.
///
/// Strings are substituted in place; for a pending reference the referenced
/// path is substituted (so templated reference targets resolve) while its
/// captured overrides are left alone — they are substituted once, after
/// being merged onto the loaded file during final resolution.
pub(crate) fn substitute_value(value: &mut Value, globals: &GlobalFields) {
    match value {
        Value::String(s) => {
            *s = substitute(s, |name| globals.get(name).map(coerce));
        }
        Value::Array(items) => {
            for item in items {
                substitute_value(item, globals);
            }
        }
        Value::Table(t) => {
            for (_, entry) in t.iter_mut() {
                substitute_value(entry, globals);
            }
        }
        Value::Reference(r) => {
            let substituted = substitute(r.path(), |name| globals.get(name).map(coerce));
            r.set_path(substituted);
        }
        _ => {}
    }
}

/// Render a global field for splicing into a string: scalars by display
/// form, containers as compact JSON.
fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::GlobalFields;
    use crate::value::Table;
    use serde_json::json;

    fn globals(fields: serde_json::Value) -> GlobalFields {
        let table = match Value::from(fields) {
            Value::Table(t) => t,
            _ => Table::new(),
        };
        GlobalFields::new(table, "global")
    }

    #[test]
    fn test_substitute_simple() {
        let result = substitute("{{ROOT_PATH}}/x", |name| {
            (name == "ROOT_PATH").then(|| "/tmp".to_string())
        });
        assert_eq!(result, "/tmp/x");
    }

    #[test]
    fn test_unresolved_left_verbatim() {
        let result = substitute("{{FOO}} and {{BAR}}", |name| {
            (name == "BAR").then(|| "bar".to_string())
        });
        assert_eq!(result, "{{FOO}} and bar");
    }

    #[test]
    fn test_no_nested_brace_support() {
        // the inner pair matches, the outer braces stay literal
        let result = substitute("{{{{X}}}}", |_| Some("v".to_string()));
        assert_eq!(result, "{{v}}");
    }

    #[test]
    fn test_single_pass_output_not_rescanned() {
        let result = substitute("{{A}}", |name| {
            (name == "A").then(|| "{{B}}".to_string())
        });
        assert_eq!(result, "{{B}}");
    }

    #[test]
    fn test_dotted_lookup_through_globals() {
        let globals = globals(json!({"app": {"name": "demo"}}));
        let mut value = Value::from(json!({"title": "run {{app.name}}"}));
        substitute_value(&mut value, &globals);
        assert_eq!(value.to_json(), json!({"title": "run demo"}));
    }

    #[test]
    fn test_number_coercion() {
        let globals = globals(json!({"PORT": 8080}));
        let mut value = Value::from(json!({"addr": "0.0.0.0:{{PORT}}"}));
        substitute_value(&mut value, &globals);
        assert_eq!(value.to_json(), json!({"addr": "0.0.0.0:8080"}));
    }

    #[test]
    fn test_strings_inside_arrays_substituted() {
        let globals = globals(json!({"ENV": "prod"}));
        let mut value = Value::from(json!({"envs": ["{{ENV}}", {"tag": "{{ENV}}"}]}));
        substitute_value(&mut value, &globals);
        assert_eq!(value.to_json(), json!({"envs": ["prod", {"tag": "prod"}]}));
    }
}
