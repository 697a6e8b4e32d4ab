//! The global field store backing `{{name}}` templates.
//!
//! Fields supplied at construction are protected: updates that would change
//! them are discarded with a warning. Updates are also sanitized so that
//! live `{{...}}` placeholders can never enter the store.

use crate::merge::{merge_table, walk_replace};
use crate::template;
use crate::value::{Table, Value};
use std::collections::BTreeSet;
use tracing::warn;

/// Flat-ish mapping of environment-like fields, with a protected key set
/// frozen at construction and a configurable pullout key (default
/// `"global"`).
#[derive(Debug, Clone)]
pub struct GlobalFields {
    fields: Table,
    protected: BTreeSet<String>,
    pullout_name: String,
}

impl GlobalFields {
    /// Create a store seeded with `readonly` fields; their key set becomes
    /// the protected set.
    pub fn new(readonly: Table, pullout_name: impl Into<String>) -> Self {
        let protected = readonly.keys().cloned().collect();
        Self {
            fields: readonly,
            protected,
            pullout_name: pullout_name.into(),
        }
    }

    /// Merge `source` into the store. Non-table sources are ignored.
    ///
    /// Protected keys whose incoming value differs from the stored one are
    /// dropped with a warning; every `{{name}}` placeholder anywhere in the
    /// incoming data is broken to the literal `__name__`.
    pub fn update(&mut self, source: &Value) {
        let Value::Table(source) = source else {
            return;
        };
        let mut data = source.clone();

        for key in &self.protected {
            if let Some(incoming) = data.get(key)
                && Some(incoming) != self.fields.get(key)
            {
                warn!("global field {:?} is protected, update ignored", key);
                data.remove(key);
            }
        }

        walk_replace(&mut data, &mut |value, _, _| match value {
            Value::String(s) => {
                let broken = template::substitute(s, |name| {
                    let replacement = format!("__{}__", name);
                    warn!(
                        "global fields do not allow placeholders, {{{{{}}}}} broken to {}",
                        name, replacement
                    );
                    Some(replacement)
                });
                Some(Value::String(broken))
            }
            _ => None,
        });

        merge_table(&mut self.fields, data);
    }

    /// Extract `container[pullout_name]` into the store when it is a table,
    /// removing it from `container`. No-op otherwise.
    pub fn pullout(&mut self, container: &mut Table) {
        if matches!(container.get(&self.pullout_name), Some(Value::Table(_)))
            && let Some(extracted) = container.remove(&self.pullout_name)
        {
            self.update(&extracted);
        }
    }

    /// Deep-cloned copy for external read access.
    pub fn snapshot(&self) -> Table {
        self.fields.clone()
    }

    /// Dotted-path lookup used by template substitution.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields.get_path(path)
    }

    pub fn pullout_name(&self) -> &str {
        &self.pullout_name
    }
}
