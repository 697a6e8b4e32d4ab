//! External reference detection, conflict capture, and final resolution.
//!
//! A string flagged `conf:` becomes a pending [`Reference`] during source
//! parsing. While later sources merge in, values aimed at the same key path
//! are captured as overrides instead of clobbering the marker. The final
//! resolution pass loads each referenced file, folds the overrides in,
//! substitutes templates, and installs the result in place of the marker.

use crate::global::GlobalFields;
use crate::loader::Loader;
use crate::merge::{merge_table, walk_replace};
use crate::template;
use crate::value::{Reference, Table, Value};
use std::path::Path;
use tracing::warn;

/// Replace every string starting with `flag` by a pending reference whose
/// relative paths resolve against `base`.
pub(crate) fn detect_references(table: &mut Table, base: &Path, flag: &str) {
    walk_replace(table, &mut |value, _, _| match value {
        Value::String(s) if s.starts_with(flag) => {
            let target = s[flag.len()..].trim().to_string();
            Some(Value::Reference(Reference::new(
                target,
                base.to_path_buf(),
                s.clone(),
            )))
        }
        _ => None,
    });
}

/// Capture same-path values from `incoming` onto the pending references
/// already in `hoster`, before the generic merge of `incoming` runs.
///
/// For each marker at dotted path P with a truthy value at P in `incoming`:
/// a table is folded into the marker's overrides and the slot in `incoming`
/// is replaced with a copy of the updated marker (so the generic merge's
/// equal-value short-circuit leaves the marker alone); anything else stays
/// put and overwrites the marker outright, with a warning. Falsy values are
/// not captured and also overwrite, silently.
pub(crate) fn capture_overrides(hoster: &mut Table, incoming: &mut Table) {
    let mut marker_paths = Vec::new();
    walk_replace(hoster, &mut |value, _, path| {
        if matches!(value, Value::Reference(_)) {
            marker_paths.push(path.to_string());
        }
        None
    });

    for path in marker_paths {
        let Some(found) = incoming.get_path(&path) else {
            continue;
        };
        if !found.is_truthy() {
            continue;
        }
        match found {
            Value::Table(overriding) => {
                let overriding = overriding.clone();
                let Some(Value::Reference(marker)) = hoster.get_path_mut(&path) else {
                    continue;
                };
                merge_table(marker.overrides_mut(), overriding);
                let updated = marker.clone();
                incoming.set_path(&path, Value::Reference(updated));
            }
            other => {
                let target = hoster
                    .get_path(&path)
                    .and_then(|v| match v {
                        Value::Reference(r) => Some(r.path().to_string()),
                        _ => None,
                    })
                    .unwrap_or_default();
                warn!(
                    "external reference {:?} at {} overwritten by {}",
                    target,
                    path,
                    other.to_json()
                );
            }
        }
    }
}

/// Resolve every pending reference left in `data`: load the referenced
/// file, fold captured overrides in, substitute templates, and replace the
/// marker in place. Resolution never fails — a load error degrades to an
/// empty table with `load_failed` set.
///
/// References found inside a freshly loaded file are tagged (base dir: the
/// loaded file's directory) but not resolved here; exactly one level of
/// external reference resolves per pass.
pub(crate) fn resolve_references(
    data: &mut Table,
    loader: &Loader,
    globals: &GlobalFields,
    flag: &str,
) {
    walk_replace(data, &mut |value, _, _| match value {
        Value::Reference(marker) => Some(resolve_one(marker.clone(), loader, globals, flag)),
        _ => None,
    });
}

fn resolve_one(mut marker: Reference, loader: &Loader, globals: &GlobalFields, flag: &str) -> Value {
    let full = loader.resolve(marker.path(), marker.base_dir());

    let mut loaded = match loader.load_path(&full) {
        Ok(json) => match Value::from(json) {
            Value::Table(mut table) => {
                let base = full.parent().unwrap_or_else(|| marker.base_dir());
                detect_references(&mut table, base, flag);
                table
            }
            mut other => {
                // nothing to merge overrides onto, the scalar wins
                if !marker.overrides().is_empty() {
                    warn!(
                        "reference {} loaded a non-mapping value, overrides dropped",
                        full.display()
                    );
                }
                template::substitute_value(&mut other, globals);
                return other;
            }
        },
        Err(err) => {
            warn!("failed to resolve reference {}: {}", full.display(), err);
            let mut failed = Table::new();
            failed.set_load_failed(err.to_string());
            failed
        }
    };

    // a reference captured as an override rolls back to text so it is
    // never resolved against a stale base directory
    let mut overrides = marker.take_overrides();
    rollback_references(&mut overrides);

    merge_table(&mut loaded, overrides);
    let mut resolved = Value::Table(loaded);
    template::substitute_value(&mut resolved, globals);
    if let Value::Table(table) = &mut resolved {
        table.set_origin(full);
    }
    resolved
}

/// Turn pending references back into their original `conf:` strings.
fn rollback_references(overrides: &mut Table) {
    walk_replace(overrides, &mut |value, _, _| match value {
        Value::Reference(r) => Some(Value::String(r.original().to_string())),
        _ => None,
    });
}
