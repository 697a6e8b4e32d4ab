//! The configuration merger: sequential source ingestion, global pullout,
//! reference tracking, and the once-per-call finalize pass.

use crate::error::Error;
use crate::global::GlobalFields;
use crate::loader::Loader;
use crate::merge::merge_table;
use crate::resolve::{capture_overrides, detect_references, resolve_references};
use crate::template;
use crate::value::{Table, Value};
use std::path::{Path, PathBuf};

/// Default flag marking a string as an external file reference.
pub const DEFAULT_CONF_FLAG: &str = "conf:";

/// Default key pulled out of every source into the global field store.
pub const DEFAULT_GLOBAL_FIELD: &str = "global";

/// Callback observing each source as it is processed: the error (if any),
/// a label (resolved path, `"anonymous"`, or the offending value), and the
/// source's position in the `merge` call.
pub type Monitor = Box<dyn FnMut(Option<&Error>, &str, usize) + Send>;

/// Construction options for [`Merger`].
#[derive(Default)]
pub struct Options {
    /// Directory that relative source paths resolve against
    /// (default: the current working directory).
    pub root_path: Option<PathBuf>,
    /// External-reference flag (default `"conf:"`).
    pub conf_flag: Option<String>,
    /// Read-only global fields, as a JSON object.
    pub global_fields: Option<serde_json::Value>,
    /// Key extracted into the global store (default `"global"`).
    pub global_field_name: Option<String>,
    /// Source-processing observer.
    pub monitor: Option<Monitor>,
}

/// One argument to [`Merger::merge`]: a path to load, or in-memory data.
pub enum Source {
    Path(String),
    Object(serde_json::Value),
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source::Path(s.to_string())
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Source::Path(s)
    }
}

impl From<&Path> for Source {
    fn from(p: &Path) -> Self {
        Source::Path(p.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Source {
    fn from(p: PathBuf) -> Self {
        Source::Path(p.to_string_lossy().into_owned())
    }
}

/// JSON strings load as paths, like string arguments; everything else is
/// in-memory data (non-objects are rejected during the merge).
impl From<serde_json::Value> for Source {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Source::Path(s),
            other => Source::Object(other),
        }
    }
}

/// The accumulator configuration sources merge into.
///
/// Sources fold in strictly left-to-right; later values win conflicts at
/// the same key path, except where a pending external reference captures
/// them as overrides. After each `merge` call the accumulated tree has had
/// templates substituted and one level of external references resolved.
pub struct Merger {
    data: Table,
    globals: GlobalFields,
    loader: Loader,
    conf_flag: String,
    root: PathBuf,
    monitor: Option<Monitor>,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

impl Merger {
    /// A merger with default options.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let root = options
            .root_path
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let readonly = match options.global_fields.map(Value::from) {
            Some(Value::Table(t)) => t,
            _ => Table::new(),
        };
        let pullout_name = options
            .global_field_name
            .unwrap_or_else(|| DEFAULT_GLOBAL_FIELD.to_string());
        Self {
            data: Table::new(),
            globals: GlobalFields::new(readonly, pullout_name),
            loader: Loader::new(),
            conf_flag: options
                .conf_flag
                .unwrap_or_else(|| DEFAULT_CONF_FLAG.to_string()),
            root,
            monitor: options.monitor,
        }
    }

    /// The loader, for registering additional file formats.
    pub fn loader_mut(&mut self) -> &mut Loader {
        &mut self.loader
    }

    /// Merge the given sources into the accumulator, in order, then run the
    /// finalize pass (template substitution and one level of reference
    /// resolution).
    ///
    /// A failing source is reported through the monitor and skipped; only a
    /// fatal error (an unavailable parser) aborts with `Err`. Calling with
    /// no sources still runs the finalize pass.
    pub fn merge<I>(&mut self, sources: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<Source>,
    {
        for (index, source) in sources.into_iter().enumerate() {
            self.merge_one(source.into(), index)?;
        }
        self.finalize();
        Ok(())
    }

    fn merge_one(&mut self, source: Source, index: usize) -> Result<(), Error> {
        match self.load_source(source) {
            Ok((mut table, label, base)) => {
                self.notify(None, &label, index);
                self.globals.pullout(&mut table);
                detect_references(&mut table, &base, &self.conf_flag);
                capture_overrides(&mut self.data, &mut table);
                merge_table(&mut self.data, table);
                Ok(())
            }
            Err((err, label)) => {
                if err.is_fatal() {
                    return Err(err);
                }
                self.notify(Some(&err), &label, index);
                Ok(())
            }
        }
    }

    /// Load one source into a table plus its monitor label and the base
    /// directory its references resolve against.
    fn load_source(&self, source: Source) -> Result<(Table, String, PathBuf), (Error, String)> {
        match source {
            Source::Object(value) => {
                let type_name = json_type_name(&value);
                match Value::from(value) {
                    Value::Table(table) => {
                        Ok((table, "anonymous".to_string(), self.root.clone()))
                    }
                    other => {
                        let value = other.to_json().to_string();
                        let err = Error::UnsupportedType {
                            type_name,
                            value: value.clone(),
                        };
                        Err((err, value))
                    }
                }
            }
            Source::Path(name) => {
                if name.is_empty() {
                    let err = Error::UnsupportedType {
                        type_name: "string",
                        value: String::new(),
                    };
                    return Err((err, String::new()));
                }
                let full = self.loader.resolve(&name, &self.root);
                let label = full.display().to_string();
                let json = self.loader.load_path(&full).map_err(|e| (e, label.clone()))?;
                match Value::from(json) {
                    Value::Table(table) => {
                        let base = full
                            .parent()
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| self.root.clone());
                        Ok((table, label, base))
                    }
                    _ => {
                        let err = Error::ParseFailed {
                            path: full,
                            source: anyhow::anyhow!("top-level value is not a mapping"),
                        };
                        Err((err, label))
                    }
                }
            }
        }
    }

    fn finalize(&mut self) {
        for (_, value) in self.data.iter_mut() {
            template::substitute_value(value, &self.globals);
        }
        resolve_references(&mut self.data, &self.loader, &self.globals, &self.conf_flag);
    }

    fn notify(&mut self, err: Option<&Error>, label: &str, index: usize) {
        if let Some(monitor) = self.monitor.as_mut() {
            monitor(err, label, index);
        }
    }

    /// A top-level field by name. The configured global field name returns
    /// the global snapshot; anything else returns a copy of the entry.
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == self.globals.pullout_name() {
            Some(Value::Table(self.globals.snapshot()))
        } else {
            self.data.get(name).cloned()
        }
    }

    /// Deep-cloned snapshot of the global field store.
    pub fn global(&self) -> Table {
        self.globals.snapshot()
    }

    /// The accumulated configuration tree.
    pub fn data(&self) -> &Table {
        &self.data
    }

    /// Export the accumulated tree as plain JSON. Pending references render
    /// as their original `conf:` strings; table metadata is not exported.
    pub fn to_json(&self) -> serde_json::Value {
        self.data.to_json()
    }

    /// Directory relative source paths resolve against.
    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
