//! Extension-dispatched configuration file loading.
//!
//! A [`Loader`] resolves source names to absolute paths (joining a base
//! directory, appending the default `.conf` extension when none is given)
//! and parses file contents through a registry mapping extension to parser.
//! JSON is always available for `.conf` and `.json`; YAML for `.yaml` and
//! `.yml` when the `yaml` feature (default on) is compiled in.

use crate::error::Error;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Extension appended to source names that carry none.
pub const DEFAULT_EXTENSION: &str = "conf";

/// Formats the loader knows about but only supports when the matching
/// cargo feature is compiled in: `(extension, feature)`.
const OPTIONAL_FORMATS: &[(&str, &str)] = &[("yaml", "yaml"), ("yml", "yaml")];

type ParserFn = Box<dyn Fn(&str) -> anyhow::Result<serde_json::Value> + Send + Sync>;

/// Load a file through a default [`Loader`]. Convenience for one-off loads
/// outside a merger.
pub fn load(name: &str, base: &Path) -> Result<serde_json::Value, Error> {
    Loader::new().load(name, base)
}

/// Parser registry plus path resolution.
pub struct Loader {
    parsers: HashMap<String, ParserFn>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// A loader with the built-in formats registered.
    pub fn new() -> Self {
        let mut parsers: HashMap<String, ParserFn> = HashMap::new();
        parsers.insert("conf".to_string(), Box::new(parse_json));
        parsers.insert("json".to_string(), Box::new(parse_json));
        #[cfg(feature = "yaml")]
        {
            parsers.insert("yaml".to_string(), Box::new(parse_yaml));
            parsers.insert("yml".to_string(), Box::new(parse_yaml));
        }
        Self { parsers }
    }

    /// Register (or replace) the parser for an extension. The leading dot
    /// is optional; extensions are matched case-insensitively.
    pub fn register<F>(&mut self, extension: &str, parser: F)
    where
        F: Fn(&str) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
    {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.parsers.insert(key, Box::new(parser));
    }

    /// Resolve a source name to an absolute path: relative names join
    /// `base`, a missing extension gets [`DEFAULT_EXTENSION`], and `.`/`..`
    /// components are normalized lexically (no filesystem access).
    pub fn resolve(&self, name: &str, base: &Path) -> PathBuf {
        let mut path = PathBuf::from(name);
        if path.is_relative() {
            path = base.join(path);
        }
        if path.extension().is_none() {
            path.set_extension(DEFAULT_EXTENSION);
        }
        normalize_components(&path)
    }

    /// Resolve and load in one step.
    pub fn load(&self, name: &str, base: &Path) -> Result<serde_json::Value, Error> {
        self.load_path(&self.resolve(name, base))
    }

    /// Load an already-resolved path: dispatch by extension, read with BOM
    /// stripping, parse.
    pub fn load_path(&self, path: &Path) -> Result<serde_json::Value, Error> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let parser = match self.parsers.get(&extension) {
            Some(parser) => parser,
            None => {
                for &(ext, feature) in OPTIONAL_FORMATS {
                    if ext == extension {
                        return Err(Error::MissingParser { extension, feature });
                    }
                }
                return Err(Error::UnsupportedExtension { extension });
            }
        };

        let content = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::ParseFailed {
                    path: path.to_path_buf(),
                    source: err.into(),
                }
            }
        })?;

        // Strip a leading byte-order mark; fs reads translate the UTF-8
        // BOM EF BB BF to U+FEFF.
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

        let value = parser(content).map_err(|source| Error::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded {}", path.display());
        Ok(value)
    }
}

fn parse_json(content: &str) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(feature = "yaml")]
fn parse_yaml(content: &str) -> anyhow::Result<serde_json::Value> {
    Ok(serde_yaml::from_str(content)?)
}

/// Resolve `.` and `..` components lexically, without touching the
/// filesystem.
fn normalize_components(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else {
                    components.push(Component::ParentDir);
                }
            }
            other => components.push(other),
        }
    }
    components.iter().collect()
}
