//! Layered configuration loading and merging.
//!
//! A [`Merger`] ingests configuration sources — file paths or in-memory
//! JSON objects — and deep-merges them left-to-right into one tree:
//!
//! 1. Each source is loaded and normalized (extension-dispatched parsing
//!    for files: JSON `.conf`/`.json`, YAML `.yaml`/`.yml`).
//! 2. A source's `global` entry is pulled out into a protected field store
//!    that backs `{{name}}` template placeholders.
//! 3. Strings flagged `conf:` become pending references to external files;
//!    values merged over them later are captured as overrides.
//! 4. Everything else deep-merges, last writer wins (arrays index-wise).
//! 5. A finalize pass substitutes templates and resolves one level of
//!    pending references, folding the captured overrides into each loaded
//!    file.
//!
//! ```
//! use conflate::{Merger, Options};
//! use serde_json::json;
//!
//! let mut merger = Merger::with_options(Options {
//!     global_fields: Some(json!({ "ENV": "production" })),
//!     ..Default::default()
//! });
//! merger
//!     .merge([json!({ "app": { "name": "demo", "mode": "{{ENV}}" } })])
//!     .unwrap();
//! merger.merge([json!({ "app": { "port": 8080 } })]).unwrap();
//!
//! let config = merger.to_json();
//! assert_eq!(config["app"]["mode"], "production");
//! assert_eq!(config["app"]["port"], 8080);
//! ```
//!
//! Failing sources do not abort a merge: they are reported through the
//! optional monitor callback and skipped, and a reference whose file cannot
//! be loaded degrades to an empty table with
//! [`load_failed`](value::Table::load_failed) set.

pub mod error;
pub mod global;
pub mod loader;
pub mod merge;
pub mod merger;
mod resolve;
pub mod template;
pub mod value;

pub use error::{Error, ErrorCode};
pub use global::GlobalFields;
pub use loader::{Loader, load};
pub use merger::{DEFAULT_CONF_FLAG, DEFAULT_GLOBAL_FIELD, Merger, Monitor, Options, Source};
pub use value::{Reference, Table, Value};
