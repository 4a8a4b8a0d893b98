//! krm-replacer: declarative value replacement across KRM resources
//!
//! Copies a value from one resource field into fields of other resources,
//! selecting both sides by identity, labels and annotations. Target field
//! paths may continue into values that hold another document, such as a
//! YAML file stored in a ConfigMap or a base64 encoded INI file in a Secret.
//!
//! # Architecture
//!
//! - [`path`] parses field paths and walks document trees
//! - [`extender`] holds one codec per embedded encoding and the recursive
//!   applier that threads a value through a chain of them
//! - [`resource`] wraps documents with their current and former identities
//! - [`config`] loads replacement rules and runs them
//! - [`stream`] reads and writes multi-document YAML
//!
//! Codecs that edit text in place (INI, regex, scalar writes in YAML) compile
//! every change to a verified byte-span [`Edit`].
//!
//! # Example
//!
//! ```
//! use krm_replacer::{stream, ExtenderRegistry, Replacer, ReplacementRule};
//!
//! let mut resources = stream::parse_stream(
//!     "kind: ConfigMap\nmetadata:\n  name: env\ndata:\n  branch: main\n---\n\
//!      kind: Application\nmetadata:\n  name: app\nspec:\n  values: 'revision: old'\n",
//!     None,
//! )
//! .unwrap();
//! let rules: Vec<ReplacementRule> = serde_yaml::from_str(
//!     "- source: {kind: ConfigMap, fieldPath: data.branch}\n  \
//!        targets:\n    - select: {kind: Application}\n      \
//!        fieldPaths: [spec.values.!!yaml.revision]\n",
//! )
//! .unwrap();
//!
//! let registry = ExtenderRegistry::builtin();
//! Replacer::new(&registry).apply(&mut resources, &rules).unwrap();
//! assert_eq!(resources[1].root()["spec"]["values"], "revision: main");
//! ```

pub mod config;
pub mod edit;
pub mod error;
pub mod extender;
pub mod path;
pub mod resource;
pub mod stream;

// Re-exports
pub use config::{
    load_from_path, load_from_str, ApplicationError, ConfigError, ReplacementRule, Replacer,
    ReplacerConfig, RuleReport,
};
pub use edit::{Edit, EditError, EditVerification};
pub use error::ErrorKind;
pub use extender::{apply_to_field, ApplyError, Extender, ExtenderError, ExtenderRegistry};
pub use path::{ExtendedPath, PathError};
pub use resource::{ResId, Resource};
pub use stream::StreamError;
