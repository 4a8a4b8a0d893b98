pub mod applicator;
pub mod loader;
pub mod refine;
pub mod schema;

pub use applicator::{ApplicationError, FailureCause, Replacer, RuleReport};
pub use loader::{
    load_from_path, load_from_str, load_from_str_in, load_rule_file, ConfigError, ConfigFormat,
};
pub use refine::{encode, refine_source, splice_delimited, RefineError, BCRYPT_COST};
pub use schema::{
    ConfigFile, ConfigMetadata, FieldOptions, ReplacementEntry, ReplacementRule, ReplacerConfig,
    ResourceSelector, RuleFile, SourceEncoding, SourceSelector, TargetSelector, ValidationError,
    ValidationIssue, DEFAULT_FIELD_PATH, PRUNE_LOCAL_ANNOTATION,
};
