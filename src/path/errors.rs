use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid path '{input}': {message}")]
    InvalidPath { input: String, message: String },

    #[error("extension marker without encoding in path '{input}'")]
    EmptyExtension { input: String },

    #[error("field not found: {path}")]
    NotFound { path: String },

    #[error("ambiguous match for {path}: {count} elements, expected exactly 1")]
    AmbiguousMatch { path: String, count: usize },

    #[error("cannot traverse {path}: {message}")]
    TypeMismatch { path: String, message: String },

    #[error("index {index} out of range at {path} (sequence of length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("cannot create fields through wildcard path {path}")]
    WildcardCreate { path: String },
}
