use crate::edit::EditError;
use crate::error::ErrorKind;
use crate::path::PathError;
use thiserror::Error;

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{name}'?)"),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum ExtenderError {
    #[error("unknown encoding '{name}'{}", suggestion_hint(.suggestion))]
    UnknownEncoding {
        name: String,
        suggestion: Option<String>,
    },

    #[error("invalid {encoding} payload: {message}")]
    InvalidPayload {
        encoding: &'static str,
        message: String,
    },

    #[error("invalid {encoding} path '{path}': {message}")]
    InvalidPath {
        encoding: &'static str,
        path: String,
        message: String,
    },

    #[error("{encoding}: {source}")]
    Path {
        encoding: &'static str,
        #[source]
        source: PathError,
    },

    #[error("{encoding} cannot set '{path}': {message}")]
    Unsupported {
        encoding: &'static str,
        path: String,
        message: String,
    },

    #[error("cannot serialize {encoding} payload: {message}")]
    Serialize {
        encoding: &'static str,
        message: String,
    },

    #[error("{encoding}: {source}")]
    Edit {
        encoding: &'static str,
        #[source]
        source: EditError,
    },
}

impl ExtenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtenderError::UnknownEncoding { .. }
            | ExtenderError::InvalidPayload { .. }
            | ExtenderError::Serialize { .. } => ErrorKind::Parse,
            ExtenderError::InvalidPath { .. } | ExtenderError::Edit { .. } => ErrorKind::Path,
            ExtenderError::Path { source, .. } => source.kind(),
            ExtenderError::Unsupported { .. } => ErrorKind::Creation,
        }
    }
}
