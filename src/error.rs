use std::fmt;

/// Coarse classification shared by every error of the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed rule configuration, path grammar or encoded payload
    Parse,
    /// Zero or several source matches, unresolvable field, missing selector
    Selection,
    /// Path invalid for a codec, or several matches where one is required
    Path,
    /// Field creation requested where it cannot happen
    Creation,
    /// Options that cannot be combined
    OptionConflict,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::Selection => "selection error",
            ErrorKind::Path => "path error",
            ErrorKind::Creation => "creation error",
            ErrorKind::OptionConflict => "option conflict",
        };
        f.write_str(name)
    }
}

impl crate::path::PathError {
    pub fn kind(&self) -> ErrorKind {
        use crate::path::PathError;
        match self {
            PathError::InvalidPath { .. } | PathError::EmptyExtension { .. } => ErrorKind::Parse,
            PathError::NotFound { .. } => ErrorKind::Selection,
            PathError::AmbiguousMatch { .. }
            | PathError::TypeMismatch { .. }
            | PathError::IndexOutOfRange { .. } => ErrorKind::Path,
            PathError::WildcardCreate { .. } => ErrorKind::Creation,
        }
    }
}
