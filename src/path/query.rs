use crate::path::errors::PathError;
use std::fmt;

/// One typed step of a plain path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Mapping key, or a positional index when applied to a sequence and
    /// made only of digits.
    Key(String),
    /// `*`: every element of a sequence or every value of a mapping.
    Wildcard,
    /// `[key=value]`: sequence elements whose `key` field equals `value`.
    Match { key: String, value: String },
    /// `[=value]`: scalar sequence elements equal to `value`.
    ScalarMatch(String),
}

impl PathSegment {
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::InvalidPath {
                input: input.to_string(),
                message: "empty path segment".to_string(),
            });
        }

        if input == "*" {
            return Ok(PathSegment::Wildcard);
        }

        if let Some(inner) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if inner.is_empty() {
                return Err(PathError::InvalidPath {
                    input: input.to_string(),
                    message: "empty bracket segment".to_string(),
                });
            }
            return Ok(match inner.split_once('=') {
                Some(("", value)) => PathSegment::ScalarMatch(value.to_string()),
                Some((key, value)) => PathSegment::Match {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                None => PathSegment::Key(inner.to_string()),
            });
        }

        Ok(PathSegment::Key(input.to_string()))
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, PathSegment::Wildcard)
    }

    /// Positional index, when the segment is made only of digits.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Key(key) if key.bytes().all(|b| b.is_ascii_digit()) => key.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) if key.contains('.') => write!(f, "[{key}]"),
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Wildcard => write!(f, "*"),
            PathSegment::Match { key, value } => write!(f, "[{key}={value}]"),
            PathSegment::ScalarMatch(value) => write!(f, "[={value}]"),
        }
    }
}

/// Split a dotted path into its raw segments.
///
/// Dots inside `[...]` do not split, so predicates like
/// `[name=common.targetRevision]` stay whole. An empty input yields no
/// segments.
pub fn split_path(input: &str) -> Result<Vec<String>, PathError> {
    let mut parts = Vec::new();
    if input.is_empty() {
        return Ok(parts);
    }

    let mut current = String::new();
    let mut depth = 0usize;

    for ch in input.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            '.' if depth == 0 => {
                if current.is_empty() {
                    return Err(PathError::InvalidPath {
                        input: input.to_string(),
                        message: "empty path segment".to_string(),
                    });
                }
                parts.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }

    if depth > 0 {
        return Err(PathError::InvalidPath {
            input: input.to_string(),
            message: "unterminated bracket".to_string(),
        });
    }
    if current.is_empty() {
        return Err(PathError::InvalidPath {
            input: input.to_string(),
            message: "empty path segment".to_string(),
        });
    }
    parts.push(current);

    Ok(parts)
}

/// Type each raw segment.
pub fn parse_segments<S: AsRef<str>>(parts: &[S]) -> Result<Vec<PathSegment>, PathError> {
    parts.iter().map(|p| PathSegment::parse(p.as_ref())).collect()
}

/// Render typed segments back to a dotted path.
pub fn display_path(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
