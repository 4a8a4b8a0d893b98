use crate::path::errors::PathError;
use crate::path::query::{parse_segments, split_path, PathSegment};
use std::fmt;

/// Marker opening an extension segment, e.g. `!!yaml`.
pub const EXTENSION_MARKER: &str = "!!";

/// Path into a payload embedded in a scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedSegment {
    /// Encoding of the embedded payload
    pub encoding: String,
    /// Path inside the embedded payload, interpreted by its codec
    pub path: Vec<String>,
}

impl fmt::Display for ExtendedSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{EXTENSION_MARKER}{}", self.encoding)
        } else {
            write!(
                f,
                "{EXTENSION_MARKER}{}.{}",
                self.encoding,
                self.path.join(".")
            )
        }
    }
}

/// A field path split into its resource part and its extension chain.
///
/// For `data.secretConfiguration.!!base64.!!yaml.common.URL`,
/// `resource_path` is `["data", "secretConfiguration"]` and `segments` holds
/// `base64` with an empty path followed by `yaml` with `["common", "URL"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPath {
    pub resource_path: Vec<String>,
    pub segments: Vec<ExtendedSegment>,
}

impl ExtendedPath {
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let parts = split_path(input)?;
        Self::from_parts(parts).map_err(|err| match err {
            PathError::EmptyExtension { .. } => PathError::EmptyExtension {
                input: input.to_string(),
            },
            other => other,
        })
    }

    /// Build from already split segments.
    ///
    /// The first marker ends the resource path. There is no escape for
    /// segments that merely look like a marker.
    pub fn from_parts(parts: Vec<String>) -> Result<Self, PathError> {
        let mut resource_path = Vec::new();
        let mut segments: Vec<ExtendedSegment> = Vec::new();

        for part in parts {
            if let Some(encoding) = part.strip_prefix(EXTENSION_MARKER) {
                if encoding.is_empty() {
                    return Err(PathError::EmptyExtension { input: part });
                }
                segments.push(ExtendedSegment {
                    encoding: encoding.to_string(),
                    path: Vec::new(),
                });
                continue;
            }

            match segments.last_mut() {
                Some(segment) => segment.path.push(part),
                None => resource_path.push(part),
            }
        }

        Ok(Self {
            resource_path,
            segments,
        })
    }

    pub fn has_extensions(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Typed segments of the resource part.
    pub fn resource_segments(&self) -> Result<Vec<PathSegment>, PathError> {
        parse_segments(&self.resource_path)
    }

    pub fn has_wildcard(&self) -> bool {
        self.resource_path.iter().any(|p| p == "*")
    }
}

impl fmt::Display for ExtendedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.resource_path.clone();
        parts.extend(self.segments.iter().map(ToString::to_string));
        write!(f, "{}", parts.join("."))
    }
}
