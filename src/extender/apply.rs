//! Writing a value through a chain of extension segments.
//!
//! Each layer is decoded, the next layer is extracted and recursed into, and
//! on the way back every layer stores the re-encoded inner payload and
//! re-encodes itself. Nothing is written to the resource until the whole
//! chain succeeded.

use crate::error::ErrorKind;
use crate::extender::{ExtenderError, ExtenderRegistry, Payload};
use crate::path::{retype_scalar, scalar_text, ExtendedSegment};
use serde_yaml::Value;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("extended paths must start at a scalar field, found a collection at '{path}'")]
    NotScalar { path: String },

    #[error("extension #{index} ({segment}): {source}")]
    Segment {
        index: usize,
        segment: String,
        #[source]
        source: ExtenderError,
    },

    #[error("re-encoded payload is not valid UTF-8")]
    NotUtf8,
}

impl ApplyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplyError::NotScalar { .. } => ErrorKind::OptionConflict,
            ApplyError::Segment { source, .. } => source.kind(),
            ApplyError::NotUtf8 => ErrorKind::Parse,
        }
    }
}

/// Set `value` inside `input` at the end of `segments`, returning the new
/// outermost payload.
pub fn apply_segments(
    registry: &ExtenderRegistry,
    segments: &[ExtendedSegment],
    input: &[u8],
    value: Payload<'_>,
) -> Result<Vec<u8>, ApplyError> {
    apply_layer(registry, segments, 0, input, value)
}

fn apply_layer(
    registry: &ExtenderRegistry,
    segments: &[ExtendedSegment],
    index: usize,
    input: &[u8],
    value: Payload<'_>,
) -> Result<Vec<u8>, ApplyError> {
    let Some(segment) = segments.get(index) else {
        return value
            .to_bytes("raw")
            .map(|bytes| bytes.into_owned())
            .map_err(|source| ApplyError::Segment {
                index,
                segment: String::new(),
                source,
            });
    };
    let fail = |source: ExtenderError| ApplyError::Segment {
        index,
        segment: segment.to_string(),
        source,
    };

    trace!(index, segment = %segment, "decoding layer");
    let mut extender = registry.create(&segment.encoding, input).map_err(fail)?;

    if index + 1 == segments.len() {
        extender.set(&segment.path, value).map_err(fail)?;
    } else {
        let inner = extender.get(&segment.path).map_err(fail)?;
        let updated = apply_layer(registry, segments, index + 1, &inner, value)?;
        extender
            .set(&segment.path, Payload::Raw(&updated))
            .map_err(fail)?;
    }

    extender.payload().map_err(fail)
}

/// Write `value` into the scalar `target` through `segments`.
///
/// With no segments the value replaces the field, keeping the field's scalar
/// kind when the value's text parses as it. Otherwise the field text is the
/// outermost payload and is replaced by its re-encoded form.
pub fn apply_to_field(
    registry: &ExtenderRegistry,
    target: &mut Value,
    path: &str,
    segments: &[ExtendedSegment],
    value: &Value,
) -> Result<(), ApplyError> {
    if segments.is_empty() {
        *target = retype_scalar(target, value);
        return Ok(());
    }

    let input = scalar_text(target).ok_or_else(|| ApplyError::NotScalar {
        path: path.to_string(),
    })?;
    let output = apply_segments(registry, segments, input.as_bytes(), Payload::Node(value))?;
    let text = String::from_utf8(output).map_err(|_| ApplyError::NotUtf8)?;
    *target = Value::String(text);
    Ok(())
}
