//! Source value refinement and target splicing.

use crate::config::schema::{FieldOptions, SourceEncoding};
use crate::path::scalar_text;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_yaml::Value;
use thiserror::Error;
use tracing::warn;

pub const BCRYPT_COST: u32 = 10;

#[derive(Error, Debug)]
pub enum RefineError {
    #[error("options.index {index} is out of bounds for value '{value}' split on '{delimiter}'")]
    IndexOutOfRange {
        value: String,
        delimiter: String,
        index: i64,
    },

    #[error("the {option} option can only be used with scalar values")]
    NotScalar { option: &'static str },

    #[error("bcrypt hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Apply the source options to an extracted value.
///
/// A delimiter takes precedence over an encoding when both are set.
pub fn refine_source(value: &Value, options: Option<&FieldOptions>) -> Result<Value, RefineError> {
    let Some(options) = options else {
        return Ok(value.clone());
    };

    if let Some(delimiter) = options.delimiter() {
        if let Some(encoding) = options.encoding {
            warn!(
                delimiter,
                encoding = %encoding,
                "source sets both delimiter and encoding, ignoring the encoding"
            );
        }
        let text = scalar_text(value).ok_or(RefineError::NotScalar {
            option: "delimiter",
        })?;
        let parts: Vec<&str> = text.split(delimiter).collect();
        let part = usize::try_from(options.index)
            .ok()
            .and_then(|index| parts.get(index))
            .ok_or_else(|| RefineError::IndexOutOfRange {
                value: text.clone(),
                delimiter: delimiter.to_string(),
                index: options.index,
            })?;
        return Ok(Value::String(part.to_string()));
    }

    if let Some(encoding) = options.encoding {
        let text = scalar_text(value).ok_or(RefineError::NotScalar {
            option: "encoding",
        })?;
        return encode(encoding, &text).map(Value::String);
    }

    Ok(value.clone())
}

pub fn encode(encoding: SourceEncoding, text: &str) -> Result<String, RefineError> {
    match encoding {
        SourceEncoding::Base64 => Ok(STANDARD.encode(text)),
        SourceEncoding::Bcrypt => Ok(bcrypt::hash(text, BCRYPT_COST)?),
        SourceEncoding::Hex => Ok(hex::encode(text)),
    }
}

/// Put `value` into the `delimiter`-separated `current` text.
///
/// A negative index prepends, an index past the last part appends, anything
/// else replaces that part.
pub fn splice_delimited(current: &str, value: &str, delimiter: &str, index: i64) -> String {
    let mut parts: Vec<&str> = current.split(delimiter).collect();
    match usize::try_from(index) {
        Err(_) => parts.insert(0, value),
        Ok(index) if index >= parts.len() => parts.push(value),
        Ok(index) => parts[index] = value,
    }
    parts.join(delimiter)
}
