//! Codecs for payloads embedded inside scalar fields.
//!
//! Every codec parses a byte payload, reads or replaces the value at a
//! codec-specific sub-path, and re-serializes the payload. Codecs are looked
//! up by encoding name in an [`ExtenderRegistry`].

pub mod apply;
pub mod base64;
pub mod errors;
pub mod ini;
pub mod json;
pub mod regex;
pub mod toml;
pub mod yaml;
mod yaml_spans;

use crate::path::{is_scalar, scalar_text, NodeKind};
use serde_yaml::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

pub use self::apply::{apply_segments, apply_to_field, ApplyError};
pub use self::base64::Base64Extender;
pub use self::errors::ExtenderError;
pub use self::ini::IniExtender;
pub use self::json::JsonExtender;
pub use self::regex::RegexExtender;
pub use self::toml::TomlExtender;
pub use self::yaml::YamlExtender;

/// Value handed to a codec's `set`.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Structured value taken from the source resource
    Node(&'a Value),
    /// Re-encoded bytes of an inner payload
    Raw(&'a [u8]),
}

impl<'a> Payload<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Payload::Node(node) => NodeKind::of(node),
            Payload::Raw(_) => NodeKind::Scalar,
        }
    }

    /// Byte form: scalar text, or YAML for collections.
    pub fn to_bytes(&self, encoding: &'static str) -> Result<Cow<'a, [u8]>, ExtenderError> {
        match *self {
            Payload::Raw(bytes) => Ok(Cow::Borrowed(bytes)),
            Payload::Node(node) => match scalar_text(node) {
                Some(text) => Ok(Cow::Owned(text.into_bytes())),
                None => serde_yaml::to_string(node)
                    .map(|text| Cow::Owned(text.into_bytes()))
                    .map_err(|err| ExtenderError::Serialize {
                        encoding,
                        message: err.to_string(),
                    }),
            },
        }
    }

    pub fn to_text(&self, encoding: &'static str) -> Result<String, ExtenderError> {
        let bytes = self.to_bytes(encoding)?;
        String::from_utf8(bytes.into_owned()).map_err(|_| ExtenderError::InvalidPayload {
            encoding,
            message: "value is not valid UTF-8".to_string(),
        })
    }

    /// Tree form: the node itself, or a string scalar for raw bytes.
    pub fn to_node(&self, encoding: &'static str) -> Result<Value, ExtenderError> {
        match self {
            Payload::Node(node) => Ok((*node).clone()),
            Payload::Raw(_) => self.to_text(encoding).map(Value::String),
        }
    }

    pub fn is_scalar(&self) -> bool {
        match self {
            Payload::Node(node) => is_scalar(node),
            Payload::Raw(_) => true,
        }
    }
}

/// Operations every codec provides.
pub trait Codec: Sized {
    /// Encoding name used after the `!!` marker
    const NAME: &'static str;

    fn parse(payload: &[u8]) -> Result<Self, ExtenderError>;

    /// Current payload, re-encoded.
    fn payload(&self) -> Result<Vec<u8>, ExtenderError>;

    fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError>;

    fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError>;
}

/// A parsed payload of one of the supported encodings.
#[derive(Debug)]
pub enum Extender {
    Yaml(YamlExtender),
    Json(JsonExtender),
    Toml(TomlExtender),
    Ini(IniExtender),
    Base64(Base64Extender),
    Regex(RegexExtender),
}

impl Extender {
    pub fn encoding(&self) -> &'static str {
        match self {
            Extender::Yaml(_) => YamlExtender::NAME,
            Extender::Json(_) => JsonExtender::NAME,
            Extender::Toml(_) => TomlExtender::NAME,
            Extender::Ini(_) => IniExtender::NAME,
            Extender::Base64(_) => Base64Extender::NAME,
            Extender::Regex(_) => RegexExtender::NAME,
        }
    }

    pub fn payload(&self) -> Result<Vec<u8>, ExtenderError> {
        match self {
            Extender::Yaml(codec) => codec.payload(),
            Extender::Json(codec) => codec.payload(),
            Extender::Toml(codec) => codec.payload(),
            Extender::Ini(codec) => codec.payload(),
            Extender::Base64(codec) => codec.payload(),
            Extender::Regex(codec) => codec.payload(),
        }
    }

    pub fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError> {
        match self {
            Extender::Yaml(codec) => codec.get(path),
            Extender::Json(codec) => codec.get(path),
            Extender::Toml(codec) => codec.get(path),
            Extender::Ini(codec) => codec.get(path),
            Extender::Base64(codec) => codec.get(path),
            Extender::Regex(codec) => codec.get(path),
        }
    }

    pub fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError> {
        match self {
            Extender::Yaml(codec) => codec.set(path, value),
            Extender::Json(codec) => codec.set(path, value),
            Extender::Toml(codec) => codec.set(path, value),
            Extender::Ini(codec) => codec.set(path, value),
            Extender::Base64(codec) => codec.set(path, value),
            Extender::Regex(codec) => codec.set(path, value),
        }
    }
}

/// Builds a codec from a raw payload.
pub type ExtenderFactory = fn(&[u8]) -> Result<Extender, ExtenderError>;

/// Encoding name to codec constructor.
///
/// Built once at startup and passed to whoever applies extended paths.
#[derive(Debug, Clone)]
pub struct ExtenderRegistry {
    factories: BTreeMap<String, ExtenderFactory>,
}

impl Default for ExtenderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ExtenderRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the six built-in encodings.
    pub fn builtin() -> Self {
        Self::empty()
            .with(YamlExtender::NAME, |p| YamlExtender::parse(p).map(Extender::Yaml))
            .with(JsonExtender::NAME, |p| JsonExtender::parse(p).map(Extender::Json))
            .with(TomlExtender::NAME, |p| TomlExtender::parse(p).map(Extender::Toml))
            .with(IniExtender::NAME, |p| IniExtender::parse(p).map(Extender::Ini))
            .with(Base64Extender::NAME, |p| Base64Extender::parse(p).map(Extender::Base64))
            .with(RegexExtender::NAME, |p| RegexExtender::parse(p).map(Extender::Regex))
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn with(mut self, name: &str, factory: ExtenderFactory) -> Self {
        self.factories.insert(name.to_ascii_lowercase(), factory);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Parse `payload` with the codec registered for `encoding`.
    pub fn create(&self, encoding: &str, payload: &[u8]) -> Result<Extender, ExtenderError> {
        let factory = self
            .factories
            .get(&encoding.to_ascii_lowercase())
            .ok_or_else(|| self.unknown(encoding))?;
        factory(payload)
    }

    /// Error for an unregistered encoding, with the closest known name.
    pub fn unknown(&self, name: &str) -> ExtenderError {
        let lowered = name.to_ascii_lowercase();
        let suggestion = self
            .names()
            .map(|candidate| (candidate, strsim::jaro_winkler(&lowered, candidate)))
            .filter(|(_, score)| *score > 0.8)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(candidate, _)| candidate.to_string());
        ExtenderError::UnknownEncoding {
            name: name.to_string(),
            suggestion,
        }
    }
}
