use crate::extender::yaml::{get_tree_value, set_tree_value};
use crate::extender::{Codec, ExtenderError, Payload};
use serde_yaml::Value;

/// JSON document embedded in a field.
///
/// The document is converted to the ordered YAML tree so paths behave the
/// same as for YAML payloads. Output is pretty printed with two spaces.
#[derive(Debug, Clone)]
pub struct JsonExtender {
    root: Value,
}

fn json_bytes(value: &Value) -> Result<Vec<u8>, ExtenderError> {
    let serialize_error = |err: serde_json::Error| ExtenderError::Serialize {
        encoding: JsonExtender::NAME,
        message: err.to_string(),
    };
    let json = serde_json::to_value(value).map_err(serialize_error)?;
    let mut text = serde_json::to_string_pretty(&json).map_err(serialize_error)?;
    text.push('\n');
    Ok(text.into_bytes())
}

impl Codec for JsonExtender {
    const NAME: &'static str = "json";

    fn parse(payload: &[u8]) -> Result<Self, ExtenderError> {
        let json: serde_json::Value =
            serde_json::from_slice(payload).map_err(|err| ExtenderError::InvalidPayload {
                encoding: Self::NAME,
                message: err.to_string(),
            })?;
        let root = serde_yaml::to_value(json).map_err(|err| ExtenderError::InvalidPayload {
            encoding: Self::NAME,
            message: err.to_string(),
        })?;
        Ok(Self { root })
    }

    fn payload(&self) -> Result<Vec<u8>, ExtenderError> {
        json_bytes(&self.root)
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError> {
        get_tree_value(&self.root, path, Self::NAME, false, json_bytes)
    }

    fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError> {
        set_tree_value(&mut self.root, path, value, Self::NAME)
    }
}
