use crate::extender::{Codec, ExtenderError, Payload};
use crate::path::PathError;
use toml_edit::{Decor, DocumentMut, Item, Value};

/// TOML document embedded in a field.
///
/// Edits go through `toml_edit`, so comments, key order and formatting of
/// untouched lines survive a round trip. Only existing scalar values can be
/// replaced.
#[derive(Debug, Clone)]
pub struct TomlExtender {
    document: DocumentMut,
}

fn step<'a>(item: &'a Item, key: &str) -> Option<&'a Item> {
    match key.parse::<usize>() {
        Ok(index) if item.is_array() || item.is_array_of_tables() => item.get(index),
        _ => item.get(key),
    }
}

fn step_mut<'a>(item: &'a mut Item, key: &str) -> Option<&'a mut Item> {
    match key.parse::<usize>() {
        Ok(index) if item.is_array() || item.is_array_of_tables() => item.get_mut(index),
        _ => item.get_mut(key),
    }
}

fn not_found(path: &[String]) -> ExtenderError {
    ExtenderError::Path {
        encoding: TomlExtender::NAME,
        source: PathError::NotFound {
            path: path.join("."),
        },
    }
}

/// Plain text of a value: unquoted for strings, TOML syntax for arrays and
/// inline tables.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.value().clone(),
        Value::Integer(i) => i.value().to_string(),
        Value::Float(f) => f.value().to_string(),
        Value::Boolean(b) => b.value().to_string(),
        Value::Datetime(d) => d.value().to_string(),
        Value::Array(_) | Value::InlineTable(_) => {
            let mut value = value.clone();
            *value.decor_mut() = Decor::default();
            value.to_string()
        }
    }
}

/// Replacement value keeping the type of `existing` when `text` parses as it.
fn coerce(existing: &Value, text: &str) -> Value {
    match existing {
        Value::Integer(_) => text.parse::<i64>().map(Value::from).ok(),
        Value::Float(_) => text.parse::<f64>().map(Value::from).ok(),
        Value::Boolean(_) => text.parse::<bool>().map(Value::from).ok(),
        _ => None,
    }
    .unwrap_or_else(|| Value::from(text))
}

impl Codec for TomlExtender {
    const NAME: &'static str = "toml";

    fn parse(payload: &[u8]) -> Result<Self, ExtenderError> {
        let invalid = |message: String| ExtenderError::InvalidPayload {
            encoding: Self::NAME,
            message,
        };
        let text = std::str::from_utf8(payload).map_err(|err| invalid(err.to_string()))?;
        let document = text
            .parse::<DocumentMut>()
            .map_err(|err| invalid(err.to_string()))?;
        Ok(Self { document })
    }

    fn payload(&self) -> Result<Vec<u8>, ExtenderError> {
        Ok(self.document.to_string().into_bytes())
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError> {
        let mut item = self.document.as_item();
        for key in path {
            item = step(item, key).ok_or_else(|| not_found(path))?;
        }
        let text = match item {
            Item::Value(value) => value_text(value),
            Item::Table(table) => table.to_string(),
            Item::ArrayOfTables(_) => {
                return Err(ExtenderError::InvalidPath {
                    encoding: Self::NAME,
                    path: path.join("."),
                    message: "an array of tables cannot be extracted".to_string(),
                })
            }
            Item::None => return Err(not_found(path)),
        };
        Ok(text.into_bytes())
    }

    fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(ExtenderError::InvalidPath {
                encoding: Self::NAME,
                path: String::new(),
                message: "the whole document cannot be replaced".to_string(),
            });
        };
        let text = value.to_text(Self::NAME)?;

        let mut item = self.document.as_item_mut();
        for key in parents {
            item = step_mut(item, key).ok_or_else(|| not_found(path))?;
        }
        let target = step_mut(item, last)
            .filter(|item| !item.is_none())
            .ok_or_else(|| ExtenderError::Unsupported {
                encoding: Self::NAME,
                path: path.join("."),
                message: "missing keys cannot be created".to_string(),
            })?;
        let existing = target
            .as_value_mut()
            .filter(|v| !v.is_array() && !v.is_inline_table())
            .ok_or_else(|| ExtenderError::InvalidPath {
                encoding: Self::NAME,
                path: path.join("."),
                message: "only scalar values can be replaced".to_string(),
            })?;

        let mut replacement = coerce(existing, &text);
        *replacement.decor_mut() = existing.decor().clone();
        *existing = replacement;
        Ok(())
    }
}
