use crate::edit::Edit;
use crate::extender::{Codec, ExtenderError, Payload};
use crate::path::PathError;
use regex::bytes::{Regex, RegexBuilder};
use tracing::debug;

/// Free-form text addressed by a regular expression.
///
/// `get` takes `[pattern]` and returns the first full match. `set` takes
/// `[pattern, group]` and replaces that capture group in every match.
/// Patterns run in multi-line mode.
#[derive(Debug, Clone)]
pub struct RegexExtender {
    text: Vec<u8>,
}

fn invalid_path(path: &[String], message: String) -> ExtenderError {
    ExtenderError::InvalidPath {
        encoding: RegexExtender::NAME,
        path: path.join("."),
        message,
    }
}

fn compile(pattern: &str, path: &[String]) -> Result<Regex, ExtenderError> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|err| invalid_path(path, err.to_string()))
}

impl Codec for RegexExtender {
    const NAME: &'static str = "regex";

    fn parse(payload: &[u8]) -> Result<Self, ExtenderError> {
        Ok(Self {
            text: payload.to_vec(),
        })
    }

    fn payload(&self) -> Result<Vec<u8>, ExtenderError> {
        Ok(self.text.clone())
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError> {
        let [pattern, ..] = path else {
            return Err(invalid_path(path, "a pattern is required".to_string()));
        };
        let regex = compile(pattern, path)?;
        regex
            .find(&self.text)
            .map(|found| found.as_bytes().to_vec())
            .ok_or_else(|| ExtenderError::Path {
                encoding: Self::NAME,
                source: PathError::NotFound {
                    path: pattern.clone(),
                },
            })
    }

    fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError> {
        let [pattern, group] = path else {
            return Err(invalid_path(
                path,
                "expected a pattern followed by a group number".to_string(),
            ));
        };
        let regex = compile(pattern, path)?;
        let group: usize = group
            .parse()
            .map_err(|_| invalid_path(path, format!("'{group}' is not a group number")))?;
        if group >= regex.captures_len() {
            return Err(invalid_path(
                path,
                format!(
                    "group {group} does not exist, the pattern has {} group(s)",
                    regex.captures_len() - 1
                ),
            ));
        }

        let replacement = value.to_bytes(Self::NAME)?;
        let edits: Vec<Edit> = regex
            .captures_iter(&self.text)
            .filter_map(|captures| captures.get(group))
            .map(|m| Edit::new(m.start(), m.end(), replacement.to_vec(), m.as_bytes()))
            .collect();

        if edits.is_empty() {
            debug!(pattern = %pattern, "regex matched nothing, payload left unchanged");
            return Ok(());
        }

        self.text = Edit::apply_batch(&self.text, edits).map_err(|source| ExtenderError::Edit {
            encoding: Self::NAME,
            source,
        })?;
        Ok(())
    }
}
