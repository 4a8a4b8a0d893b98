use crate::edit::Edit;
use crate::extender::{Codec, ExtenderError, Payload};
use crate::path::PathError;

/// INI document embedded in a field.
///
/// Values are replaced in place through byte-span edits, so comments,
/// spacing and key order are kept. A path is either `[key]` for keys before
/// the first section header or `[section, key]`.
#[derive(Debug, Clone)]
pub struct IniExtender {
    content: String,
    entries: Vec<IniEntry>,
}

#[derive(Debug, Clone)]
struct IniEntry {
    section: String,
    key: String,
    value_start: usize,
    value_end: usize,
    quoted: bool,
}

fn invalid(message: String) -> ExtenderError {
    ExtenderError::InvalidPayload {
        encoding: IniExtender::NAME,
        message,
    }
}

impl IniExtender {
    fn lookup(&self, path: &[String]) -> Result<&IniEntry, ExtenderError> {
        let (section, key) = match path {
            [key] => ("", key.as_str()),
            [section, key] => (section.as_str(), key.as_str()),
            _ => {
                return Err(ExtenderError::InvalidPath {
                    encoding: Self::NAME,
                    path: path.join("."),
                    message: "expected 'key' or 'section.key'".to_string(),
                })
            }
        };

        let matches: Vec<&IniEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.section == section && entry.key == key)
            .collect();
        match matches.as_slice() {
            [entry] => Ok(*entry),
            [] => Err(ExtenderError::Path {
                encoding: Self::NAME,
                source: PathError::NotFound {
                    path: path.join("."),
                },
            }),
            many => Err(ExtenderError::Path {
                encoding: Self::NAME,
                source: PathError::AmbiguousMatch {
                    path: path.join("."),
                    count: many.len(),
                },
            }),
        }
    }
}

/// Whether `text` must be quoted to read back unchanged.
fn needs_quotes(text: &str) -> bool {
    text != text.trim()
        || text.starts_with(['"', '\'', ';', '#'])
        || text.contains(" ;")
        || text.contains(" #")
}

impl Codec for IniExtender {
    const NAME: &'static str = "ini";

    fn parse(payload: &[u8]) -> Result<Self, ExtenderError> {
        let content = std::str::from_utf8(payload)
            .map_err(|err| invalid(err.to_string()))?
            .to_string();
        let entries = scan_entries(&content)?;
        Ok(Self { content, entries })
    }

    fn payload(&self) -> Result<Vec<u8>, ExtenderError> {
        Ok(self.content.clone().into_bytes())
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError> {
        let entry = self.lookup(path)?;
        Ok(self.content[entry.value_start..entry.value_end]
            .as_bytes()
            .to_vec())
    }

    fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError> {
        let text = value.to_text(Self::NAME)?;
        if text.contains('\n') {
            return Err(ExtenderError::Unsupported {
                encoding: Self::NAME,
                path: path.join("."),
                message: "multi-line values cannot be written".to_string(),
            });
        }

        let entry = match self.lookup(path) {
            Err(ExtenderError::Path {
                source: PathError::NotFound { .. },
                ..
            }) => {
                return Err(ExtenderError::Unsupported {
                    encoding: Self::NAME,
                    path: path.join("."),
                    message: "missing keys cannot be created".to_string(),
                })
            }
            other => other?,
        };

        let new_text = if !entry.quoted && needs_quotes(&text) {
            format!("\"{text}\"")
        } else {
            text
        };
        let before = &self.content[entry.value_start..entry.value_end];
        let edit = Edit::new(entry.value_start, entry.value_end, new_text, before.as_bytes());
        let updated = edit
            .apply(self.content.as_bytes())
            .map_err(|source| ExtenderError::Edit {
                encoding: Self::NAME,
                source,
            })?;

        self.content = String::from_utf8(updated).map_err(|err| invalid(err.to_string()))?;
        self.entries = scan_entries(&self.content)?;
        Ok(())
    }
}

fn scan_entries(content: &str) -> Result<Vec<IniEntry>, ExtenderError> {
    let mut entries = Vec::new();
    let mut section = String::new();
    let mut offset = 0usize;

    for (index, line) in content.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('[') {
            section = parse_header(trimmed).ok_or_else(|| {
                invalid(format!("line {}: unterminated section header", index + 1))
            })?;
            continue;
        }

        let entry = parse_key_line(line, line_start, &section).ok_or_else(|| {
            invalid(format!("line {}: expected 'key = value'", index + 1))
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

fn parse_header(trimmed: &str) -> Option<String> {
    let inner = trimmed.strip_prefix('[')?;
    let close = inner.find(']')?;
    Some(inner[..close].trim().to_string())
}

fn parse_key_line(line: &str, line_offset: usize, section: &str) -> Option<IniEntry> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    let separator = line.find(|c: char| c == '=' || c == ':')?;
    let key = line[..separator].trim();
    if key.is_empty() {
        return None;
    }

    let mut value_start = separator + 1;
    while let Some(ch) = line.as_bytes().get(value_start) {
        if *ch == b' ' || *ch == b'\t' {
            value_start += 1;
        } else {
            break;
        }
    }
    let rest = &line[value_start..];

    if let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') {
        if let Some(close) = rest[1..].find(quote) {
            return Some(IniEntry {
                section: section.to_string(),
                key: key.to_string(),
                value_start: line_offset + value_start + 1,
                value_end: line_offset + value_start + 1 + close,
                quoted: true,
            });
        }
    }

    // Inline comments start at ';' or '#' following whitespace.
    let bytes = rest.as_bytes();
    let mut value_end = bytes
        .iter()
        .enumerate()
        .find(|(idx, b)| {
            (**b == b';' || **b == b'#')
                && (*idx == 0 || bytes[idx - 1] == b' ' || bytes[idx - 1] == b'\t')
        })
        .map(|(idx, _)| idx)
        .unwrap_or(bytes.len());
    while value_end > 0 && (bytes[value_end - 1] == b' ' || bytes[value_end - 1] == b'\t') {
        value_end -= 1;
    }

    Some(IniEntry {
        section: section.to_string(),
        key: key.to_string(),
        value_start: line_offset + value_start,
        value_end: line_offset + value_start + value_end,
        quoted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "uninode = true\n\n[common]\n; revision to deploy\ntargetRevision = main\n\n[apps]\nenabled = true ; inline\n";

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn get_root_and_section_keys() {
        let codec = IniExtender::parse(SOURCE.as_bytes()).unwrap();
        assert_eq!(codec.get(&path(&["uninode"])).unwrap(), b"true");
        assert_eq!(codec.get(&path(&["common", "targetRevision"])).unwrap(), b"main");
        assert_eq!(codec.get(&path(&["apps", "enabled"])).unwrap(), b"true");
    }

    #[test]
    fn set_replaces_value_only() {
        let mut codec = IniExtender::parse(SOURCE.as_bytes()).unwrap();
        codec
            .set(&path(&["common", "targetRevision"]), Payload::Raw(b"deploy/citest"))
            .unwrap();
        codec
            .set(&path(&["apps", "enabled"]), Payload::Raw(b"false"))
            .unwrap();
        assert_eq!(
            String::from_utf8(codec.payload().unwrap()).unwrap(),
            "uninode = true\n\n[common]\n; revision to deploy\ntargetRevision = deploy/citest\n\n[apps]\nenabled = false ; inline\n"
        );
    }

    #[test]
    fn quoted_value_keeps_quotes() {
        let mut codec = IniExtender::parse(b"[db]\nurl = \"postgres://old\"\n").unwrap();
        assert_eq!(codec.get(&path(&["db", "url"])).unwrap(), b"postgres://old");
        codec
            .set(&path(&["db", "url"]), Payload::Raw(b"postgres://new"))
            .unwrap();
        assert_eq!(codec.payload().unwrap(), b"[db]\nurl = \"postgres://new\"\n");
    }

    #[test]
    fn colon_separator_is_accepted() {
        let codec = IniExtender::parse(b"[s]\nname: value\n").unwrap();
        assert_eq!(codec.get(&path(&["s", "name"])).unwrap(), b"value");
    }

    #[test]
    fn missing_key_is_not_created() {
        let mut codec = IniExtender::parse(SOURCE.as_bytes()).unwrap();
        let err = codec
            .set(&path(&["common", "other"]), Payload::Raw(b"x"))
            .unwrap_err();
        assert!(matches!(err, ExtenderError::Unsupported { .. }));
    }

    #[test]
    fn duplicate_key_is_ambiguous() {
        let codec = IniExtender::parse(b"[s]\na = 1\na = 2\n").unwrap();
        let err = codec.get(&path(&["s", "a"])).unwrap_err();
        assert!(matches!(
            err,
            ExtenderError::Path {
                source: PathError::AmbiguousMatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn line_without_separator_is_rejected() {
        let err = IniExtender::parse(b"[s]\njust text\n").unwrap_err();
        assert!(matches!(err, ExtenderError::InvalidPayload { .. }));
    }
}
