use crate::edit::Edit;
use crate::extender::yaml_spans::ScalarSpans;
use crate::extender::{Codec, ExtenderError, Payload};
use crate::path::{
    display_path, get_at, get_at_mut, is_scalar, lookup_or_create, parse_segments, resolve,
    retype_scalar, scalar_text, NodeKind, PathError, PathSegment,
};
use serde_yaml::{Mapping, Value};
use tracing::debug;

/// YAML document embedded in a field.
///
/// The text is kept as read. Replacing existing one-line scalars edits the
/// text in place, keeping comments, quoting and indentation. Any other
/// change re-serializes the whole document.
#[derive(Debug, Clone)]
pub struct YamlExtender {
    root: Value,
    text: String,
}

impl YamlExtender {
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Text after writing `updated`, edited in place where possible.
    fn rewrite(&self, segments: &[PathSegment], updated: &Value) -> Result<String, ExtenderError> {
        match self.rewrite_scalars(segments, updated) {
            Some(text) => Ok(text),
            None => {
                debug!(path = %display_path(segments), "re-serializing embedded YAML");
                yaml_text(updated)
            }
        }
    }

    fn rewrite_scalars(&self, segments: &[PathSegment], updated: &Value) -> Option<String> {
        let locations = resolve(&self.root, segments);
        if locations.is_empty() {
            return None;
        }
        let spans = ScalarSpans::scan(&self.text)?;
        let edits = locations
            .iter()
            .map(|location| {
                let old = get_at(&self.root, location)?;
                let new = get_at(updated, location)?;
                if !is_scalar(old) || !is_scalar(new) {
                    return None;
                }
                spans.edit(location, new)
            })
            .collect::<Option<Vec<_>>>()?;

        let bytes = Edit::apply_batch(self.text.as_bytes(), edits).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        // the edited text must read back as the updated tree
        let reread: Value = serde_yaml::from_str(&text).ok()?;
        (reread == *updated).then_some(text)
    }
}

fn yaml_text(value: &Value) -> Result<String, ExtenderError> {
    serde_yaml::to_string(value).map_err(|err| ExtenderError::Serialize {
        encoding: YamlExtender::NAME,
        message: err.to_string(),
    })
}

fn yaml_bytes(value: &Value) -> Result<Vec<u8>, ExtenderError> {
    yaml_text(value).map(String::into_bytes)
}

impl Codec for YamlExtender {
    const NAME: &'static str = "yaml";

    fn parse(payload: &[u8]) -> Result<Self, ExtenderError> {
        let text = std::str::from_utf8(payload).map_err(|err| ExtenderError::InvalidPayload {
            encoding: Self::NAME,
            message: err.to_string(),
        })?;
        let root = if text.trim().is_empty() {
            Value::Mapping(Mapping::new())
        } else {
            serde_yaml::from_str(text).map_err(|err| ExtenderError::InvalidPayload {
                encoding: Self::NAME,
                message: err.to_string(),
            })?
        };
        Ok(Self {
            root,
            text: text.to_string(),
        })
    }

    fn payload(&self) -> Result<Vec<u8>, ExtenderError> {
        Ok(self.text.clone().into_bytes())
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError> {
        get_tree_value(&self.root, path, Self::NAME, true, yaml_bytes)
    }

    fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError> {
        let segments = tree_segments(path, Self::NAME)?;
        let mut updated = self.root.clone();
        set_tree_value(&mut updated, path, value, Self::NAME)?;
        self.text = self.rewrite(&segments, &updated)?;
        self.root = updated;
        Ok(())
    }
}

pub(crate) fn tree_segments(
    path: &[String],
    encoding: &'static str,
) -> Result<Vec<PathSegment>, ExtenderError> {
    parse_segments(path).map_err(|source| ExtenderError::Path { encoding, source })
}

/// Read the node(s) at `path` from a structured tree.
///
/// A single scalar yields its text. Collections go through `serialize`. With
/// `allow_many`, several matches are returned together as a sequence.
pub(crate) fn get_tree_value(
    root: &Value,
    path: &[String],
    encoding: &'static str,
    allow_many: bool,
    serialize: fn(&Value) -> Result<Vec<u8>, ExtenderError>,
) -> Result<Vec<u8>, ExtenderError> {
    let segments = tree_segments(path, encoding)?;
    let nodes: Vec<&Value> = resolve(root, &segments)
        .iter()
        .filter_map(|location| get_at(root, location))
        .collect();

    match nodes.as_slice() {
        [] => Err(ExtenderError::Path {
            encoding,
            source: PathError::NotFound {
                path: display_path(&segments),
            },
        }),
        [node] => match scalar_text(node) {
            Some(text) => Ok(text.into_bytes()),
            None => serialize(node),
        },
        many if allow_many => {
            serialize(&Value::Sequence(many.iter().map(|n| (*n).clone()).collect()))
        }
        many => Err(ExtenderError::Path {
            encoding,
            source: PathError::AmbiguousMatch {
                path: display_path(&segments),
                count: many.len(),
            },
        }),
    }
}

/// Write `value` at `path`, creating missing parents.
///
/// Paths containing a wildcard are not created: every existing match is
/// replaced instead.
pub(crate) fn set_tree_value(
    root: &mut Value,
    path: &[String],
    value: Payload<'_>,
    encoding: &'static str,
) -> Result<(), ExtenderError> {
    let segments = tree_segments(path, encoding)?;
    let node = value.to_node(encoding)?;
    let path_error = |source| ExtenderError::Path { encoding, source };

    if segments.iter().any(PathSegment::is_wildcard) {
        let locations = resolve(root, &segments);
        if locations.is_empty() {
            return Err(path_error(PathError::NotFound {
                path: display_path(&segments),
            }));
        }
        for location in locations {
            if let Some(target) = get_at_mut(root, &location) {
                assign(target, &node, &segments).map_err(path_error)?;
            }
        }
        return Ok(());
    }

    let target = lookup_or_create(root, &segments, NodeKind::of(&node)).map_err(path_error)?;
    assign(target, &node, &segments).map_err(path_error)
}

fn assign(target: &mut Value, node: &Value, segments: &[PathSegment]) -> Result<(), PathError> {
    let target_kind = NodeKind::of(target);
    if target_kind != NodeKind::Scalar && target_kind != NodeKind::of(node) {
        return Err(PathError::TypeMismatch {
            path: display_path(segments),
            message: format!(
                "cannot replace a {target_kind:?} node with a {:?} value",
                NodeKind::of(node)
            ),
        });
    }
    *target = retype_scalar(target, node);
    Ok(())
}
