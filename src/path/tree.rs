//! Path resolution over the ordered YAML tree.
//!
//! Three access modes exist:
//! - [`resolve`] returns every concrete location a path matches,
//! - [`get_at`] / [`get_at_mut`] follow one concrete location,
//! - [`lookup_or_create`] walks a path, creating what is missing.

use crate::path::errors::PathError;
use crate::path::query::{display_path, PathSegment};
use serde_yaml::{Mapping, Value};

/// One step of a concrete location inside a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

pub type Location = Vec<Step>;

/// Structural kind of a node, used to create missing leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scalar,
    Mapping,
    Sequence,
}

impl NodeKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Mapping(_) => NodeKind::Mapping,
            Value::Sequence(_) => NodeKind::Sequence,
            Value::Tagged(tagged) => NodeKind::of(&tagged.value),
            _ => NodeKind::Scalar,
        }
    }

    fn empty_node(self) -> Value {
        match self {
            NodeKind::Scalar => Value::Null,
            NodeKind::Mapping => Value::Mapping(Mapping::new()),
            NodeKind::Sequence => Value::Sequence(Vec::new()),
        }
    }
}

/// Text of a scalar node, `None` for collections.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Mapping(_) | Value::Sequence(_) => None,
    }
}

pub fn is_scalar(value: &Value) -> bool {
    NodeKind::of(value) == NodeKind::Scalar
}

/// `value` converted to the scalar kind `existing` already holds.
///
/// Text that parses as the existing number or boolean takes that kind; a
/// string field keeps holding a string. Null fields, collections and text
/// that does not parse take `value` unchanged.
pub fn retype_scalar(existing: &Value, value: &Value) -> Value {
    let Some(text) = scalar_text(value) else {
        return value.clone();
    };
    let converted = match existing {
        Value::Number(_) => parse_number(&text),
        Value::Bool(_) => text.parse::<bool>().ok().map(Value::Bool),
        Value::String(_) if !value.is_string() => Some(Value::String(text)),
        _ => None,
    };
    converted.unwrap_or_else(|| value.clone())
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::from(n));
    }
    if let Ok(n) = text.parse::<u64>() {
        return Some(Value::from(n));
    }
    text.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Value::from)
}

fn matches_field(element: &Value, key: &str, expected: &str) -> bool {
    element
        .as_mapping()
        .and_then(|map| map.get(key))
        .and_then(scalar_text)
        .is_some_and(|text| text == expected)
}

fn matches_scalar(element: &Value, expected: &str) -> bool {
    is_scalar(element) && scalar_text(element).is_some_and(|text| text == expected)
}

/// Steps one segment matches directly under `node`.
fn match_segment(node: &Value, segment: &PathSegment) -> Vec<Step> {
    match (node, segment) {
        (Value::Tagged(tagged), _) => match_segment(&tagged.value, segment),
        (Value::Mapping(map), PathSegment::Key(key)) => {
            if map.contains_key(key.as_str()) {
                vec![Step::Key(key.clone())]
            } else {
                Vec::new()
            }
        }
        (Value::Sequence(seq), PathSegment::Key(_)) => match segment.as_index() {
            Some(index) if index < seq.len() => vec![Step::Index(index)],
            _ => Vec::new(),
        },
        (Value::Mapping(map), PathSegment::Wildcard) => map
            .keys()
            .filter_map(|k| k.as_str().map(|k| Step::Key(k.to_string())))
            .collect(),
        (Value::Sequence(seq), PathSegment::Wildcard) => (0..seq.len()).map(Step::Index).collect(),
        (Value::Sequence(seq), PathSegment::Match { key, value }) => seq
            .iter()
            .enumerate()
            .filter(|(_, element)| matches_field(element, key, value))
            .map(|(i, _)| Step::Index(i))
            .collect(),
        (Value::Sequence(seq), PathSegment::ScalarMatch(value)) => seq
            .iter()
            .enumerate()
            .filter(|(_, element)| matches_scalar(element, value))
            .map(|(i, _)| Step::Index(i))
            .collect(),
        _ => Vec::new(),
    }
}

/// Every concrete location matched by `path` under `root`.
pub fn resolve(root: &Value, path: &[PathSegment]) -> Vec<Location> {
    let mut frontier: Vec<Location> = vec![Vec::new()];

    for segment in path {
        let mut next = Vec::new();
        for location in frontier {
            let Some(node) = get_at(root, &location) else {
                continue;
            };
            for step in match_segment(node, segment) {
                let mut extended = location.clone();
                extended.push(step);
                next.push(extended);
            }
        }
        frontier = next;
    }

    frontier
}

/// Resolve a path that must match exactly one node.
pub fn resolve_one(root: &Value, path: &[PathSegment]) -> Result<Location, PathError> {
    let mut matches = resolve(root, path);
    match matches.len() {
        0 => Err(PathError::NotFound {
            path: display_path(path),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(PathError::AmbiguousMatch {
            path: display_path(path),
            count,
        }),
    }
}

pub fn get_at<'a>(root: &'a Value, location: &[Step]) -> Option<&'a Value> {
    let mut node = root;
    for step in location {
        if let Value::Tagged(tagged) = node {
            node = &tagged.value;
        }
        node = match (node, step) {
            (Value::Mapping(map), Step::Key(key)) => map.get(key.as_str())?,
            (Value::Sequence(seq), Step::Index(index)) => seq.get(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

pub fn get_at_mut<'a>(root: &'a mut Value, location: &[Step]) -> Option<&'a mut Value> {
    let mut node = root;
    for step in location {
        node = match node {
            Value::Tagged(tagged) => &mut tagged.value,
            other => other,
        };
        node = match (node, step) {
            (Value::Mapping(map), Step::Key(key)) => map.get_mut(key.as_str())?,
            (Value::Sequence(seq), Step::Index(index)) => seq.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Kind of container the next segment needs to descend into.
fn container_for(segment: &PathSegment) -> NodeKind {
    match segment {
        PathSegment::Match { .. } | PathSegment::ScalarMatch(_) => NodeKind::Sequence,
        _ => NodeKind::Mapping,
    }
}

/// Walk `path` from `node`, creating missing mappings, predicate elements and
/// finally a leaf of `kind` when it does not exist.
pub fn lookup_or_create<'a>(
    node: &'a mut Value,
    path: &[PathSegment],
    kind: NodeKind,
) -> Result<&'a mut Value, PathError> {
    lookup_or_create_at(node, path, 0, kind)
}

fn lookup_or_create_at<'a>(
    node: &'a mut Value,
    path: &[PathSegment],
    depth: usize,
    kind: NodeKind,
) -> Result<&'a mut Value, PathError> {
    let Some(segment) = path.get(depth) else {
        return Ok(node);
    };
    let child_kind = match path.get(depth + 1) {
        Some(next) => container_for(next),
        None => kind,
    };
    let here = || display_path(&path[..=depth]);

    if node.is_null() {
        *node = container_for(segment).empty_node();
    }
    let node = match node {
        Value::Tagged(tagged) => &mut tagged.value,
        other => other,
    };

    let child = match (node, segment) {
        (_, PathSegment::Wildcard) => {
            return Err(PathError::WildcardCreate {
                path: display_path(path),
            })
        }
        (Value::Mapping(map), PathSegment::Key(key)) => {
            if !map.contains_key(key.as_str()) {
                map.insert(Value::String(key.clone()), child_kind.empty_node());
            }
            map.get_mut(key.as_str())
                .ok_or_else(|| PathError::NotFound { path: here() })?
        }
        (Value::Sequence(seq), PathSegment::Key(key)) => {
            let index = segment.as_index().ok_or_else(|| PathError::TypeMismatch {
                path: here(),
                message: format!("'{key}' is not an index into a sequence"),
            })?;
            let len = seq.len();
            seq.get_mut(index).ok_or_else(|| PathError::IndexOutOfRange {
                path: here(),
                index,
                len,
            })?
        }
        (Value::Sequence(seq), PathSegment::Match { key, value }) => {
            let found: Vec<usize> = seq
                .iter()
                .enumerate()
                .filter(|(_, element)| matches_field(element, key, value))
                .map(|(i, _)| i)
                .collect();
            let index = match found.as_slice() {
                [] => {
                    let mut element = Mapping::new();
                    element.insert(Value::String(key.clone()), Value::String(value.clone()));
                    seq.push(Value::Mapping(element));
                    seq.len() - 1
                }
                [index] => *index,
                many => {
                    return Err(PathError::AmbiguousMatch {
                        path: here(),
                        count: many.len(),
                    })
                }
            };
            &mut seq[index]
        }
        (Value::Sequence(seq), PathSegment::ScalarMatch(value)) => {
            let index = match seq.iter().position(|element| matches_scalar(element, value)) {
                Some(index) => index,
                None => {
                    seq.push(Value::String(value.clone()));
                    seq.len() - 1
                }
            };
            &mut seq[index]
        }
        (other, _) => {
            return Err(PathError::TypeMismatch {
                path: here(),
                message: format!("found {:?} node", NodeKind::of(other)),
            })
        }
    };

    lookup_or_create_at(child, path, depth + 1, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::query::{parse_segments, split_path};

    fn segments(path: &str) -> Vec<PathSegment> {
        parse_segments(&split_path(path).unwrap()).unwrap()
    }

    fn tree(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn retype_follows_existing_scalar() {
        let text = |s: &str| Value::String(s.to_string());
        assert_eq!(retype_scalar(&Value::from(1), &text("3")), Value::from(3));
        assert_eq!(retype_scalar(&Value::from(0.5), &text("1.5")), Value::from(1.5));
        assert_eq!(retype_scalar(&Value::Bool(false), &text("true")), Value::Bool(true));
        assert_eq!(retype_scalar(&text("x"), &Value::from(8080)), text("8080"));
        assert_eq!(retype_scalar(&Value::from(1), &text("many")), text("many"));
        assert_eq!(retype_scalar(&Value::Null, &text("3")), text("3"));
        assert_eq!(retype_scalar(&tree("a: b"), &text("3")), text("3"));
        assert_eq!(retype_scalar(&Value::from(1), &tree("[a]")), tree("[a]"));
    }

    #[test]
    fn resolve_predicate_and_wildcard() {
        let root = tree(
            "items:\n- name: a\n  value: 1\n- name: b\n  value: 2\n- name: a\n  value: 3\n",
        );
        assert_eq!(resolve(&root, &segments("items.[name=a].value")).len(), 2);
        assert_eq!(resolve(&root, &segments("items.*.name")).len(), 3);
        assert_eq!(resolve(&root, &segments("items.1.value")).len(), 1);
        assert!(resolve(&root, &segments("items.[name=c].value")).is_empty());
    }

    #[test]
    fn resolve_one_requires_single_match() {
        let root = tree("a:\n  b: x\n");
        let location = resolve_one(&root, &segments("a.b")).unwrap();
        assert_eq!(
            get_at(&root, &location).and_then(scalar_text),
            Some("x".to_string())
        );
        assert!(matches!(
            resolve_one(&root, &segments("a.c")),
            Err(PathError::NotFound { .. })
        ));
    }

    #[test]
    fn lookup_or_create_builds_intermediate_nodes() {
        let mut root = tree("kind: Foo\n");
        let leaf = lookup_or_create(&mut root, &segments("spec.template.name"), NodeKind::Scalar)
            .unwrap();
        assert!(leaf.is_null());
        *leaf = Value::String("created".to_string());
        assert_eq!(root["spec"]["template"]["name"], Value::String("created".into()));
    }

    #[test]
    fn lookup_or_create_appends_predicate_element() {
        let mut root = tree("env:\n- name: A\n  value: a\n");
        let leaf = lookup_or_create(&mut root, &segments("env.[name=B].value"), NodeKind::Scalar)
            .unwrap();
        *leaf = Value::String("b".to_string());
        let env = root["env"].as_sequence().unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env[1]["name"], Value::String("B".into()));
        assert_eq!(env[1]["value"], Value::String("b".into()));
    }

    #[test]
    fn lookup_or_create_rejects_wildcard() {
        let mut root = tree("spec: {}\n");
        let err = lookup_or_create(&mut root, &segments("spec.*.name"), NodeKind::Scalar)
            .unwrap_err();
        assert!(matches!(err, PathError::WildcardCreate { .. }));
    }

    #[test]
    fn lookup_or_create_rejects_scalar_parent() {
        let mut root = tree("spec: text\n");
        let err =
            lookup_or_create(&mut root, &segments("spec.name"), NodeKind::Scalar).unwrap_err();
        assert!(matches!(err, PathError::TypeMismatch { .. }));
    }
}
