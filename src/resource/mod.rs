//! Documents and their identity.
//!
//! A [`Resource`] wraps one ordered YAML tree. Its identifier is read from
//! `apiVersion`, `kind`, `metadata.name` and `metadata.namespace`; former
//! identifiers come from the previous-identity annotations.

pub mod id;
pub mod selector;

use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use id::{
    is_cluster_scoped, parse_previous_ids, Gvk, IdentityError, PreviousId, ResId,
    DEFAULT_NAMESPACE, PREVIOUS_KINDS_ANNOTATION, PREVIOUS_NAMESPACES_ANNOTATION,
    PREVIOUS_NAMES_ANNOTATION,
};
pub use selector::{Requirement, Selector, SelectorError};

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    root: Value,
    origin: Option<PathBuf>,
}

fn str_at<'a>(root: &'a Value, keys: &[&str]) -> &'a str {
    let mut node = root;
    for key in keys {
        match node.get(*key) {
            Some(next) => node = next,
            None => return "",
        }
    }
    node.as_str().unwrap_or("")
}

/// String entries of a mapping; non-string values are rendered as text.
fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Mapping(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let key = key.as_str()?.to_string();
            let value = crate::path::scalar_text(value)?;
            Some((key, value))
        })
        .collect()
}

impl Resource {
    pub fn new(root: Value) -> Self {
        Self { root, origin: None }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn api_version(&self) -> &str {
        str_at(&self.root, &["apiVersion"])
    }

    pub fn kind(&self) -> &str {
        str_at(&self.root, &["kind"])
    }

    pub fn name(&self) -> &str {
        str_at(&self.root, &["metadata", "name"])
    }

    pub fn namespace(&self) -> &str {
        str_at(&self.root, &["metadata", "namespace"])
    }

    pub fn id(&self) -> ResId {
        ResId::new(
            Gvk::from_api_version(self.api_version(), self.kind()),
            self.name(),
            self.namespace(),
        )
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        string_map(self.root.get("metadata").and_then(|m| m.get("labels")))
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        string_map(self.root.get("metadata").and_then(|m| m.get("annotations")))
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.root
            .get("metadata")?
            .get("annotations")?
            .get(key)?
            .as_str()
    }

    /// Former identifiers, each carrying the current group and version.
    pub fn previous_ids(&self) -> Result<Vec<ResId>, IdentityError> {
        let previous = parse_previous_ids(
            self.annotation(PREVIOUS_NAMES_ANNOTATION),
            self.annotation(PREVIOUS_NAMESPACES_ANNOTATION),
            self.annotation(PREVIOUS_KINDS_ANNOTATION),
        )?;
        let current = self.id();
        Ok(previous
            .into_iter()
            .map(|p| {
                let gvk = Gvk {
                    kind: p.kind,
                    ..current.gvk.clone()
                };
                ResId::new(gvk, p.name, p.namespace)
            })
            .collect())
    }

    /// Current identifier followed by every former one. Never empty.
    pub fn identifiers(&self) -> Result<Vec<ResId>, IdentityError> {
        let mut ids = vec![self.id()];
        ids.extend(self.previous_ids()?);
        Ok(ids)
    }

    /// Whether the current or a former identifier is selected by `selector`.
    pub fn is_selected_by(&self, selector: &ResId) -> Result<bool, IdentityError> {
        Ok(self
            .identifiers()?
            .iter()
            .any(|id| id.is_selected_by(selector)))
    }

    /// Remove annotations whose key satisfies `predicate`, dropping the
    /// annotations mapping when it ends up empty. Returns how many were removed.
    pub fn remove_annotations(&mut self, predicate: impl Fn(&str) -> bool) -> usize {
        let Some(metadata) = self.root.get_mut("metadata").and_then(Value::as_mapping_mut) else {
            return 0;
        };
        let mut removed = 0;
        if let Some(Value::Mapping(annotations)) = metadata.get_mut("annotations") {
            let doomed: Vec<Value> = annotations
                .keys()
                .filter(|key| key.as_str().is_some_and(&predicate))
                .cloned()
                .collect();
            for key in &doomed {
                annotations.shift_remove(key);
            }
            removed = doomed.len();
        }
        let empty = matches!(
            metadata.get("annotations"),
            Some(Value::Mapping(annotations)) if annotations.is_empty()
        ) || matches!(metadata.get("annotations"), Some(Value::Null));
        if empty {
            metadata.shift_remove("annotations");
        }
        removed
    }
}

impl From<Value> for Resource {
    fn from(root: Value) -> Self {
        Resource::new(root)
    }
}
