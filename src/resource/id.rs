use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const PREVIOUS_NAMES_ANNOTATION: &str = "internal.config.kubernetes.io/previousNames";
pub const PREVIOUS_NAMESPACES_ANNOTATION: &str = "internal.config.kubernetes.io/previousNamespaces";
pub const PREVIOUS_KINDS_ANNOTATION: &str = "internal.config.kubernetes.io/previousKinds";

pub const DEFAULT_NAMESPACE: &str = "default";

/// Kinds whose resources never live in a namespace.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "CertificateSigningRequest",
    "ClusterIssuer",
    "ClusterRole",
    "ClusterRoleBinding",
    "ComponentStatus",
    "CSIDriver",
    "CSINode",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PodSecurityPolicy",
    "PriorityClass",
    "RuntimeClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
    "VolumeAttachment",
];

pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error(
        "previous identity annotations disagree: {names} name(s), {namespaces} namespace(s), {kinds} kind(s)"
    )]
    MismatchedPreviousIds {
        names: usize,
        namespaces: usize,
        kinds: usize,
    },
}

/// Group, version and kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Gvk {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl Gvk {
    /// Split an `apiVersion` such as `apps/v1` or `v1`.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.rsplit_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn is_selected_by(&self, selector: &Gvk) -> bool {
        field_matches(&selector.group, &self.group)
            && field_matches(&selector.version, &self.version)
            && field_matches(&selector.kind, &self.kind)
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api = if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        };
        match (api.is_empty(), self.kind.is_empty()) {
            (true, _) => write!(f, "{}", self.kind),
            (false, true) => write!(f, "{api}"),
            (false, false) => write!(f, "{api}/{}", self.kind),
        }
    }
}

/// Empty or `*` selector fields match anything.
fn field_matches(selector: &str, value: &str) -> bool {
    selector.is_empty() || selector == "*" || selector == value
}

/// Identifier of a resource, also used as a selector where empty fields
/// match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ResId {
    #[serde(flatten)]
    pub gvk: Gvk,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl ResId {
    pub fn new(gvk: Gvk, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            gvk,
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Namespace used for comparisons.
    pub fn effective_namespace(&self) -> &str {
        if is_cluster_scoped(&self.gvk.kind) {
            ""
        } else if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ResId::default()
    }

    /// Whether every non-empty field of `selector` matches this identifier.
    pub fn is_selected_by(&self, selector: &ResId) -> bool {
        if !field_matches(&selector.name, &self.name) {
            return false;
        }
        if !selector.namespace.is_empty()
            && selector.namespace != "*"
            && selector.effective_namespace() != self.effective_namespace()
        {
            return false;
        }
        self.gvk.is_selected_by(&selector.gvk)
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.gvk)?;
        if !self.namespace.is_empty() {
            write!(f, " {}/{}", self.namespace, self.name)
        } else if !self.name.is_empty() {
            write!(f, " {}", self.name)
        } else {
            Ok(())
        }
    }
}

/// One former identity recorded by a rename or a namespace move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousId {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(|item| item.trim().to_string()).collect()
}

/// Parse the previous identity annotations.
///
/// Nothing is returned unless the names annotation is present. A missing
/// namespaces or kinds annotation reads as one empty entry, and the three
/// lists must have the same length.
pub fn parse_previous_ids(
    names: Option<&str>,
    namespaces: Option<&str>,
    kinds: Option<&str>,
) -> Result<Vec<PreviousId>, IdentityError> {
    let Some(names) = names else {
        return Ok(Vec::new());
    };
    let names = split_list(names);
    let namespaces = split_list(namespaces.unwrap_or_default());
    let kinds = split_list(kinds.unwrap_or_default());

    if names.len() != namespaces.len() || names.len() != kinds.len() {
        return Err(IdentityError::MismatchedPreviousIds {
            names: names.len(),
            namespaces: namespaces.len(),
            kinds: kinds.len(),
        });
    }

    Ok(names
        .into_iter()
        .zip(namespaces)
        .zip(kinds)
        .map(|((name, namespace), kind)| PreviousId {
            kind,
            name,
            namespace,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(api_version: &str, kind: &str, name: &str, namespace: &str) -> ResId {
        ResId::new(Gvk::from_api_version(api_version, kind), name, namespace)
    }

    #[test]
    fn api_version_is_split() {
        let gvk = Gvk::from_api_version("apps/v1", "Deployment");
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        let core = Gvk::from_api_version("v1", "ConfigMap");
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");
    }

    #[test]
    fn empty_selector_fields_match_anything() {
        let resource = id("v1", "ConfigMap", "settings", "");
        let selector = ResId {
            gvk: Gvk {
                kind: "ConfigMap".to_string(),
                ..Gvk::default()
            },
            ..ResId::default()
        };
        assert!(resource.is_selected_by(&selector));
        assert!(resource.is_selected_by(&ResId::default()));
    }

    #[test]
    fn namespace_defaults_when_comparing() {
        let resource = id("v1", "ConfigMap", "settings", "");
        let selector = ResId {
            namespace: "default".to_string(),
            ..ResId::default()
        };
        assert!(resource.is_selected_by(&selector));
        let other = ResId {
            namespace: "kube-system".to_string(),
            ..ResId::default()
        };
        assert!(!resource.is_selected_by(&other));
    }

    #[test]
    fn cluster_scoped_kind_has_no_namespace() {
        let resource = id("v1", "Namespace", "argocd", "");
        assert_eq!(resource.effective_namespace(), "");
    }

    #[test]
    fn mismatched_name_is_rejected() {
        let resource = id("apps/v1", "Deployment", "web", "prod");
        let selector = id("", "Deployment", "api", "");
        assert!(!resource.is_selected_by(&selector));
    }

    #[test]
    fn previous_ids_zip_parallel_lists() {
        let previous = parse_previous_ids(
            Some("old-a,old-b"),
            Some("default,tools"),
            Some("ConfigMap,ConfigMap"),
        )
        .unwrap();
        assert_eq!(previous.len(), 2);
        assert_eq!(previous[1].name, "old-b");
        assert_eq!(previous[1].namespace, "tools");
    }

    #[test]
    fn previous_ids_require_equal_lengths() {
        let err = parse_previous_ids(Some("a,b"), Some("default"), Some("ConfigMap,ConfigMap"))
            .unwrap_err();
        assert_eq!(
            err,
            IdentityError::MismatchedPreviousIds {
                names: 2,
                namespaces: 1,
                kinds: 2
            }
        );
    }

    #[test]
    fn missing_lists_read_as_one_empty_entry() {
        let ids = parse_previous_ids(Some("old"), None, None).unwrap();
        assert_eq!(
            ids,
            vec![PreviousId {
                kind: String::new(),
                name: "old".to_string(),
                namespace: String::new(),
            }]
        );

        let err = parse_previous_ids(Some("a,b"), None, Some("X,Y")).unwrap_err();
        assert_eq!(
            err,
            IdentityError::MismatchedPreviousIds {
                names: 2,
                namespaces: 1,
                kinds: 2
            }
        );
    }

    #[test]
    fn previous_ids_absent_without_names() {
        assert!(parse_previous_ids(None, Some("default"), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn display_includes_namespace() {
        assert_eq!(
            id("apps/v1", "Deployment", "web", "prod").to_string(),
            "apps/v1/Deployment prod/web"
        );
    }
}
