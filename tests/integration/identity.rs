use super::{resources, run};
use krm_replacer::ErrorKind;
use pretty_assertions::assert_eq;
use serde_yaml::Value;

const RENAMED: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: prod-settings
  namespace: prod
  annotations:
    internal.config.kubernetes.io/previousNames: settings
    internal.config.kubernetes.io/previousNamespaces: default
    internal.config.kubernetes.io/previousKinds: ConfigMap
data:
  branch: release
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: prod
spec:
  revision: none
"#;

#[test]
fn source_is_selected_by_previous_name() {
    let mut docs = resources(RENAMED);
    run(
        &mut docs,
        r#"
- source: {kind: ConfigMap, name: settings, fieldPath: data.branch}
  targets:
    - select: {kind: Deployment}
      fieldPaths: [spec.revision]
"#,
    )
    .unwrap();
    assert_eq!(
        docs[1].root()["spec"]["revision"],
        Value::String("release".to_string())
    );
}

#[test]
fn target_is_selected_by_previous_name() {
    let mut docs = resources(
        r#"
kind: Source
metadata:
  name: src
data:
  v: new
---
kind: Deployment
metadata:
  name: prod-web
  annotations:
    internal.config.kubernetes.io/previousNames: web
    internal.config.kubernetes.io/previousNamespaces: default
    internal.config.kubernetes.io/previousKinds: Deployment
spec:
  v: old
---
kind: Deployment
metadata:
  name: api
spec:
  v: old
"#,
    );
    let report = run(
        &mut docs,
        r#"
- source: {kind: Source, fieldPath: data.v}
  targets:
    - select: {kind: Deployment, name: web}
      fieldPaths: [spec.v]
"#,
    )
    .unwrap();
    assert_eq!(report[0].targets, 1);
    assert_eq!(report[0].fields, 1);
    assert_eq!(docs[1].root()["spec"]["v"], Value::String("new".to_string()));
    assert_eq!(docs[2].root()["spec"]["v"], Value::String("old".to_string()));
}

#[test]
fn target_reject_matches_previous_name() {
    let mut docs = resources(
        r#"
kind: Source
metadata:
  name: src
data:
  v: new
---
kind: ConfigMap
metadata:
  name: prefixed-legacy
  annotations:
    internal.config.kubernetes.io/previousNames: legacy
    internal.config.kubernetes.io/previousNamespaces: default
    internal.config.kubernetes.io/previousKinds: ConfigMap
data:
  v: old
---
kind: ConfigMap
metadata:
  name: current
data:
  v: old
"#,
    );
    run(
        &mut docs,
        r#"
- source: {kind: Source, fieldPath: data.v}
  targets:
    - select: {kind: ConfigMap}
      reject: [{name: legacy}]
      fieldPaths: [data.v]
"#,
    )
    .unwrap();
    assert_eq!(docs[1].root()["data"]["v"], Value::String("old".to_string()));
    assert_eq!(docs[2].root()["data"]["v"], Value::String("new".to_string()));
}

#[test]
fn mismatched_previous_lists_are_a_parse_error() {
    let mut docs = resources(
        r#"
kind: ConfigMap
metadata:
  name: x
  annotations:
    internal.config.kubernetes.io/previousNames: a,b
    internal.config.kubernetes.io/previousNamespaces: default
    internal.config.kubernetes.io/previousKinds: ConfigMap
data:
  v: 1
"#,
    );
    let err = run(
        &mut docs,
        "- source: {kind: ConfigMap, fieldPath: data.v}\n  targets:\n    - select: {kind: ConfigMap}\n",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn namespace_selects_between_same_names() {
    let mut docs = resources(
        r#"
kind: ConfigMap
metadata:
  name: env
  namespace: dev
data:
  tier: development
---
kind: ConfigMap
metadata:
  name: env
  namespace: prod
data:
  tier: production
---
kind: Deployment
metadata:
  name: web
  namespace: prod
spec:
  tier: unknown
"#,
    );
    run(
        &mut docs,
        r#"
- source: {kind: ConfigMap, name: env, namespace: prod, fieldPath: data.tier}
  targets:
    - select: {kind: Deployment, namespace: prod}
      fieldPaths: [spec.tier]
"#,
    )
    .unwrap();
    assert_eq!(
        docs[2].root()["spec"]["tier"],
        Value::String("production".to_string())
    );
}
