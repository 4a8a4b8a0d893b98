use super::{resources, run};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use krm_replacer::ErrorKind;
use pretty_assertions::assert_eq;
use serde_yaml::Value;

#[test]
fn value_tunnels_into_embedded_yaml() {
    let mut docs = resources(
        r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: deployment-settings
spec:
  branch: deploy/citest
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: app-config
data:
  config: |
    target: main
    replicas: 2
    notes: keep me
"#,
    );
    run(
        &mut docs,
        r#"
- source:
    name: deployment-settings
    fieldPath: spec.branch
  targets:
    - select:
        name: app-config
      fieldPaths:
        - data.config.!!yaml.target
"#,
    )
    .unwrap();

    assert_eq!(
        docs[1].root()["data"]["config"].as_str().unwrap(),
        "target: deploy/citest\nreplicas: 2\nnotes: keep me\n"
    );
}

const SSH_CONFIG: &str = "\
Host holepunch
    HostName holepunch.in
    User git
    Port 2222
    IdentityFile ~/.ssh/id_holepunch
";

#[test]
fn value_tunnels_through_base64_and_regex() {
    let encoded = STANDARD.encode(SSH_CONFIG);
    let mut docs = resources(&format!(
        r#"
kind: ConfigMap
metadata:
  name: domain
data:
  domain: kaweezle.com
---
kind: Secret
metadata:
  name: ssh
data:
  config: {encoded}
"#
    ));
    run(
        &mut docs,
        r#"
- source:
    name: domain
    fieldPath: data.domain
  targets:
    - select:
        kind: Secret
      fieldPaths:
        - 'data.config.!!base64.!!regex.^\s+HostName\s+(\S+)$.1'
"#,
    )
    .unwrap();

    let decoded = STANDARD
        .decode(docs[1].root()["data"]["config"].as_str().unwrap())
        .unwrap();
    let decoded = String::from_utf8(decoded).unwrap();
    assert_eq!(decoded, SSH_CONFIG.replace("holepunch.in", "kaweezle.com"));
}

#[test]
fn create_builds_missing_fields() {
    let mut docs = resources(
        "kind: Source\nmetadata:\n  name: src\ndata:\n  value: hello\n---\nkind: Target\nmetadata:\n  name: dst\n",
    );
    run(
        &mut docs,
        r#"
- source: {kind: Source, fieldPath: data.value}
  targets:
    - select: {kind: Target}
      fieldPaths: [spec.newField]
      options: {create: true}
"#,
    )
    .unwrap();
    assert_eq!(
        docs[1].root()["spec"]["newField"],
        Value::String("hello".to_string())
    );
}

#[test]
fn create_with_wildcard_fails_before_mutation() {
    let mut docs = resources(
        "kind: Source\nmetadata:\n  name: src\ndata:\n  value: hello\n---\nkind: Target\nmetadata:\n  name: dst\n",
    );
    let before = docs.clone();
    let err = run(
        &mut docs,
        r#"
- source: {kind: Source, fieldPath: data.value}
  targets:
    - select: {kind: Target}
      fieldPaths: [spec.*.newField]
      options: {create: true}
"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Creation);
    assert_eq!(docs, before);
}

fn splice(index: i64) -> String {
    let mut docs = resources(
        "kind: Source\nmetadata:\n  name: src\ndata:\n  value: x\n---\nkind: Target\nmetadata:\n  name: dst\ndata:\n  list: a,b,c\n",
    );
    run(
        &mut docs,
        &format!(
            r#"
- source: {{kind: Source, fieldPath: data.value}}
  targets:
    - select: {{kind: Target}}
      fieldPaths: [data.list]
      options: {{delimiter: ",", index: {index}}}
"#
        ),
    )
    .unwrap();
    docs[1].root()["data"]["list"].as_str().unwrap().to_string()
}

#[test]
fn delimiter_splices_target_value() {
    assert_eq!(splice(-1), "x,a,b,c");
    assert_eq!(splice(3), "a,b,c,x");
    assert_eq!(splice(1), "a,x,c");
}

#[test]
fn delimiter_with_extension_is_an_option_conflict() {
    let mut docs = resources(
        "kind: Source\nmetadata:\n  name: src\n---\nkind: Target\nmetadata:\n  name: dst\ndata:\n  config: 'a: b'\n",
    );
    let err = run(
        &mut docs,
        r#"
- source: {kind: Source}
  targets:
    - select: {kind: Target}
      fieldPaths: [data.config.!!yaml.a]
      options: {delimiter: ","}
"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OptionConflict);
}

#[test]
fn later_rules_see_earlier_changes() {
    let mut docs = resources(
        "kind: A\nmetadata:\n  name: a\ndata:\n  v: first\n---\nkind: B\nmetadata:\n  name: b\ndata:\n  v: old\n---\nkind: C\nmetadata:\n  name: c\ndata:\n  v: old\n",
    );
    run(
        &mut docs,
        r#"
- source: {kind: A, fieldPath: data.v}
  targets:
    - select: {kind: B}
      fieldPaths: [data.v]
- source: {kind: B, fieldPath: data.v}
  targets:
    - select: {kind: C}
      fieldPaths: [data.v]
"#,
    )
    .unwrap();
    assert_eq!(docs[2].root()["data"]["v"], Value::String("first".to_string()));
}

#[test]
fn embedded_json_keeps_key_order() {
    let mut docs = resources(
        r#"
kind: Source
metadata:
  name: src
data:
  url: https://example.com
---
kind: Target
metadata:
  name: dst
data:
  settings.json: '{"zeta": 1, "url": "old", "alpha": true}'
"#,
    );
    run(
        &mut docs,
        r#"
- source: {kind: Source, fieldPath: data.url}
  targets:
    - select: {kind: Target}
      fieldPaths: ['data.[settings.json].!!json.url']
"#,
    )
    .unwrap();
    let text = docs[1].root()["data"]["settings.json"].as_str().unwrap();
    let json: serde_json::Value = serde_json::from_str(text).unwrap();
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["zeta", "url", "alpha"]);
    assert_eq!(json["url"], "https://example.com");
}

#[test]
fn string_source_keeps_target_number_kind() {
    let mut docs = resources(
        r#"
kind: ConfigMap
metadata:
  name: sizing
data:
  replicas: "3"
  port: "8080"
---
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
  template:
    config: |
      port: 80
      host: web
"#,
    );
    run(
        &mut docs,
        r#"
- source: {kind: ConfigMap, fieldPath: data.replicas}
  targets:
    - select: {kind: Deployment}
      fieldPaths: [spec.replicas]
- source: {kind: ConfigMap, fieldPath: data.port}
  targets:
    - select: {kind: Deployment}
      fieldPaths: [spec.template.config.!!yaml.port]
"#,
    )
    .unwrap();

    assert_eq!(docs[1].root()["spec"]["replicas"], Value::from(3));
    let rendered = krm_replacer::stream::render(&docs[1..]).unwrap();
    assert!(rendered.contains("replicas: 3\n"), "{rendered}");
    assert_eq!(
        docs[1].root()["spec"]["template"]["config"].as_str().unwrap(),
        "port: 8080\nhost: web\n"
    );
}
