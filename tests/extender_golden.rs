//! Golden tests for writes through embedded payloads.
//!
//! Each case writes one value through an extended path and compares the
//! whole resulting field text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use krm_replacer::{apply_to_field, ErrorKind, ExtendedPath, ExtenderRegistry};
use pretty_assertions::assert_eq;
use serde_yaml::Value;

fn write(field: &str, path: &str, value: Value) -> Result<String, krm_replacer::ApplyError> {
    let registry = ExtenderRegistry::builtin();
    let path = ExtendedPath::parse(path).unwrap();
    let mut target = Value::String(field.to_string());
    apply_to_field(&registry, &mut target, &path.to_string(), &path.segments, &value)?;
    Ok(target.as_str().unwrap().to_string())
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

#[test]
fn yaml_values_file() {
    let values = "\
common:
  targetRevision: main
apps:
- name: traefik
  enabled: true
- name: cert-manager
  enabled: false
";
    let out = write(
        values,
        "data.values.!!yaml.apps.[name=cert-manager].enabled",
        Value::Bool(true),
    )
    .unwrap();
    assert_eq!(out, values.replace("enabled: false", "enabled: true"));
}

#[test]
fn yaml_keeps_comments_quotes_and_indentation() {
    let values = "\
# deployment settings
common:
  targetRevision: main # branch
  hosts:
    - \"a.example.com\"
    - 'b.example.com'
apps:
  - name: traefik   # ingress
    enabled: true
";
    let out = write(
        values,
        "data.values.!!yaml.common.targetRevision",
        text("deploy/citest"),
    )
    .unwrap();
    assert_eq!(out, values.replace("main # branch", "deploy/citest # branch"));
}

#[test]
fn unmodified_payloads_read_back_unchanged() {
    let registry = ExtenderRegistry::builtin();
    let yaml = "# top\nlist:\n    - 'x'\n    - \"y\"  # second\nflow: {a: 1}\n";
    let json = "{\n  \"b\": 1,\n  \"a\": [\n    true,\n    \"x\"\n  ]\n}\n";
    for (encoding, payload) in [("yaml", yaml), ("json", json)] {
        let extender = registry.create(encoding, payload.as_bytes()).unwrap();
        assert_eq!(
            String::from_utf8(extender.payload().unwrap()).unwrap(),
            payload,
            "{encoding}"
        );
    }
}

#[test]
fn yaml_inside_yaml() {
    let outer = "inner: |\n  url: old\n";
    let out = write(outer, "x.!!yaml.inner.!!yaml.url", text("new")).unwrap();
    let parsed: Value = serde_yaml::from_str(&out).unwrap();
    assert_eq!(parsed["inner"].as_str(), Some("url: new\n"));
}

#[test]
fn json_settings() {
    let settings = "{\n  \"server\": {\n    \"host\": \"old\",\n    \"port\": 8080\n  }\n}";
    let out = write(settings, "x.!!json.server.host", text("new")).unwrap();
    assert_eq!(
        out,
        "{\n  \"server\": {\n    \"host\": \"new\",\n    \"port\": 8080\n  }\n}\n"
    );
}

#[test]
fn toml_keeps_comments() {
    let config = "# cluster settings\n[cluster]\nname = \"old\" # set by CI\nnodes = 3\n";
    let out = write(config, "x.!!toml.cluster.name", text("prod")).unwrap();
    assert_eq!(
        out,
        "# cluster settings\n[cluster]\nname = \"prod\" # set by CI\nnodes = 3\n"
    );
}

#[test]
fn base64_ini() {
    let ini = "[database]\nhost = old.internal\nport = 5432\n";
    let out = write(
        &STANDARD.encode(ini),
        "x.!!base64.!!ini.database.host",
        text("db.kaweezle.com"),
    )
    .unwrap();
    let decoded = String::from_utf8(STANDARD.decode(out).unwrap()).unwrap();
    assert_eq!(decoded, "[database]\nhost = db.kaweezle.com\nport = 5432\n");
}

#[test]
fn base64_whole_payload() {
    let out = write(&STANDARD.encode("old"), "x.!!base64", text("new")).unwrap();
    assert_eq!(out, STANDARD.encode("new"));
}

#[test]
fn regex_without_match_is_unchanged() {
    let script = "#!/bin/sh\necho hello\n";
    let out = write(script, r"x.!!regex.DOMAIN=(\S+).1", text("x")).unwrap();
    assert_eq!(out, script);
}

#[test]
fn unknown_encoding_suggests_name() {
    let err = write("a: b", "x.!!yml.a", text("c")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.to_string().contains("yaml"));
}
