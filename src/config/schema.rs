use crate::path::ExtendedPath;
use crate::resource::{ResId, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field read from sources and written to targets when none is configured.
pub const DEFAULT_FIELD_PATH: &str = "metadata.name";

/// Annotation asking for local-config resources to be dropped from the output.
pub const PRUNE_LOCAL_ANNOTATION: &str = "config.kubernetes.io/prune-local";

/// A rule configuration file as written by users.
///
/// The KRM envelope (`apiVersion`, `kind`, `metadata`) is optional so the
/// same file can be used as a function config resource.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ConfigMetadata,
    #[serde(default)]
    pub replacements: Vec<ReplacementEntry>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ConfigMetadata {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

/// One entry of the `replacements` list: an inline rule or a file reference.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReplacementEntry {
    pub path: Option<String>,
    pub source: Option<SourceSelector>,
    pub targets: Vec<TargetSelector>,
}

/// A rule file referenced by `path` holds one rule or a list of rules.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum RuleFile {
    Many(Vec<ReplacementRule>),
    One(ReplacementRule),
}

impl RuleFile {
    pub fn into_rules(self) -> Vec<ReplacementRule> {
        match self {
            RuleFile::Many(rules) => rules,
            RuleFile::One(rule) => vec![rule],
        }
    }
}

/// Rules ready to run, with the envelope metadata they came with.
#[derive(Debug, Clone, Default)]
pub struct ReplacerConfig {
    pub metadata: ConfigMetadata,
    pub rules: Vec<ReplacementRule>,
}

impl ReplacerConfig {
    pub fn prune_local(&self) -> bool {
        self.metadata.annotations.contains_key(PRUNE_LOCAL_ANNOTATION)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyReplacementList);
        }
        for (index, rule) in self.rules.iter().enumerate() {
            rule.collect_issues(index, &mut issues);
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ReplacementRule {
    pub source: Option<SourceSelector>,
    pub targets: Vec<TargetSelector>,
}

impl ReplacementRule {
    pub fn new(source: SourceSelector, targets: Vec<TargetSelector>) -> Self {
        Self {
            source: Some(source),
            targets,
        }
    }

    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        self.collect_issues(index, &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    fn collect_issues(&self, rule: usize, issues: &mut Vec<ValidationIssue>) {
        match &self.source {
            None => issues.push(ValidationIssue::MissingField {
                rule,
                field: "source".to_string(),
            }),
            Some(source) => {
                let path = source.field_path();
                match ExtendedPath::parse(path) {
                    Ok(parsed) if parsed.has_extensions() => {
                        issues.push(ValidationIssue::InvalidCombo {
                            rule,
                            message: format!(
                                "source fieldPath '{path}' cannot contain extensions"
                            ),
                        })
                    }
                    Ok(_) => {}
                    Err(err) => issues.push(ValidationIssue::InvalidFieldPath {
                        rule,
                        path: path.to_string(),
                        message: err.to_string(),
                    }),
                }
            }
        }

        if self.targets.is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule,
                field: "targets".to_string(),
            });
        }

        for (t, target) in self.targets.iter().enumerate() {
            match &target.select {
                None => issues.push(ValidationIssue::MissingField {
                    rule,
                    field: format!("targets[{t}].select"),
                }),
                Some(select) => select.collect_issues(rule, &format!("targets[{t}].select"), issues),
            }
            for (r, reject) in target.reject.iter().enumerate() {
                reject.collect_issues(rule, &format!("targets[{t}].reject[{r}]"), issues);
            }

            for path in target.field_paths() {
                if path.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        rule,
                        field: format!("targets[{t}].fieldPaths"),
                    });
                    continue;
                }
                match ExtendedPath::parse(path) {
                    Ok(parsed) if parsed.has_extensions() && target.options().has_delimiter() => {
                        issues.push(ValidationIssue::InvalidCombo {
                            rule,
                            message: format!(
                                "targets[{t}]: delimiter cannot be used with the extended path '{path}'"
                            ),
                        })
                    }
                    Ok(_) => {}
                    Err(err) => issues.push(ValidationIssue::InvalidFieldPath {
                        rule,
                        path: path.to_string(),
                        message: err.to_string(),
                    }),
                }
            }
        }
    }
}

/// Encoders applied to a source value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceEncoding {
    Base64,
    Bcrypt,
    Hex,
}

impl SourceEncoding {
    pub fn name(self) -> &'static str {
        match self {
            SourceEncoding::Base64 => "base64",
            SourceEncoding::Bcrypt => "bcrypt",
            SourceEncoding::Hex => "hex",
        }
    }
}

impl TryFrom<String> for SourceEncoding {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "base64" => Ok(SourceEncoding::Base64),
            "bcrypt" => Ok(SourceEncoding::Bcrypt),
            "hex" => Ok(SourceEncoding::Hex),
            _ => Err(format!(
                "unknown encoding '{value}', expected one of base64, bcrypt, hex"
            )),
        }
    }
}

impl From<SourceEncoding> for String {
    fn from(value: SourceEncoding) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldOptions {
    /// Split (source) or splice (target) the value on this separator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Part used with `delimiter`
    pub index: i64,
    /// Encoder applied to the source value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<SourceEncoding>,
    /// Create missing target fields
    pub create: bool,
}

impl FieldOptions {
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref().filter(|d| !d.is_empty())
    }

    pub fn has_delimiter(&self) -> bool {
        self.delimiter().is_some()
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceSelector {
    #[serde(flatten)]
    pub id: ResId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
}

impl SourceSelector {
    pub fn field_path(&self) -> &str {
        self.field_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_FIELD_PATH)
    }
}

impl fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.field_path())
    }
}

/// Identity fields plus optional label and annotation selectors.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSelector {
    #[serde(flatten)]
    pub id: ResId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_selector: Option<String>,
}

impl ResourceSelector {
    pub fn has_metadata_selectors(&self) -> bool {
        self.label_selector().is_some() || self.annotation_selector().is_some()
    }

    pub fn label_selector(&self) -> Option<&str> {
        self.label_selector.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn annotation_selector(&self) -> Option<&str> {
        self.annotation_selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    fn collect_issues(&self, rule: usize, field: &str, issues: &mut Vec<ValidationIssue>) {
        let selectors = [
            ("labelSelector", self.label_selector()),
            ("annotationSelector", self.annotation_selector()),
        ];
        for (name, selector) in selectors {
            if let Some(Err(err)) = selector.map(Selector::parse) {
                issues.push(ValidationIssue::InvalidCombo {
                    rule,
                    message: format!("{field}.{name}: {err}"),
                });
            }
        }
    }
}

impl fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.id)?;
        if let Some(labels) = self.label_selector() {
            write!(f, " labels({labels})")?;
        }
        if let Some(annotations) = self.annotation_selector() {
            write!(f, " annotations({annotations})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<ResourceSelector>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reject: Vec<ResourceSelector>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
}

impl TargetSelector {
    /// Configured field paths, or the default one.
    pub fn field_paths(&self) -> Vec<&str> {
        if self.field_paths.is_empty() {
            vec![DEFAULT_FIELD_PATH]
        } else {
            self.field_paths.iter().map(String::as_str).collect()
        }
    }

    pub fn options(&self) -> FieldOptions {
        self.options.clone().unwrap_or_default()
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.select {
            Some(select) => write!(f, "{select}"),
            None => write!(f, "[no select]"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyReplacementList,
    PathWithInlineRule {
        entry: usize,
    },
    MissingField {
        rule: usize,
        field: String,
    },
    InvalidFieldPath {
        rule: usize,
        path: String,
        message: String,
    },
    InvalidCombo {
        rule: usize,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyReplacementList => {
                write!(f, "configuration contains no replacements")
            }
            ValidationIssue::PathWithInlineRule { entry } => write!(
                f,
                "replacement entry #{entry} sets both 'path' and an inline source/targets"
            ),
            ValidationIssue::MissingField { rule, field } => {
                write!(f, "replacement #{rule} missing required field '{field}'")
            }
            ValidationIssue::InvalidFieldPath {
                rule,
                path,
                message,
            } => write!(f, "replacement #{rule} has invalid field path '{path}': {message}"),
            ValidationIssue::InvalidCombo { rule, message } => {
                write!(f, "replacement #{rule} has invalid configuration: {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(yaml: &str) -> ReplacementRule {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn selectors_deserialize_flattened_ids() {
        let rule = rule(
            r#"
source:
  kind: ConfigMap
  name: settings
  fieldPath: data.branch
  options:
    delimiter: "/"
    index: 1
targets:
  - select:
      kind: Application
      labelSelector: app=web
    reject:
      - name: skipped
    fieldPaths:
      - spec.source.targetRevision
    options:
      create: true
"#,
        );
        let source = rule.source.as_ref().unwrap();
        assert_eq!(source.id.gvk.kind, "ConfigMap");
        assert_eq!(source.id.name, "settings");
        assert_eq!(source.field_path(), "data.branch");
        assert_eq!(source.options.as_ref().unwrap().delimiter(), Some("/"));

        let target = &rule.targets[0];
        let select = target.select.as_ref().unwrap();
        assert_eq!(select.id.gvk.kind, "Application");
        assert_eq!(select.label_selector(), Some("app=web"));
        assert_eq!(target.reject[0].id.name, "skipped");
        assert!(target.options().create);
        assert!(rule.validate(0).is_ok());
    }

    #[test]
    fn field_paths_default_to_name() {
        let target = TargetSelector::default();
        assert_eq!(target.field_paths(), vec![DEFAULT_FIELD_PATH]);
        assert_eq!(SourceSelector::default().field_path(), DEFAULT_FIELD_PATH);
    }

    #[test]
    fn encoding_names_are_case_insensitive() {
        let options: FieldOptions = serde_yaml::from_str("encoding: BCrypt\n").unwrap();
        assert_eq!(options.encoding, Some(SourceEncoding::Bcrypt));
        assert!(serde_yaml::from_str::<FieldOptions>("encoding: rot13\n").is_err());
    }

    #[test]
    fn validation_collects_every_issue() {
        let rule = rule(
            r#"
targets:
  - fieldPaths: ["data.!!yaml.a"]
    options:
      delimiter: ","
  - select:
      labelSelector: "env in (prod"
"#,
        );
        let err = rule.validate(3).unwrap_err();
        assert_eq!(err.issues.len(), 4);
        assert!(err.issues.contains(&ValidationIssue::MissingField {
            rule: 3,
            field: "source".to_string()
        }));
        assert!(err.issues.contains(&ValidationIssue::MissingField {
            rule: 3,
            field: "targets[0].select".to_string()
        }));
        assert!(err.to_string().contains("delimiter cannot be used"));
        assert!(err.to_string().contains("labelSelector"));
    }

    #[test]
    fn source_path_with_extension_is_rejected() {
        let rule = rule("source:\n  fieldPath: data.x.!!yaml.a\ntargets:\n  - select: {}\n");
        let err = rule.validate(0).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(matches!(err.issues[0], ValidationIssue::InvalidCombo { .. }));
    }
}
