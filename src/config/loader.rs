use crate::config::schema::{
    ConfigFile, ReplacementRule, ReplacerConfig, RuleFile, ValidationError, ValidationIssue,
};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Syntax of a configuration file, chosen from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml {
        path: Option<PathBuf>,
        source: serde_yaml::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Yaml { path: None, source } => ConfigError::Yaml {
                path: Some(path),
                source,
            },
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read replacement config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Yaml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse replacement config YAML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse replacement config YAML: {}", source),
            },
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse replacement config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse replacement config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(
                    f,
                    "invalid replacement config ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "invalid replacement config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Yaml { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

fn deserialize<T: serde::de::DeserializeOwned>(
    input: &str,
    format: ConfigFormat,
) -> Result<T, ConfigError> {
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(input).map_err(|source| ConfigError::Yaml { path: None, source })
        }
        ConfigFormat::Toml => {
            toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { path: None, source })
        }
    }
}

/// Parse a configuration, resolving `path` entries against `base_dir`.
pub fn load_from_str_in(
    input: &str,
    format: ConfigFormat,
    base_dir: &Path,
) -> Result<ReplacerConfig, ConfigError> {
    let file: ConfigFile = deserialize(input, format)?;

    let mut issues = Vec::new();
    let mut rules: Vec<ReplacementRule> = Vec::new();
    for (index, entry) in file.replacements.into_iter().enumerate() {
        match entry.path {
            Some(path) if entry.source.is_some() || !entry.targets.is_empty() => {
                debug!(entry = index, path = %path, "path and inline rule both set");
                issues.push(ValidationIssue::PathWithInlineRule { entry: index });
            }
            Some(path) => rules.extend(load_rule_file(&base_dir.join(path))?),
            None => rules.push(ReplacementRule {
                source: entry.source,
                targets: entry.targets,
            }),
        }
    }

    let config = ReplacerConfig {
        metadata: file.metadata,
        rules,
    };
    if let Err(mut err) = config.validate() {
        issues.append(&mut err.issues);
    }
    if !issues.is_empty() {
        return Err(ConfigError::Validation {
            path: None,
            source: ValidationError { issues },
        });
    }
    Ok(config)
}

pub fn load_from_str(input: &str, format: ConfigFormat) -> Result<ReplacerConfig, ConfigError> {
    load_from_str_in(input, format, Path::new("."))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ReplacerConfig, ConfigError> {
    let path = path.as_ref();
    let contents = read(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_from_str_in(&contents, ConfigFormat::from_path(path), base_dir)
        .map_err(|error| error.with_path(path))
}

/// Rules from a file referenced by a `path` entry.
pub fn load_rule_file(path: &Path) -> Result<Vec<ReplacementRule>, ConfigError> {
    let contents = read(path)?;
    let file: RuleFile = deserialize(&contents, ConfigFormat::from_path(path))
        .map_err(|error| error.with_path(path))?;
    let rules = file.into_rules();
    debug!(path = %path.display(), count = rules.len(), "loaded referenced rules");
    Ok(rules)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
