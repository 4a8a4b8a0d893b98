//! Multi-document YAML streams in and out of [`Resource`] lists.

use crate::resource::Resource;
use serde::Deserialize;
use serde_yaml::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Prefix of annotations added during a build and never meant for output.
pub const BUILD_ANNOTATION_PREFIX: &str = "internal.config.kubernetes.io/";

/// Resources carrying this annotation set to `"true"` are local configuration.
pub const LOCAL_CONFIG_ANNOTATION: &str = "config.kubernetes.io/local-config";

const DOCUMENT_SEPARATOR: &str = "---\n";

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML stream{}: {source}", origin_suffix(.origin))]
    Parse {
        origin: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize resource {resource}: {source}")]
    Serialize {
        resource: String,
        #[source]
        source: serde_yaml::Error,
    },
}

fn origin_suffix(origin: &Option<PathBuf>) -> String {
    origin
        .as_ref()
        .map(|path| format!(" in {}", path.display()))
        .unwrap_or_default()
}

/// Parse every non-null document of `input`.
pub fn parse_stream(input: &str, origin: Option<&Path>) -> Result<Vec<Resource>, StreamError> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(input) {
        let value = Value::deserialize(document).map_err(|source| StreamError::Parse {
            origin: origin.map(Path::to_path_buf),
            source,
        })?;
        if value.is_null() {
            continue;
        }
        let resource = Resource::new(value);
        resources.push(match origin {
            Some(origin) => resource.with_origin(origin),
            None => resource,
        });
    }
    Ok(resources)
}

pub fn read_file(path: &Path) -> Result<Vec<Resource>, StreamError> {
    let contents = std::fs::read_to_string(path).map_err(|source| StreamError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let resources = parse_stream(&contents, Some(path))?;
    debug!(path = %path.display(), count = resources.len(), "read resources");
    Ok(resources)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

/// Expand inputs into files. Directories contribute their `.yaml`/`.yml`
/// files one level deep, sorted by name.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, StreamError> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let walker = WalkDir::new(input)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|err| StreamError::Io {
                path: input.clone(),
                source: err.into(),
            })?;
            if entry.file_type().is_file() && is_yaml(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

/// Serialize resources as one `---` separated stream.
pub fn render<'r>(resources: impl IntoIterator<Item = &'r Resource>) -> Result<String, StreamError> {
    let mut documents = Vec::new();
    for resource in resources {
        let text = serde_yaml::to_string(resource.root()).map_err(|source| {
            StreamError::Serialize {
                resource: resource.id().to_string(),
                source,
            }
        })?;
        documents.push(text);
    }
    Ok(documents.join(DOCUMENT_SEPARATOR))
}

/// Replace `path` with `content` through a synced temporary file in the
/// same directory.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StreamError> {
    let io = |source: std::io::Error| StreamError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io)?;
    temp.write_all(content).map_err(io)?;
    temp.as_file().sync_all().map_err(io)?;
    temp.persist(path).map_err(|err| io(err.error))?;
    Ok(())
}

/// Drop build annotations from every resource. Returns how many were removed.
pub fn strip_build_annotations(resources: &mut [Resource]) -> usize {
    resources
        .iter_mut()
        .map(|resource| resource.remove_annotations(|key| key.starts_with(BUILD_ANNOTATION_PREFIX)))
        .sum()
}

pub fn is_local_config(resource: &Resource) -> bool {
    resource.annotation(LOCAL_CONFIG_ANNOTATION) == Some("true")
}

/// Remove resources marked as local configuration.
pub fn prune_local_config(resources: &mut Vec<Resource>) -> usize {
    let before = resources.len();
    resources.retain(|resource| !is_local_config(resource));
    before - resources.len()
}
