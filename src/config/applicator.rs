//! Replacement orchestrator - runs replacement rules over a set of resources
//!
//! For every rule, in order:
//! - Selects exactly one source resource by current or previous identity
//! - Reads the source field and refines it (delimiter split or encoding)
//! - Matches target resources by identity, labels and annotations
//! - Resolves each target field path, creating fields when asked to
//! - Writes the value, tunnelling through extension segments when present
//!
//! Later rules observe the changes made by earlier ones. A failing rule stops
//! the run; changes already committed by earlier fields are kept.

use crate::config::refine::{refine_source, splice_delimited, RefineError};
use crate::config::schema::{
    FieldOptions, ReplacementRule, ResourceSelector, SourceSelector, TargetSelector,
};
use crate::error::ErrorKind;
use crate::extender::{apply_to_field, ApplyError, ExtenderRegistry};
use crate::path::{
    get_at, get_at_mut, is_scalar, lookup_or_create, resolve, resolve_one, scalar_text,
    ExtendedPath, NodeKind, PathError, PathSegment,
};
use crate::resource::{IdentityError, ResId, Resource, Selector, SelectorError};
use serde_yaml::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Why a rule failed.
#[derive(Error, Debug)]
pub enum FailureCause {
    #[error("replacements must specify a source")]
    MissingSource,

    #[error("replacements must specify at least one target")]
    MissingTargets,

    #[error("target must specify resources to select")]
    MissingSelect,

    #[error("cannot compute identifiers of {resource}: {source}")]
    Identity {
        resource: String,
        #[source]
        source: IdentityError,
    },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("nothing selected by {selector}")]
    SourceNotFound { selector: String },

    #[error("{count} resources selected by {selector}, expected exactly one")]
    AmbiguousSource { selector: String, count: usize },

    #[error("source field path '{field_path}' cannot contain extensions")]
    ExtendedSource { field_path: String },

    #[error("fieldPath '{field_path}' is missing for replacement source {selector}")]
    SourceFieldMissing {
        selector: String,
        field_path: String,
    },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Refine(#[from] RefineError),

    #[error("the create option cannot be used with a wildcard path")]
    WildcardCreate,

    #[error("the delimiter option cannot be used with extensions")]
    DelimiterWithExtensions,

    #[error("the delimiter option can only be used with scalar values")]
    DelimiterOnCollection,

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl FailureCause {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailureCause::MissingSource
            | FailureCause::MissingTargets
            | FailureCause::Identity { .. }
            | FailureCause::Selector(_)
            | FailureCause::ExtendedSource { .. } => ErrorKind::Parse,
            FailureCause::MissingSelect
            | FailureCause::SourceNotFound { .. }
            | FailureCause::AmbiguousSource { .. }
            | FailureCause::SourceFieldMissing { .. } => ErrorKind::Selection,
            FailureCause::Path(err) => err.kind(),
            FailureCause::Refine(RefineError::IndexOutOfRange { .. }) => ErrorKind::Path,
            FailureCause::Refine(RefineError::NotScalar { .. }) => ErrorKind::OptionConflict,
            FailureCause::Refine(RefineError::Bcrypt(_)) => ErrorKind::Parse,
            FailureCause::WildcardCreate => ErrorKind::Creation,
            FailureCause::DelimiterWithExtensions | FailureCause::DelimiterOnCollection => {
                ErrorKind::OptionConflict
            }
            FailureCause::Apply(err) => err.kind(),
        }
    }
}

fn location(target: &Option<String>, field_path: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(target) = target {
        out.push_str(&format!(", target {target}"));
    }
    if let Some(field_path) = field_path {
        out.push_str(&format!(", field '{field_path}'"));
    }
    out
}

/// A rule failure with the configuration it happened in.
#[derive(Error, Debug)]
#[error("replacement #{rule}{}: {cause}", location(.target, .field_path))]
pub struct ApplicationError {
    pub rule: usize,
    pub target: Option<String>,
    pub field_path: Option<String>,
    #[source]
    pub cause: FailureCause,
}

impl ApplicationError {
    fn new(rule: usize, cause: impl Into<FailureCause>) -> Self {
        Self {
            rule,
            target: None,
            field_path: None,
            cause: cause.into(),
        }
    }

    fn at_target(mut self, target: &TargetSelector) -> Self {
        self.target = Some(target.to_string());
        self
    }

    fn at_field(mut self, field_path: &str) -> Self {
        self.field_path = Some(field_path.to_string());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }
}

/// What one rule did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule: usize,
    pub source: ResId,
    pub targets: usize,
    pub fields: usize,
}

impl fmt::Display for RuleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "replacement #{} from {}: {} field(s) in {} resource(s)",
            self.rule, self.source, self.fields, self.targets
        )
    }
}

/// Runs replacement rules with a codec registry and an optional alternate
/// source list.
#[derive(Debug, Clone, Copy)]
pub struct Replacer<'a> {
    registry: &'a ExtenderRegistry,
    sources: Option<&'a [Resource]>,
}

struct CompiledSelector<'s> {
    selector: &'s ResourceSelector,
    labels: Selector,
    annotations: Selector,
}

impl<'s> CompiledSelector<'s> {
    fn compile(selector: &'s ResourceSelector) -> Result<Self, SelectorError> {
        Ok(Self {
            selector,
            labels: Selector::parse(selector.label_selector().unwrap_or(""))?,
            annotations: Selector::parse(selector.annotation_selector().unwrap_or(""))?,
        })
    }

    fn metadata_matches(&self, resource: &Resource) -> bool {
        self.labels.matches(&resource.labels())
            && self.annotations.matches(&resource.annotations())
    }
}

impl<'a> Replacer<'a> {
    pub fn new(registry: &'a ExtenderRegistry) -> Self {
        Self {
            registry,
            sources: None,
        }
    }

    /// Select sources from `sources` instead of the resources being changed.
    pub fn with_sources(mut self, sources: &'a [Resource]) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Run every rule in order.
    pub fn apply(
        &self,
        resources: &mut [Resource],
        rules: &[ReplacementRule],
    ) -> Result<Vec<RuleReport>, ApplicationError> {
        let mut reports = Vec::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            let report = self.apply_rule(index, rule, resources)?;
            info!(
                rule = index,
                source = %report.source,
                targets = report.targets,
                fields = report.fields,
                "replacement applied"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    pub fn apply_rule(
        &self,
        index: usize,
        rule: &ReplacementRule,
        resources: &mut [Resource],
    ) -> Result<RuleReport, ApplicationError> {
        let source = rule
            .source
            .as_ref()
            .ok_or_else(|| ApplicationError::new(index, FailureCause::MissingSource))?;
        if rule.targets.is_empty() {
            return Err(ApplicationError::new(index, FailureCause::MissingTargets));
        }

        let (source_id, value) = {
            let candidates: &[Resource] = match self.sources {
                Some(sources) => sources,
                None => &*resources,
            };
            let resource = select_source(candidates, source)
                .map_err(|cause| ApplicationError::new(index, cause))?;
            let value = source_value(resource, source)
                .map_err(|cause| ApplicationError::new(index, cause).at_field(source.field_path()))?;
            (resource.id(), value)
        };
        debug!(rule = index, source = %source_id, "source selected");

        let mut report = RuleReport {
            rule: index,
            source: source_id,
            targets: 0,
            fields: 0,
        };

        for target in &rule.targets {
            let fail = |cause: FailureCause| ApplicationError::new(index, cause).at_target(target);
            let select = target
                .select
                .as_ref()
                .ok_or_else(|| fail(FailureCause::MissingSelect))?;
            let select = CompiledSelector::compile(select).map_err(|err| fail(err.into()))?;
            let rejects = target
                .reject
                .iter()
                .map(CompiledSelector::compile)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| fail(err.into()))?;
            let options = target.options();

            for resource in resources.iter_mut() {
                if !is_target(resource, &select, &rejects).map_err(fail)? {
                    continue;
                }
                debug!(rule = index, resource = %resource.id(), "target matched");
                report.targets += 1;
                for field_path in target.field_paths() {
                    report.fields += self
                        .write_field(resource, field_path, &value, &options)
                        .map_err(|cause| fail(cause).at_field(field_path))?;
                }
            }
        }

        Ok(report)
    }

    /// Write `value` at `field_path` of `resource`, returning how many fields
    /// were written. The resource is left untouched when anything fails.
    fn write_field(
        &self,
        resource: &mut Resource,
        field_path: &str,
        value: &Value,
        options: &FieldOptions,
    ) -> Result<usize, FailureCause> {
        let path = ExtendedPath::parse(field_path)?;
        if options.has_delimiter() && path.has_extensions() {
            return Err(FailureCause::DelimiterWithExtensions);
        }
        let segments = path.resource_segments()?;
        let shown = path.to_string();

        let mut working = resource.root().clone();
        let written = if options.create {
            if segments.iter().any(PathSegment::is_wildcard) {
                return Err(FailureCause::WildcardCreate);
            }
            let field = lookup_or_create(&mut working, &segments, NodeKind::of(value))?;
            self.set_field(field, &path, &shown, value, options)?;
            1
        } else {
            let locations = resolve(&working, &segments);
            for location in &locations {
                if let Some(field) = get_at_mut(&mut working, location) {
                    self.set_field(field, &path, &shown, value, options)?;
                }
            }
            locations.len()
        };

        debug!(
            resource = %resource.id(),
            field = %shown,
            count = written,
            "field written"
        );
        *resource.root_mut() = working;
        Ok(written)
    }

    fn set_field(
        &self,
        field: &mut Value,
        path: &ExtendedPath,
        shown: &str,
        value: &Value,
        options: &FieldOptions,
    ) -> Result<(), FailureCause> {
        let value = match options.delimiter() {
            Some(delimiter) => {
                let current = scalar_text(field).ok_or(FailureCause::DelimiterOnCollection)?;
                let text = scalar_text(value).ok_or(FailureCause::DelimiterOnCollection)?;
                Value::String(splice_delimited(&current, &text, delimiter, options.index))
            }
            None => value.clone(),
        };

        if is_scalar(field) {
            apply_to_field(self.registry, field, shown, &path.segments, &value)?;
        } else if path.has_extensions() {
            return Err(ApplyError::NotScalar {
                path: shown.to_string(),
            }
            .into());
        } else {
            *field = value;
        }
        Ok(())
    }
}

fn identifiers(resource: &Resource) -> Result<Vec<ResId>, FailureCause> {
    resource
        .identifiers()
        .map_err(|source| FailureCause::Identity {
            resource: resource.id().to_string(),
            source,
        })
}

fn select_source<'r>(
    candidates: &'r [Resource],
    source: &SourceSelector,
) -> Result<&'r Resource, FailureCause> {
    let mut matches = Vec::new();
    for candidate in candidates {
        if identifiers(candidate)?
            .iter()
            .any(|id| id.is_selected_by(&source.id))
        {
            matches.push(candidate);
        }
    }
    match matches.as_slice() {
        [resource] => Ok(*resource),
        [] => Err(FailureCause::SourceNotFound {
            selector: source.to_string(),
        }),
        many => Err(FailureCause::AmbiguousSource {
            selector: source.to_string(),
            count: many.len(),
        }),
    }
}

fn source_value(resource: &Resource, source: &SourceSelector) -> Result<Value, FailureCause> {
    let field_path = source.field_path();
    let path = ExtendedPath::parse(field_path)?;
    if path.has_extensions() {
        return Err(FailureCause::ExtendedSource {
            field_path: field_path.to_string(),
        });
    }
    let segments = path.resource_segments()?;
    let missing = || FailureCause::SourceFieldMissing {
        selector: source.to_string(),
        field_path: field_path.to_string(),
    };

    let location = match resolve_one(resource.root(), &segments) {
        Ok(location) => location,
        Err(PathError::NotFound { .. }) => return Err(missing()),
        Err(err) => return Err(err.into()),
    };
    let value = get_at(resource.root(), &location)
        .filter(|value| !value.is_null())
        .ok_or_else(missing)?;

    Ok(refine_source(value, source.options.as_ref())?)
}

fn is_target(
    resource: &Resource,
    select: &CompiledSelector<'_>,
    rejects: &[CompiledSelector<'_>],
) -> Result<bool, FailureCause> {
    let ids = identifiers(resource)?;

    for reject in rejects {
        let by_id = !reject.selector.id.is_empty()
            && ids.iter().any(|id| id.is_selected_by(&reject.selector.id));
        let by_metadata =
            reject.selector.has_metadata_selectors() && reject.metadata_matches(resource);
        if by_id || by_metadata {
            return Ok(false);
        }
    }

    Ok(select.metadata_matches(resource)
        && ids.iter().any(|id| id.is_selected_by(&select.selector.id)))
}
