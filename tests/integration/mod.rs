//! End-to-end replacement runs over multi-document streams.

mod identity;
mod scenarios;

use krm_replacer::config::{ReplacementRule, Replacer, RuleReport};
use krm_replacer::stream::parse_stream;
use krm_replacer::{ApplicationError, ExtenderRegistry, Resource};

pub fn resources(yaml: &str) -> Vec<Resource> {
    parse_stream(yaml, None).unwrap()
}

pub fn rules(yaml: &str) -> Vec<ReplacementRule> {
    serde_yaml::from_str(yaml).unwrap()
}

pub fn run(docs: &mut [Resource], yaml: &str) -> Result<Vec<RuleReport>, ApplicationError> {
    let registry = ExtenderRegistry::builtin();
    Replacer::new(&registry).apply(docs, &rules(yaml))
}
