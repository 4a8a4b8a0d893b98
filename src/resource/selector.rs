//! Label and annotation selectors in the Kubernetes syntax.
//!
//! `app=web,tier!=db,env in (prod,staging),!legacy`

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid selector '{selector}': {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Exists(String),
    NotExists(String),
    Equals(String, String),
    NotEquals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
}

impl Requirement {
    pub fn matches(&self, map: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Exists(key) => map.contains_key(key),
            Requirement::NotExists(key) => !map.contains_key(key),
            Requirement::Equals(key, value) => map.get(key) == Some(value),
            Requirement::NotEquals(key, value) => map.get(key) != Some(value),
            Requirement::In(key, values) => map.get(key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn(key, values) => !map.get(key).is_some_and(|v| values.contains(v)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Exists(key) => write!(f, "{key}"),
            Requirement::NotExists(key) => write!(f, "!{key}"),
            Requirement::Equals(key, value) => write!(f, "{key}={value}"),
            Requirement::NotEquals(key, value) => write!(f, "{key}!={value}"),
            Requirement::In(key, values) => write!(f, "{key} in ({})", values.join(",")),
            Requirement::NotIn(key, values) => write!(f, "{key} notin ({})", values.join(",")),
        }
    }
}

/// Conjunction of requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let error = |message: String| SelectorError {
            selector: input.to_string(),
            message,
        };

        if input.trim().is_empty() {
            return Ok(Self::default());
        }

        let requirements = split_requirements(input)
            .map_err(error)?
            .into_iter()
            .map(|part| parse_requirement(part).map_err(error))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, map: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(map))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Split on commas outside parentheses.
fn split_requirements(input: &str) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in input.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced ')'".to_string())?;
            }
            ',' if depth == 0 => {
                parts.push(input[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unterminated '('".to_string());
    }
    parts.push(input[start..].trim());

    if parts.iter().any(|p| p.is_empty()) {
        return Err("empty requirement".to_string());
    }
    Ok(parts)
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

fn valid_value(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn checked_key(key: &str) -> Result<String, String> {
    let key = key.trim();
    if valid_key(key) {
        Ok(key.to_string())
    } else {
        Err(format!("invalid key '{key}'"))
    }
}

fn checked_value(value: &str) -> Result<String, String> {
    let value = value.trim();
    if valid_value(value) {
        Ok(value.to_string())
    } else {
        Err(format!("invalid value '{value}'"))
    }
}

fn parse_requirement(part: &str) -> Result<Requirement, String> {
    if let Some(key) = part.strip_prefix('!') {
        return checked_key(key).map(Requirement::NotExists);
    }

    if let Some(open) = part.find('(') {
        let inner = part[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| format!("expected ')' at the end of '{part}'"))?;
        let values = inner
            .split(',')
            .map(checked_value)
            .collect::<Result<Vec<_>, _>>()?;
        let head: Vec<&str> = part[..open].split_whitespace().collect();
        return match head.as_slice() {
            [key, "in"] => Ok(Requirement::In(checked_key(key)?, values)),
            [key, "notin"] => Ok(Requirement::NotIn(checked_key(key)?, values)),
            _ => Err(format!("expected 'key in (...)' or 'key notin (...)', got '{part}'")),
        };
    }

    if let Some((key, value)) = part.split_once("!=") {
        return Ok(Requirement::NotEquals(checked_key(key)?, checked_value(value)?));
    }
    if let Some((key, value)) = part.split_once("==") {
        return Ok(Requirement::Equals(checked_key(key)?, checked_value(value)?));
    }
    if let Some((key, value)) = part.split_once('=') {
        return Ok(Requirement::Equals(checked_key(key)?, checked_value(value)?));
    }

    checked_key(part).map(Requirement::Exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
        let selector = Selector::parse("").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
    }

    #[test]
    fn equality_and_inequality() {
        let selector = Selector::parse("app=web,tier!=db").unwrap();
        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "front")])));
        assert!(selector.matches(&labels(&[("app", "web")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "db")])));
        assert!(!selector.matches(&labels(&[("app", "api")])));
    }

    #[test]
    fn set_based_requirements() {
        let selector = Selector::parse("env in (prod, staging),zone notin (eu)").unwrap();
        assert_eq!(selector.requirements().len(), 2);
        assert!(selector.matches(&labels(&[("env", "prod"), ("zone", "us")])));
        assert!(!selector.matches(&labels(&[("env", "dev")])));
        assert!(!selector.matches(&labels(&[("env", "staging"), ("zone", "eu")])));
    }

    #[test]
    fn existence_requirements() {
        let selector = Selector::parse("config.kubernetes.io/local-config,!legacy").unwrap();
        assert!(selector.matches(&labels(&[("config.kubernetes.io/local-config", "true")])));
        assert!(!selector.matches(&labels(&[
            ("config.kubernetes.io/local-config", "true"),
            ("legacy", "")
        ])));
    }

    #[test]
    fn double_equals_is_equality() {
        let selector = Selector::parse("app==web").unwrap();
        assert_eq!(selector.to_string(), "app=web");
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        assert!(Selector::parse("app=web,").is_err());
        assert!(Selector::parse("env in (prod").is_err());
        assert!(Selector::parse("env within (prod)").is_err());
        assert!(Selector::parse("=web").is_err());
    }
}
