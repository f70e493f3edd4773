//! Variable substitution for step parameters.
//!
//! Placeholders have the form `{{ name }}`. Substitution is a single pass:
//! values inserted into a string are never scanned again, so a variable
//! whose value itself looks like a placeholder is inserted literally.
//! Every `{{ ... }}` span must hold a valid variable name; anything else
//! (`{{ }}`, `{{ 1x }}`, `{{ my var }}`) is an error. Single braces and
//! unclosed `{{` are plain text.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::actions::{ParamValue, Params};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid placeholder regex"));

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("valid variable name regex"));

/// Template resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder names a variable that is not in scope.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    /// A `{{ ... }}` span does not hold a valid variable name.
    #[error("invalid placeholder '{0}'")]
    InvalidPlaceholder(String),
}

/// Name to value scope threaded through a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VariableSet {
    values: BTreeMap<String, String>,
}

impl VariableSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from playbook defaults, then apply caller overrides on top.
    pub fn seeded(defaults: &BTreeMap<String, String>, overrides: &BTreeMap<String, String>) -> Self {
        let mut set = Self { values: defaults.clone() };
        set.values.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        set
    }

    /// Bind a value, replacing any previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of the current bindings.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }
}

/// Substitute every placeholder in `raw`.
pub fn resolve_str(raw: &str, vars: &VariableSet) -> Result<String, TemplateError> {
    let mut resolved = String::with_capacity(raw.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(raw) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = inner.as_str().trim();
        if !NAME.is_match(name) {
            return Err(TemplateError::InvalidPlaceholder(whole.as_str().to_string()));
        }
        let value =
            vars.get(name).ok_or_else(|| TemplateError::UndefinedVariable(name.to_string()))?;
        resolved.push_str(&raw[last..whole.start()]);
        resolved.push_str(value);
        last = whole.end();
    }

    resolved.push_str(&raw[last..]);
    Ok(resolved)
}

/// Substitute placeholders in every text leaf of a value.
pub fn resolve_value(value: &ParamValue, vars: &VariableSet) -> Result<ParamValue, TemplateError> {
    Ok(match value {
        ParamValue::Text(text) => ParamValue::Text(resolve_str(text, vars)?),
        ParamValue::List(items) => ParamValue::List(
            items.iter().map(|item| resolve_value(item, vars)).collect::<Result<_, _>>()?,
        ),
        ParamValue::Map(map) => ParamValue::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), resolve_value(v, vars)?)))
                .collect::<Result<_, TemplateError>>()?,
        ),
    })
}

/// Resolve a step's raw parameters into adapter input.
pub fn resolve_params(
    raw: &BTreeMap<String, ParamValue>,
    vars: &VariableSet,
) -> Result<Params, TemplateError> {
    let resolved = raw
        .iter()
        .map(|(name, value)| Ok((name.clone(), resolve_value(value, vars)?)))
        .collect::<Result<BTreeMap<_, _>, TemplateError>>()?;
    Ok(Params::new(resolved))
}

/// Names referenced by placeholders in `raw`, in order of appearance.
/// Malformed spans are returned trimmed, so they never match a binding.
pub fn placeholders(raw: &str) -> Vec<String> {
    PLACEHOLDER.captures_iter(raw).map(|caps| caps[1].trim().to_string()).collect()
}

/// Names referenced anywhere inside a value.
pub fn value_placeholders(value: &ParamValue) -> Vec<String> {
    match value {
        ParamValue::Text(text) => placeholders(text),
        ParamValue::List(items) => items.iter().flat_map(value_placeholders).collect(),
        ParamValue::Map(map) => map.values().flat_map(value_placeholders).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> VariableSet {
        let mut set = VariableSet::new();
        for (k, v) in pairs {
            set.set(*k, *v);
        }
        set
    }

    #[test]
    fn test_resolve_basic() {
        let set = vars(&[("amount", "5ukex"), ("to", "kex1b")]);

        assert_eq!(resolve_str("{{ amount }}", &set).unwrap(), "5ukex");
        assert_eq!(resolve_str("send {{amount}} to {{  to  }}!", &set).unwrap(), "send 5ukex to kex1b!");
    }

    #[test]
    fn test_undefined_variable() {
        let set = vars(&[("amount", "5ukex")]);

        assert_eq!(
            resolve_str("{{ amount }} {{ unset }}", &set).unwrap_err(),
            TemplateError::UndefinedVariable("unset".to_string())
        );
    }

    #[test]
    fn test_single_pass() {
        let set = vars(&[("a", "{{ b }}"), ("b", "never")]);
        assert_eq!(resolve_str("{{ a }}", &set).unwrap(), "{{ b }}");
    }

    #[test]
    fn test_idempotent_without_placeholders() {
        let set = vars(&[("amount", "5ukex")]);
        let once = resolve_str("pay {{ amount }} now", &set).unwrap();
        let twice = resolve_str(&once, &set).unwrap();

        assert_eq!(once, twice);
        assert_eq!(resolve_str("plain text", &VariableSet::new()).unwrap(), "plain text");
    }

    #[test]
    fn test_malformed_placeholders_are_errors() {
        let set = vars(&[("amount", "5ukex"), ("my", "x")]);
        let malformed =
            ["{{ }}", "{{ 1x }}", "{{ 2nd_key }}", "{{ my var }}", "{{ amount! }}", "{{ Ämount }}"];
        for raw in malformed {
            assert_eq!(
                resolve_str(&format!("pay {raw}"), &set),
                Err(TemplateError::InvalidPlaceholder(raw.to_string())),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_single_braces_stay_literal() {
        let set = vars(&[("amount", "5ukex")]);
        for raw in ["{ amount }", "{{amount", "amount }}", r#"{"count":{}}"#] {
            assert_eq!(resolve_str(raw, &set).unwrap(), raw);
        }
    }

    #[test]
    fn test_dotted_names() {
        let set = vars(&[("key.address", "kex1a")]);
        assert_eq!(resolve_str("{{ key.address }}", &set).unwrap(), "kex1a");
    }

    #[test]
    fn test_resolve_nested_value() {
        let set = vars(&[("to", "kex1r")]);
        let mut inner = BTreeMap::new();
        inner.insert("recipient".to_string(), ParamValue::from("{{ to }}"));
        let value = ParamValue::List(vec![ParamValue::Map(inner), ParamValue::from("x")]);

        let resolved = resolve_value(&value, &set).unwrap();
        assert_eq!(resolved.to_json(), serde_json::json!([{"recipient": "kex1r"}, "x"]));
        assert_eq!(value_placeholders(&value), vec!["to"]);
    }

    #[test]
    fn test_seeded_overrides_win() {
        let defaults = BTreeMap::from([("amount".to_string(), "5ukex".to_string())]);
        let overrides = BTreeMap::from([("amount".to_string(), "10ukex".to_string())]);

        let set = VariableSet::seeded(&defaults, &overrides);
        assert_eq!(set.get("amount"), Some("10ukex"));
        assert_eq!(VariableSet::seeded(&defaults, &BTreeMap::new()).get("amount"), Some("5ukex"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders("{{ a }} and {{b}} and {{ a }}"), vec!["a", "b", "a"]);
        assert!(placeholders("none here").is_empty());
    }
}
