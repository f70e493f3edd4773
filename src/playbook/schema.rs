//! Playbook schema definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actions::ParamValue;

/// A playbook definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    /// Playbook name
    pub name: String,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Variable defaults
    #[serde(default, deserialize_with = "variables_as_text")]
    pub variables: BTreeMap<String, String>,

    /// Steps, executed in order
    pub steps: Vec<Step>,
}

/// A single step in a playbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step name
    pub name: String,

    /// Module (remote domain) the action belongs to
    pub module: String,

    /// Action (remote operation) to invoke
    pub action: String,

    /// Parameters, possibly containing `{{ variable }}` placeholders
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,

    /// Variable that receives the step's primary output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<String>,
}

impl Playbook {
    /// Names of all steps, in order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }
}

impl Step {
    /// `module.action` label used in logs and reports.
    pub fn target(&self) -> String {
        format!("{}.{}", self.module, self.action)
    }
}

/// Variable defaults may be written as numbers or booleans; keep their text.
fn variables_as_text<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, ParamValue>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| match value {
            ParamValue::Text(text) => Ok((name, text)),
            _ => Err(serde::de::Error::custom(format!(
                "variable '{name}' must be a single value"
            ))),
        })
        .collect()
}
