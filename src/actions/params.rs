//! Step parameters and conversions into native shapes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use super::ActionError;

/// A parameter value as written in a playbook.
///
/// Scalars are always text; YAML numbers and booleans are read in their
/// string form. Lists and maps nest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum ParamValue {
    Text(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Text(String::new()),
            serde_json::Value::Bool(b) => Self::Text(b.to_string()),
            serde_json::Value::Number(n) => Self::Text(n.to_string()),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => items.serialize(serializer),
            Self::Map(map) => map.serialize(serializer),
        }
    }
}

impl ParamValue {
    /// Get the text of a scalar value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON, keeping every leaf a string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// A coin amount such as `5ukex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Integer amount in the base denomination
    pub amount: u128,

    /// Denomination
    pub denom: String,
}

static COIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)([a-zA-Z][a-zA-Z0-9/:._-]{1,127})$").expect("valid regex"));

impl FromStr for Coin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = COIN_PATTERN
            .captures(s.trim())
            .ok_or_else(|| format!("'{s}' is not a coin amount like 100ukex"))?;
        let amount = caps[1].parse::<u128>().map_err(|e| format!("amount in '{s}': {e}"))?;
        Ok(Self { amount, denom: caps[2].to_string() })
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Render coins in the node's comma-separated form.
pub fn format_coins(coins: &[Coin]) -> String {
    coins.iter().map(Coin::to_string).collect::<Vec<_>>().join(",")
}

/// Resolved parameters handed to an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

impl Params {
    /// Wrap resolved values.
    pub fn new(values: BTreeMap<String, ParamValue>) -> Self {
        Self { values }
    }

    /// Build parameters from text pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new(pairs.into_iter().map(|(k, v)| (k.to_string(), ParamValue::from(v))).collect())
    }

    /// Raw access to a value.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Names of all parameters.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Optional text parameter. Empty text counts as absent.
    pub fn optional(&self, name: &str) -> Result<Option<&str>, ActionError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(ParamValue::Text(s)) => Ok(Some(s.trim())),
            Some(_) => Err(ActionError::invalid(name, "expected a single value")),
        }
    }

    /// Required text parameter.
    pub fn required(&self, name: &str) -> Result<&str, ActionError> {
        self.optional(name)?.ok_or_else(|| ActionError::MissingParameter(name.to_string()))
    }

    /// Optional owned text parameter.
    pub fn optional_string(&self, name: &str) -> Result<Option<String>, ActionError> {
        Ok(self.optional(name)?.map(str::to_string))
    }

    /// Required owned text parameter.
    pub fn required_string(&self, name: &str) -> Result<String, ActionError> {
        self.required(name).map(str::to_string)
    }

    /// Required unsigned integer.
    pub fn required_u64(&self, name: &str) -> Result<u64, ActionError> {
        parse_u64(name, self.required(name)?)
    }

    /// Optional unsigned integer.
    pub fn optional_u64(&self, name: &str) -> Result<Option<u64>, ActionError> {
        self.optional(name)?.map(|v| parse_u64(name, v)).transpose()
    }

    /// Optional boolean, `false` when absent.
    pub fn flag(&self, name: &str) -> Result<bool, ActionError> {
        match self.optional(name)? {
            None => Ok(false),
            Some(v) => parse_bool(name, v),
        }
    }

    /// Required single coin.
    pub fn required_coin(&self, name: &str) -> Result<Coin, ActionError> {
        let raw = self.required(name)?;
        raw.parse::<Coin>().map_err(|e| ActionError::invalid(name, e))
    }

    /// Required list of coins (`5ukex,3uatom` or a YAML list).
    pub fn required_coins(&self, name: &str) -> Result<Vec<Coin>, ActionError> {
        let coins = self.optional_coins(name)?;
        if coins.is_empty() {
            return Err(ActionError::MissingParameter(name.to_string()));
        }
        Ok(coins)
    }

    /// Optional list of coins.
    pub fn optional_coins(&self, name: &str) -> Result<Vec<Coin>, ActionError> {
        self.list(name)?
            .iter()
            .map(|raw| raw.parse::<Coin>().map_err(|e| ActionError::invalid(name, e)))
            .collect()
    }

    /// A list given either as comma-separated text or as a YAML list of
    /// scalars. Absent means empty.
    pub fn list(&self, name: &str) -> Result<Vec<String>, ActionError> {
        match self.values.get(name) {
            None => Ok(Vec::new()),
            Some(ParamValue::Text(s)) => Ok(split_list(s)),
            Some(ParamValue::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_text()
                        .map(|s| s.trim().to_string())
                        .ok_or_else(|| ActionError::invalid(name, "list items must be values"))
                })
                .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
                .collect(),
            Some(ParamValue::Map(_)) => Err(ActionError::invalid(name, "expected a list")),
        }
    }

    /// Required non-empty list.
    pub fn required_list(&self, name: &str) -> Result<Vec<String>, ActionError> {
        let items = self.list(name)?;
        if items.is_empty() {
            return Err(ActionError::MissingParameter(name.to_string()));
        }
        Ok(items)
    }

    /// Required JSON document, given as JSON text or as a nested map.
    pub fn required_json(&self, name: &str) -> Result<String, ActionError> {
        match self.values.get(name) {
            None => Err(ActionError::MissingParameter(name.to_string())),
            Some(ParamValue::Text(s)) if s.trim().is_empty() => {
                Err(ActionError::MissingParameter(name.to_string()))
            }
            Some(ParamValue::Text(s)) => {
                serde_json::from_str::<serde_json::Value>(s)
                    .map_err(|e| ActionError::invalid(name, format!("invalid JSON: {e}")))?;
                Ok(s.trim().to_string())
            }
            Some(value) => Ok(value.to_json().to_string()),
        }
    }

    /// Signer for a state change: the step's `from`, else the run default.
    pub fn signer(&self, default: Option<&str>) -> Result<String, ActionError> {
        self.optional("from")?
            .or(default)
            .map(str::to_string)
            .ok_or_else(|| ActionError::MissingParameter("from".to_string()))
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, ActionError> {
    raw.parse::<u64>().map_err(|e| ActionError::invalid(name, format!("'{raw}': {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ActionError> {
    match raw.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ActionError::invalid(name, format!("'{raw}' is not a boolean"))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}
