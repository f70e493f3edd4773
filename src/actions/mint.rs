//! Mint module queries.

use serde::{Deserialize, Serialize};

use super::{ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Params, PreparedCall};
use crate::client::{Operation, OperationArgs, QueryOperation};

/// A decimal the node prints either bare or wrapped in an object.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecimalResponse {
    Inflation { inflation: String },
    AnnualProvisions { annual_provisions: String },
    Bare(String),
}

impl DecimalResponse {
    fn value(&self) -> &str {
        match self {
            Self::Inflation { inflation: v }
            | Self::AnnualProvisions { annual_provisions: v }
            | Self::Bare(v) => v,
        }
    }
}

pub struct Inflation;

impl Operation for Inflation {
    const DOMAIN: &'static str = "mint";
    const OPERATION: &'static str = "inflation";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
    }
}

impl QueryOperation for Inflation {
    type Response = DecimalResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.value().to_string())
    }
}

pub struct AnnualProvisions;

impl Operation for AnnualProvisions {
    const DOMAIN: &'static str = "mint";
    const OPERATION: &'static str = "annual-provisions";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
    }
}

impl QueryOperation for AnnualProvisions {
    type Response = DecimalResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.value().to_string())
    }
}

fn inflation(_params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    Ok(PreparedCall::query(&Inflation))
}

fn annual_provisions(_params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    Ok(PreparedCall::query(&AnnualProvisions))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::Query;

    registry.register(ActionSpec::new(
        "mint",
        "inflation",
        Query,
        "Current inflation rate",
        &[],
        &[],
        inflation,
    ));
    registry.register(ActionSpec::new(
        "mint",
        "annual-provisions",
        Query,
        "Current annual provisions",
        &[],
        &[],
        annual_provisions,
    ));
}
