//! Staking module: delegation lifecycle and validator queries.

use serde::{Deserialize, Serialize};

use super::bank::CoinAmount;
use super::{
    ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Coin, Params, PreparedCall,
};
use crate::client::{Operation, OperationArgs, QueryOperation, TxOperation};

pub struct Delegate {
    validator: String,
    amount: Coin,
    from: String,
}

impl Operation for Delegate {
    const DOMAIN: &'static str = "staking";
    const OPERATION: &'static str = "delegate";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.validator).arg(self.amount.to_string())
    }
}

impl TxOperation for Delegate {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct Unbond {
    validator: String,
    amount: Coin,
    from: String,
}

impl Operation for Unbond {
    const DOMAIN: &'static str = "staking";
    const OPERATION: &'static str = "unbond";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.validator).arg(self.amount.to_string())
    }
}

impl TxOperation for Unbond {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct Redelegate {
    src_validator: String,
    dst_validator: String,
    amount: Coin,
    from: String,
}

impl Operation for Redelegate {
    const DOMAIN: &'static str = "staking";
    const OPERATION: &'static str = "redelegate";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
            .arg(&self.src_validator)
            .arg(&self.dst_validator)
            .arg(self.amount.to_string())
    }
}

impl TxOperation for Redelegate {
    fn signer(&self) -> &str {
        &self.from
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorDescription {
    pub moniker: String,
    pub identity: String,
    pub website: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    pub operator_address: String,
    #[serde(default)]
    pub jailed: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tokens: String,
    #[serde(default)]
    pub delegator_shares: String,
    #[serde(default)]
    pub description: ValidatorDescription,
}

/// Newer nodes wrap single records, older ones do not.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidatorResponse {
    Wrapped { validator: Validator },
    Bare(Validator),
}

impl ValidatorResponse {
    fn validator(&self) -> &Validator {
        match self {
            Self::Wrapped { validator } | Self::Bare(validator) => validator,
        }
    }
}

pub struct ValidatorQuery {
    validator: String,
}

impl Operation for ValidatorQuery {
    const DOMAIN: &'static str = "staking";
    const OPERATION: &'static str = "validator";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.validator)
    }
}

impl QueryOperation for ValidatorQuery {
    type Response = ValidatorResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.validator().status.clone())
    }
}

pub struct Validators {
    status: Option<String>,
    limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidatorsResponse {
    #[serde(default)]
    pub validators: Vec<Validator>,
}

impl Operation for Validators {
    const DOMAIN: &'static str = "staking";
    const OPERATION: &'static str = "validators";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
            .flag_opt("status", self.status.as_deref())
            .flag_opt("limit", self.limit.map(|l| l.to_string()))
    }
}

impl QueryOperation for Validators {
    type Response = ValidatorsResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(
            response
                .validators
                .iter()
                .map(|v| v.operator_address.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator_address: String,
    pub validator_address: String,
    #[serde(default)]
    pub shares: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationEntry {
    pub delegation: Delegation,
    pub balance: CoinAmount,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelegationResponse {
    Wrapped { delegation_response: DelegationEntry },
    Bare(DelegationEntry),
}

pub struct DelegationQuery {
    delegator: String,
    validator: String,
}

impl Operation for DelegationQuery {
    const DOMAIN: &'static str = "staking";
    const OPERATION: &'static str = "delegation";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.delegator).arg(&self.validator)
    }
}

impl QueryOperation for DelegationQuery {
    type Response = DelegationResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        let entry = match response {
            DelegationResponse::Wrapped { delegation_response } => delegation_response,
            DelegationResponse::Bare(entry) => entry,
        };
        Some(entry.balance.amount.clone())
    }
}

pub struct Delegations {
    delegator: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DelegationsResponse {
    #[serde(default)]
    pub delegation_responses: Vec<DelegationEntry>,
}

impl Operation for Delegations {
    const DOMAIN: &'static str = "staking";
    const OPERATION: &'static str = "delegations";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.delegator)
    }
}

impl QueryOperation for Delegations {
    type Response = DelegationsResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(
            response
                .delegation_responses
                .iter()
                .map(|d| d.delegation.validator_address.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

fn delegate(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Delegate {
        validator: params.required_string("validator")?,
        amount: params.required_coin("amount")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn unbond(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Unbond {
        validator: params.required_string("validator")?,
        amount: params.required_coin("amount")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn redelegate(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Redelegate {
        src_validator: params.required_string("src_validator")?,
        dst_validator: params.required_string("dst_validator")?,
        amount: params.required_coin("amount")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    if request.src_validator == request.dst_validator {
        return Err(ActionError::invalid("dst_validator", "must differ from src_validator"));
    }
    Ok(PreparedCall::submit(&request))
}

fn validators(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let status = match params.optional("status")? {
        None => None,
        Some(s @ ("bonded" | "unbonded" | "unbonding")) => Some(s.to_string()),
        Some(other) => {
            return Err(ActionError::invalid(
                "status",
                format!("'{other}' is not one of bonded, unbonded, unbonding"),
            ))
        }
    };
    let request = Validators { status, limit: params.optional_u64("limit")? };
    Ok(PreparedCall::query(&request))
}

fn validator(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = ValidatorQuery { validator: params.required_string("validator")? };
    Ok(PreparedCall::query(&request))
}

fn delegations(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Delegations { delegator: params.required_string("delegator")? };
    Ok(PreparedCall::query(&request))
}

fn delegation(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = DelegationQuery {
        delegator: params.required_string("delegator")?,
        validator: params.required_string("validator")?,
    };
    Ok(PreparedCall::query(&request))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::{Query, Transaction};

    registry.register(ActionSpec::new(
        "staking",
        "delegate",
        Transaction,
        "Delegate tokens to a validator",
        &["validator", "amount"],
        &["from"],
        delegate,
    ));
    registry.register(ActionSpec::new(
        "staking",
        "unbond",
        Transaction,
        "Unbond tokens from a validator",
        &["validator", "amount"],
        &["from"],
        unbond,
    ));
    registry.register(ActionSpec::new(
        "staking",
        "redelegate",
        Transaction,
        "Move a delegation between validators",
        &["src_validator", "dst_validator", "amount"],
        &["from"],
        redelegate,
    ));
    registry.register(ActionSpec::new(
        "staking",
        "validators",
        Query,
        "List validators",
        &[],
        &["status", "limit"],
        validators,
    ));
    registry.register(ActionSpec::new(
        "staking",
        "validator",
        Query,
        "Show one validator",
        &["validator"],
        &[],
        validator,
    ));
    registry.register(ActionSpec::new(
        "staking",
        "delegations",
        Query,
        "All delegations of a delegator",
        &["delegator"],
        &[],
        delegations,
    ));
    registry.register(ActionSpec::new(
        "staking",
        "delegation",
        Query,
        "One delegation between a delegator and a validator",
        &["delegator", "validator"],
        &[],
        delegation,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redelegate_to_same_validator_is_invalid() {
        let params = Params::from_pairs([
            ("src_validator", "kexvaloper1a"),
            ("dst_validator", "kexvaloper1a"),
            ("amount", "1ukex"),
            ("from", "alice"),
        ]);

        assert!(matches!(
            redelegate(&params, &ActionEnv::default()),
            Err(ActionError::InvalidParameter { ref name, .. }) if name == "dst_validator"
        ));
    }

    #[test]
    fn test_delegate_takes_single_coin() {
        let params = Params::from_pairs([
            ("validator", "kexvaloper1a"),
            ("amount", "1ukex,2uatom"),
            ("from", "alice"),
        ]);

        assert!(matches!(
            delegate(&params, &ActionEnv::default()),
            Err(ActionError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_validators_status_filter() {
        let params = Params::from_pairs([("status", "bonded"), ("limit", "5")]);
        let call = validators(&params, &ActionEnv::default()).unwrap();
        assert_eq!(call.args.render(), "--limit=5 --status=bonded");

        let bad = Params::from_pairs([("status", "sleepy")]);
        assert!(validators(&bad, &ActionEnv::default()).is_err());
    }

    #[test]
    fn test_validator_response_both_shapes() {
        let wrapped: ValidatorResponse = serde_json::from_value(serde_json::json!({
            "validator": {"operator_address": "kexvaloper1a", "status": "BOND_STATUS_BONDED"}
        }))
        .unwrap();
        assert_eq!(ValidatorQuery::primary(&wrapped).as_deref(), Some("BOND_STATUS_BONDED"));

        let bare: ValidatorResponse = serde_json::from_value(serde_json::json!({
            "operator_address": "kexvaloper1b", "jailed": true
        }))
        .unwrap();
        assert!(bare.validator().jailed);
    }
}
