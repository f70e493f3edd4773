//! Slashing module.

use super::{ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Params, PreparedCall};
use crate::client::{Operation, OperationArgs, QueryOperation, TxOperation};

pub struct Unjail {
    from: String,
}

impl Operation for Unjail {
    const DOMAIN: &'static str = "slashing";
    const OPERATION: &'static str = "unjail";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
    }
}

impl TxOperation for Unjail {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct SigningInfo {
    pubkey: String,
}

impl Operation for SigningInfo {
    const DOMAIN: &'static str = "slashing";
    const OPERATION: &'static str = "signing-info";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.pubkey)
    }
}

impl QueryOperation for SigningInfo {
    type Response = serde_json::Value;
}

fn unjail(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Unjail { from: params.signer(env.default_signer.as_deref())? };
    Ok(PreparedCall::submit(&request))
}

fn signing_info(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = SigningInfo { pubkey: params.required_json("pubkey")? };
    Ok(PreparedCall::raw_query(&request))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::{Query, Transaction};

    registry.register(ActionSpec::new(
        "slashing",
        "unjail",
        Transaction,
        "Unjail the signing validator",
        &[],
        &["from"],
        unjail,
    ));
    registry.register(ActionSpec::new(
        "slashing",
        "signing-info",
        Query,
        "Signing info of a validator consensus key",
        &["pubkey"],
        &[],
        signing_info,
    ));
}
