//! Distribution module: staking rewards and validator commission.

use serde::{Deserialize, Serialize};

use super::bank::{join_amounts, CoinAmount};
use super::{ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Params, PreparedCall};
use crate::client::{Operation, OperationArgs, QueryOperation, TxOperation};

pub struct WithdrawRewards {
    validator: String,
    commission: bool,
    from: String,
}

impl Operation for WithdrawRewards {
    const DOMAIN: &'static str = "distribution";
    const OPERATION: &'static str = "withdraw-rewards";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.validator).switch("commission", self.commission)
    }
}

impl TxOperation for WithdrawRewards {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct WithdrawAllRewards {
    max_msgs: Option<u64>,
    from: String,
}

impl Operation for WithdrawAllRewards {
    const DOMAIN: &'static str = "distribution";
    const OPERATION: &'static str = "withdraw-all-rewards";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().flag_opt("max-msgs", self.max_msgs.map(|n| n.to_string()))
    }
}

impl TxOperation for WithdrawAllRewards {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct SetWithdrawAddress {
    withdraw_address: String,
    from: String,
}

impl Operation for SetWithdrawAddress {
    const DOMAIN: &'static str = "distribution";
    const OPERATION: &'static str = "set-withdraw-addr";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.withdraw_address)
    }
}

impl TxOperation for SetWithdrawAddress {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct Rewards {
    delegator: String,
    validator: Option<String>,
}

/// Rewards of a delegator. With a validator filter the node returns only
/// `rewards` (a coin list); without it, per-validator entries plus `total`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RewardsResponse {
    #[serde(default)]
    pub rewards: Vec<serde_json::Value>,
    #[serde(default)]
    pub total: Vec<CoinAmount>,
}

impl Operation for Rewards {
    const DOMAIN: &'static str = "distribution";
    const OPERATION: &'static str = "rewards";

    fn args(&self) -> OperationArgs {
        let args = OperationArgs::new().arg(&self.delegator);
        match self.validator {
            Some(ref validator) => args.arg(validator),
            None => args,
        }
    }
}

impl QueryOperation for Rewards {
    type Response = RewardsResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        if !response.total.is_empty() {
            return Some(join_amounts(&response.total));
        }
        let coins: Vec<CoinAmount> = response
            .rewards
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect();
        Some(join_amounts(&coins))
    }
}

/// Commission payloads differ across node versions, so they pass through raw.
pub struct Commission {
    validator: String,
}

impl Operation for Commission {
    const DOMAIN: &'static str = "distribution";
    const OPERATION: &'static str = "commission";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.validator)
    }
}

impl QueryOperation for Commission {
    type Response = serde_json::Value;
}

fn withdraw_rewards(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = WithdrawRewards {
        validator: params.required_string("validator")?,
        commission: params.flag("commission")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn withdraw_all_rewards(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = WithdrawAllRewards {
        max_msgs: params.optional_u64("max_msgs")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    if request.max_msgs == Some(0) {
        return Err(ActionError::invalid("max_msgs", "must be at least 1"));
    }
    Ok(PreparedCall::submit(&request))
}

fn set_withdraw_address(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = SetWithdrawAddress {
        withdraw_address: params.required_string("withdraw_address")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn rewards(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Rewards {
        delegator: params.required_string("delegator")?,
        validator: params.optional_string("validator")?,
    };
    Ok(PreparedCall::query(&request))
}

fn commission(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Commission { validator: params.required_string("validator")? };
    Ok(PreparedCall::raw_query(&request))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::{Query, Transaction};

    registry.register(ActionSpec::new(
        "distribution",
        "withdraw-rewards",
        Transaction,
        "Withdraw rewards from one validator",
        &["validator"],
        &["from", "commission"],
        withdraw_rewards,
    ));
    registry.register(ActionSpec::new(
        "distribution",
        "withdraw-all-rewards",
        Transaction,
        "Withdraw rewards from every validator",
        &[],
        &["from", "max_msgs"],
        withdraw_all_rewards,
    ));
    registry.register(ActionSpec::new(
        "distribution",
        "set-withdraw-address",
        Transaction,
        "Change the address rewards are paid to",
        &["withdraw_address"],
        &["from"],
        set_withdraw_address,
    ));
    registry.register(ActionSpec::new(
        "distribution",
        "rewards",
        Query,
        "Outstanding rewards of a delegator",
        &["delegator"],
        &["validator"],
        rewards,
    ));
    registry.register(ActionSpec::new(
        "distribution",
        "commission",
        Query,
        "Outstanding commission of a validator",
        &["validator"],
        &[],
        commission,
    ));
}
