//! Bank module: transfers and balances.

use serde::{Deserialize, Serialize};

use super::{
    format_coins, ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Coin, Params,
    PreparedCall,
};
use crate::client::{Operation, OperationArgs, QueryOperation, TxOperation};

/// Coin as the node reports it (amounts are decimal strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinAmount {
    pub denom: String,
    pub amount: String,
}

impl CoinAmount {
    fn display(&self) -> String {
        format!("{}{}", self.amount, self.denom)
    }
}

/// Join reported coins the way the node prints them.
pub(super) fn join_amounts(coins: &[CoinAmount]) -> String {
    coins.iter().map(CoinAmount::display).collect::<Vec<_>>().join(",")
}

pub struct SendCoins {
    from: String,
    to: String,
    amount: Vec<Coin>,
    note: Option<String>,
}

impl Operation for SendCoins {
    const DOMAIN: &'static str = "bank";
    const OPERATION: &'static str = "send";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
            .arg(&self.from)
            .arg(&self.to)
            .arg(format_coins(&self.amount))
            .flag_opt("note", self.note.as_deref())
    }
}

impl TxOperation for SendCoins {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct MultiSend {
    from: String,
    to: Vec<String>,
    amount: Vec<Coin>,
    split: bool,
}

impl Operation for MultiSend {
    const DOMAIN: &'static str = "bank";
    const OPERATION: &'static str = "multi-send";

    fn args(&self) -> OperationArgs {
        let mut args = OperationArgs::new().arg(&self.from);
        for to in &self.to {
            args = args.arg(to);
        }
        args.arg(format_coins(&self.amount)).switch("split", self.split)
    }
}

impl TxOperation for MultiSend {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct Balances {
    address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalancesResponse {
    #[serde(default)]
    pub balances: Vec<CoinAmount>,
}

impl Operation for Balances {
    const DOMAIN: &'static str = "bank";
    const OPERATION: &'static str = "balances";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.address)
    }
}

impl QueryOperation for Balances {
    type Response = BalancesResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(join_amounts(&response.balances))
    }
}

pub struct Balance {
    address: String,
    denom: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: CoinAmount,
}

impl Operation for Balance {
    const DOMAIN: &'static str = "bank";
    const OPERATION: &'static str = "balance";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.address).arg(&self.denom)
    }
}

impl QueryOperation for Balance {
    type Response = BalanceResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.balance.amount.clone())
    }
}

pub struct TotalSupply;

#[derive(Debug, Serialize, Deserialize)]
pub struct SupplyResponse {
    #[serde(default)]
    pub supply: Vec<CoinAmount>,
}

impl Operation for TotalSupply {
    const DOMAIN: &'static str = "bank";
    const OPERATION: &'static str = "total-supply";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
    }
}

impl QueryOperation for TotalSupply {
    type Response = SupplyResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(join_amounts(&response.supply))
    }
}

fn send(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = SendCoins {
        to: params.required_string("to")?,
        amount: params.required_coins("amount")?,
        from: params.signer(env.default_signer.as_deref())?,
        note: params.optional_string("note")?,
    };
    Ok(PreparedCall::submit(&request))
}

fn multi_send(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = MultiSend {
        to: params.required_list("to")?,
        amount: params.required_coins("amount")?,
        from: params.signer(env.default_signer.as_deref())?,
        split: params.flag("split")?,
    };
    Ok(PreparedCall::submit(&request))
}

fn balances(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let address = params.required_string("address")?;
    // A denom narrows the query to the single-balance form.
    match params.optional_string("denom")? {
        Some(denom) => Ok(PreparedCall::query(&Balance { address, denom })),
        None => Ok(PreparedCall::query(&Balances { address })),
    }
}

fn balance(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Balance {
        address: params.required_string("address")?,
        denom: params.required_string("denom")?,
    };
    Ok(PreparedCall::query(&request))
}

fn total_supply(_params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    Ok(PreparedCall::query(&TotalSupply))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::{Query, Transaction};

    registry.register(ActionSpec::new(
        "bank",
        "send",
        Transaction,
        "Send coins from one account to another",
        &["to", "amount"],
        &["from", "note"],
        send,
    ));
    registry.register(ActionSpec::new(
        "bank",
        "multi-send",
        Transaction,
        "Send the same amount to several accounts",
        &["to", "amount"],
        &["from", "split"],
        multi_send,
    ));
    registry.register(ActionSpec::new(
        "bank",
        "balances",
        Query,
        "All balances of an account",
        &["address"],
        &["denom"],
        balances,
    ));
    registry.register(ActionSpec::new(
        "bank",
        "balance",
        Query,
        "Balance of one denomination",
        &["address", "denom"],
        &[],
        balance,
    ));
    registry.register(ActionSpec::new(
        "bank",
        "total-supply",
        Query,
        "Total supply of every denomination",
        &[],
        &[],
        total_supply,
    ));
}
