//! Auth module: accounts and transaction lookup.

use serde::{Deserialize, Serialize};

use super::{ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Params, PreparedCall};
use crate::client::{Operation, OperationArgs, QueryOperation, TxResponse};

/// Account payload. Account types vary (base, module, vesting), so the
/// body is kept whole and only the account number is extracted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountResponse(pub serde_json::Value);

impl AccountResponse {
    const NUMBER_PATHS: [&'static str; 4] = [
        "/account/account_number",
        "/account/base_account/account_number",
        "/account/base_vesting_account/base_account/account_number",
        "/account_number",
    ];

    /// The account number, wherever this account type keeps it.
    pub fn account_number(&self) -> Option<String> {
        Self::NUMBER_PATHS.iter().find_map(|path| match self.0.pointer(path)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

pub struct Account {
    address: String,
}

impl Operation for Account {
    const DOMAIN: &'static str = "auth";
    const OPERATION: &'static str = "account";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.address)
    }
}

impl QueryOperation for Account {
    type Response = AccountResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        response.account_number()
    }
}

/// Lookup of an included transaction by hash.
pub struct TxLookup {
    hash: String,
}

impl Operation for TxLookup {
    // The node serves tx lookup from the top-level query group.
    const DOMAIN: &'static str = "tx";
    const OPERATION: &'static str = "tx";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.hash)
    }
}

impl QueryOperation for TxLookup {
    type Response = TxResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.height.clone())
    }
}

fn account(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Account { address: params.required_string("address")? };
    Ok(PreparedCall::query(&request))
}

fn tx(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let hash = params.required("hash")?;
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ActionError::invalid("hash", format!("'{hash}' is not a hex digest")));
    }
    Ok(PreparedCall::query(&TxLookup { hash: hash.to_uppercase() }))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::Query;

    registry.register(ActionSpec::new(
        "auth",
        "account",
        Query,
        "Account details of an address",
        &["address"],
        &[],
        account,
    ));
    registry.register(ActionSpec::new(
        "auth",
        "tx",
        Query,
        "Look up a transaction by hash",
        &["hash"],
        &[],
        tx,
    ));
}
