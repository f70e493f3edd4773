//! Smart contract module.

use serde::{Deserialize, Serialize};

use super::{
    format_coins, ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Coin, Params,
    PreparedCall,
};
use crate::client::{Operation, OperationArgs, QueryOperation, TxOperation};

pub struct Store {
    file: String,
    from: String,
}

impl Operation for Store {
    const DOMAIN: &'static str = "wasm";
    const OPERATION: &'static str = "store";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.file)
    }
}

impl TxOperation for Store {
    fn signer(&self) -> &str {
        &self.from
    }
}

/// Who may migrate an instantiated contract.
pub enum Admin {
    Address(String),
    None,
}

pub struct Instantiate {
    code_id: u64,
    msg: String,
    label: String,
    admin: Admin,
    amount: Vec<Coin>,
    from: String,
}

impl Operation for Instantiate {
    const DOMAIN: &'static str = "wasm";
    const OPERATION: &'static str = "instantiate";

    fn args(&self) -> OperationArgs {
        let args = OperationArgs::new()
            .arg(self.code_id.to_string())
            .arg(&self.msg)
            .flag("label", &self.label)
            .flag_opt("amount", (!self.amount.is_empty()).then(|| format_coins(&self.amount)));
        match self.admin {
            Admin::Address(ref admin) => args.flag("admin", admin),
            Admin::None => args.switch("no-admin", true),
        }
    }
}

impl TxOperation for Instantiate {
    fn signer(&self) -> &str {
        &self.from
    }
}

pub struct Execute {
    contract: String,
    msg: String,
    amount: Vec<Coin>,
    from: String,
}

impl Operation for Execute {
    const DOMAIN: &'static str = "wasm";
    const OPERATION: &'static str = "execute";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
            .arg(&self.contract)
            .arg(&self.msg)
            .flag_opt("amount", (!self.amount.is_empty()).then(|| format_coins(&self.amount)))
    }
}

impl TxOperation for Execute {
    fn signer(&self) -> &str {
        &self.from
    }
}

/// Smart query. Contract responses are contract-defined and pass through raw.
pub struct QuerySmart {
    contract: String,
    query: String,
}

impl Operation for QuerySmart {
    const DOMAIN: &'static str = "wasm";
    const OPERATION: &'static str = "contract-state";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg("smart").arg(&self.contract).arg(&self.query)
    }
}

impl QueryOperation for QuerySmart {
    type Response = serde_json::Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInfo {
    pub code_id: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub admin: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContractInfoResponse {
    #[serde(default)]
    pub address: String,
    pub contract_info: ContractInfo,
}

pub struct ContractInfoQuery {
    contract: String,
}

impl Operation for ContractInfoQuery {
    const DOMAIN: &'static str = "wasm";
    const OPERATION: &'static str = "contract";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.contract)
    }
}

impl QueryOperation for ContractInfoQuery {
    type Response = ContractInfoResponse;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.contract_info.code_id.clone())
    }
}

fn store(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let file = shellexpand::tilde(params.required("file")?).into_owned();
    if !file.ends_with(".wasm") && !file.ends_with(".wasm.gz") {
        return Err(ActionError::invalid("file", format!("'{file}' is not a .wasm file")));
    }
    let request = Store { file, from: params.signer(env.default_signer.as_deref())? };
    Ok(PreparedCall::submit(&request))
}

fn instantiate(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let admin = match (params.optional_string("admin")?, params.flag("no_admin")?) {
        (Some(_), true) => {
            return Err(ActionError::invalid("admin", "cannot be combined with no_admin"))
        }
        (Some(admin), false) => Admin::Address(admin),
        (None, _) => Admin::None,
    };
    let request = Instantiate {
        code_id: params.required_u64("code_id")?,
        msg: params.required_json("msg")?,
        label: params.required_string("label")?,
        admin,
        amount: params.optional_coins("amount")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn execute(params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = Execute {
        contract: params.required_string("contract")?,
        msg: params.required_json("msg")?,
        amount: params.optional_coins("amount")?,
        from: params.signer(env.default_signer.as_deref())?,
    };
    Ok(PreparedCall::submit(&request))
}

fn query_smart(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = QuerySmart {
        contract: params.required_string("contract")?,
        query: params.required_json("query")?,
    };
    Ok(PreparedCall::raw_query(&request))
}

fn contract_info(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = ContractInfoQuery { contract: params.required_string("contract")? };
    Ok(PreparedCall::query(&request))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::{Query, Transaction};

    registry.register(ActionSpec::new(
        "wasm",
        "store",
        Transaction,
        "Upload contract code",
        &["file"],
        &["from"],
        store,
    ));
    registry.register(ActionSpec::new(
        "wasm",
        "instantiate",
        Transaction,
        "Instantiate stored code",
        &["code_id", "msg", "label"],
        &["from", "admin", "no_admin", "amount"],
        instantiate,
    ));
    registry.register(ActionSpec::new(
        "wasm",
        "execute",
        Transaction,
        "Execute a contract message",
        &["contract", "msg"],
        &["from", "amount"],
        execute,
    ));
    registry.register(ActionSpec::new(
        "wasm",
        "query-smart",
        Query,
        "Run a smart query against a contract",
        &["contract", "query"],
        &[],
        query_smart,
    ));
    registry.register(ActionSpec::new(
        "wasm",
        "contract-info",
        Query,
        "Metadata of a contract",
        &["contract"],
        &[],
        contract_info,
    ));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::actions::ParamValue;

    fn env() -> ActionEnv {
        ActionEnv { default_signer: Some("alice".to_string()) }
    }

    #[test]
    fn test_store_requires_wasm_file() {
        let err = store(&Params::from_pairs([("file", "contract.json")]), &env()).unwrap_err();
        assert!(matches!(err, ActionError::InvalidParameter { ref name, .. } if name == "file"));

        let params = Params::from_pairs([("file", "artifacts/cw20.wasm.gz")]);
        let call = store(&params, &env()).unwrap();
        assert_eq!(call.describe(), "tx wasm store artifacts/cw20.wasm.gz --from=alice");
    }

    #[test]
    fn test_instantiate_defaults_to_no_admin() {
        let params =
            Params::from_pairs([("code_id", "7"), ("msg", r#"{"count": 0}"#), ("label", "counter")]);
        let call = instantiate(&params, &env()).unwrap();
        let line = call.describe();
        assert!(line.starts_with(r#"tx wasm instantiate 7 {"count": 0}"#), "{line}");
        assert!(line.contains("--no-admin"));

        let params = Params::from_pairs([
            ("code_id", "7"),
            ("msg", "{}"),
            ("label", "counter"),
            ("admin", "kex1admin"),
        ]);
        let line = instantiate(&params, &env()).unwrap().describe();
        assert!(line.contains("--admin=kex1admin"));
        assert!(!line.contains("--no-admin"));
    }

    #[test]
    fn test_instantiate_rejects_conflicting_admin() {
        let params = Params::from_pairs([
            ("code_id", "7"),
            ("msg", "{}"),
            ("label", "counter"),
            ("admin", "kex1admin"),
            ("no_admin", "true"),
        ]);
        assert!(instantiate(&params, &env()).unwrap_err().is_validation());
    }

    #[test]
    fn test_execute_rejects_invalid_json() {
        let params = Params::from_pairs([("contract", "kex1contract"), ("msg", "{increment")]);
        assert!(matches!(
            execute(&params, &env()),
            Err(ActionError::InvalidParameter { ref name, .. }) if name == "msg"
        ));
    }

    #[test]
    fn test_query_smart_accepts_structured_query() {
        let params = Params::new(BTreeMap::from([
            ("contract".to_string(), ParamValue::Text("kex1contract".to_string())),
            (
                "query".to_string(),
                ParamValue::Map(BTreeMap::from([(
                    "get_count".to_string(),
                    ParamValue::Map(BTreeMap::new()),
                )])),
            ),
        ]));
        let call = query_smart(&params, &env()).unwrap();
        assert!(!call.is_submission());
        assert_eq!(
            call.describe(),
            r#"query wasm contract-state smart kex1contract {"get_count":{}}"#
        );
    }

    #[test]
    fn test_contract_info_primary_is_code_id() {
        let response: ContractInfoResponse = serde_json::from_value(serde_json::json!({
            "address": "kex1contract",
            "contract_info": {"code_id": "7", "creator": "kex1alice", "label": "counter"}
        }))
        .unwrap();
        assert_eq!(ContractInfoQuery::primary(&response).as_deref(), Some("7"));
    }
}
