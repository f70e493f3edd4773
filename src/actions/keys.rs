//! Keyring operations.
//!
//! These touch only the local keyring, never the chain, so they go through
//! the query path of the client under the `keys` domain.

use serde::{Deserialize, Serialize};

use super::{ActionEnv, ActionError, ActionKind, ActionRegistry, ActionSpec, Params, PreparedCall};
use crate::client::{Operation, OperationArgs, QueryOperation};

const DOMAIN: &str = "keys";

/// A keyring entry. Mnemonics printed by `add` are not part of this type
/// and are dropped when the response is decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub name: String,
    #[serde(default, rename = "type")]
    pub key_type: String,
    pub address: String,
    #[serde(default)]
    pub pubkey: String,
}

pub struct AddKey {
    name: String,
    recover: bool,
    algo: Option<String>,
    account: Option<u64>,
    index: Option<u64>,
}

impl Operation for AddKey {
    const DOMAIN: &'static str = DOMAIN;
    const OPERATION: &'static str = "add";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
            .arg(&self.name)
            .switch("recover", self.recover)
            .flag_opt("algo", self.algo.as_deref())
            .flag_opt("account", self.account.map(|n| n.to_string()))
            .flag_opt("index", self.index.map(|n| n.to_string()))
    }
}

impl QueryOperation for AddKey {
    type Response = KeyInfo;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.address.clone())
    }
}

pub struct ShowKey {
    name: String,
    bech: Option<String>,
}

impl Operation for ShowKey {
    const DOMAIN: &'static str = DOMAIN;
    const OPERATION: &'static str = "show";

    fn args(&self) -> OperationArgs {
        OperationArgs::new().arg(&self.name).flag_opt("bech", self.bech.as_deref())
    }
}

impl QueryOperation for ShowKey {
    type Response = KeyInfo;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.address.clone())
    }
}

pub struct ListKeys;

impl Operation for ListKeys {
    const DOMAIN: &'static str = DOMAIN;
    const OPERATION: &'static str = "list";

    fn args(&self) -> OperationArgs {
        OperationArgs::new()
    }
}

impl QueryOperation for ListKeys {
    type Response = Vec<KeyInfo>;

    fn primary(response: &Self::Response) -> Option<String> {
        Some(response.iter().map(|k| k.name.as_str()).collect::<Vec<_>>().join(","))
    }
}

pub struct DeleteKey {
    name: String,
}

impl Operation for DeleteKey {
    const DOMAIN: &'static str = DOMAIN;
    const OPERATION: &'static str = "delete";

    fn args(&self) -> OperationArgs {
        // Skip the interactive confirmation.
        OperationArgs::new().arg(&self.name).switch("yes", true)
    }
}

impl QueryOperation for DeleteKey {
    type Response = ();
}

fn validate_name(params: &Params) -> Result<String, ActionError> {
    let name = params.required("name")?;
    if name.contains(char::is_whitespace) {
        return Err(ActionError::invalid("name", "key names cannot contain whitespace"));
    }
    Ok(name.to_string())
}

fn add(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = AddKey {
        name: validate_name(params)?,
        recover: params.flag("recover")?,
        algo: params.optional_string("algo")?,
        account: params.optional_u64("account")?,
        index: params.optional_u64("index")?,
    };
    Ok(PreparedCall::query(&request))
}

fn show(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let bech = match params.optional("bech")? {
        None => None,
        Some(b @ ("acc" | "val" | "cons")) => Some(b.to_string()),
        Some(other) => {
            return Err(ActionError::invalid("bech", format!("'{other}' is not one of acc, val, cons")))
        }
    };
    let request = ShowKey { name: validate_name(params)?, bech };
    Ok(PreparedCall::query(&request))
}

fn list(_params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    Ok(PreparedCall::query(&ListKeys))
}

fn delete(params: &Params, _env: &ActionEnv) -> Result<PreparedCall, ActionError> {
    let request = DeleteKey { name: validate_name(params)? };
    Ok(PreparedCall::query(&request))
}

pub(super) fn register(registry: &mut ActionRegistry) {
    use ActionKind::Keyring;

    registry.register(ActionSpec::new(
        "keys",
        "add",
        Keyring,
        "Create or recover a key",
        &["name"],
        &["recover", "algo", "account", "index"],
        add,
    ));
    registry.register(ActionSpec::new(
        "keys",
        "show",
        Keyring,
        "Show a key's address",
        &["name"],
        &["bech"],
        show,
    ));
    registry.register(ActionSpec::new("keys", "list", Keyring, "List keys", &[], &[], list));
    registry.register(ActionSpec::new(
        "keys",
        "delete",
        Keyring,
        "Delete a key",
        &["name"],
        &[],
        delete,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockClient;

    #[tokio::test]
    async fn test_add_captures_address_and_drops_mnemonic() {
        let client = MockClient::new().with_query(
            "keys",
            "add",
            serde_json::json!({
                "name": "alice",
                "type": "local",
                "address": "kex1alice",
                "pubkey": "{}",
                "mnemonic": "word word word"
            }),
        );
        let call = add(&Params::from_pairs([("name", "alice")]), &ActionEnv::default()).unwrap();
        let output = call.dispatch(&client).await.unwrap();

        assert_eq!(output.primary_value(), "kex1alice");
        assert!(!serde_json::to_string(&output).unwrap().contains("word"));
    }

    #[tokio::test]
    async fn test_delete_accepts_empty_output() {
        let client = MockClient::new().with_query("keys", "delete", serde_json::Value::Null);
        let call = delete(&Params::from_pairs([("name", "alice")]), &ActionEnv::default()).unwrap();

        assert_eq!(call.args.render(), "alice --yes=true");
        assert_eq!(call.dispatch(&client).await.unwrap().primary_value(), "");
    }

    #[test]
    fn test_names_cannot_contain_spaces() {
        let params = Params::from_pairs([("name", "my key")]);
        assert!(show(&params, &ActionEnv::default()).is_err());
    }
}
