//! Action registry.
//!
//! Maps a playbook step's `(module, action)` pair to a hand-written adapter.
//! Adapters validate and convert the step's parameters into the typed
//! request of exactly one remote operation; the registry is the only seam
//! between the uniform playbook format and the statically-typed requests.
//!
//! The table is fixed at build time and checked for completeness by this
//! module's tests.

mod auth;
mod bank;
mod distribution;
mod gov;
mod keys;
mod mint;
mod params;
mod slashing;
mod staking;
mod wasm;

pub use params::{format_coins, Coin, ParamValue, Params};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::{
    ClientError, LedgerClient, OperationArgs, QueryOperation, SubmissionId, TxOperation,
};

/// Errors raised while preparing or invoking an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// No adapter is registered for the pair.
    #[error("unknown action '{module}.{action}'")]
    UnknownAction { module: String, action: String },

    /// A required parameter is absent or empty.
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    /// A parameter could not be converted.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The remote call failed to complete.
    #[error("{0}")]
    Transport(String),

    /// The remote payload did not match the operation's response type.
    #[error("unexpected response from {operation}: {reason}")]
    Decode { operation: String, reason: String },
}

impl ActionError {
    /// Shorthand for [`ActionError::InvalidParameter`].
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { name: name.to_string(), reason: reason.into() }
    }

    /// Whether the error comes from the step itself rather than the remote side.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownAction { .. } | Self::MissingParameter(_) | Self::InvalidParameter { .. }
        )
    }
}

impl From<ClientError> for ActionError {
    fn from(err: ClientError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// What an action does to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Read-only chain query
    Query,
    /// Signed state change, confirmed by polling
    Transaction,
    /// Local keyring operation
    Keyring,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Transaction => "tx",
            Self::Keyring => "keys",
        })
    }
}

/// Run-level defaults available to adapters.
#[derive(Debug, Clone, Default)]
pub struct ActionEnv {
    /// Signer used when a step has no `from`
    pub default_signer: Option<String>,
}

/// Adapter from resolved parameters to a prepared remote call.
pub type Adapter = fn(&Params, &ActionEnv) -> Result<PreparedCall, ActionError>;

/// Registry entry for one `(module, action)` pair.
#[derive(Clone)]
pub struct ActionSpec {
    /// Playbook module name
    pub module: &'static str,

    /// Playbook action name
    pub action: &'static str,

    /// Effect on the ledger
    pub kind: ActionKind,

    /// One-line description
    pub summary: &'static str,

    /// Parameters that must be present
    pub required: &'static [&'static str],

    /// Parameters that may be present
    pub optional: &'static [&'static str],

    adapter: Adapter,
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("module", &self.module)
            .field("action", &self.action)
            .field("kind", &self.kind)
            .finish()
    }
}

impl ActionSpec {
    /// Create an entry.
    pub const fn new(
        module: &'static str,
        action: &'static str,
        kind: ActionKind,
        summary: &'static str,
        required: &'static [&'static str],
        optional: &'static [&'static str],
        adapter: Adapter,
    ) -> Self {
        Self { module, action, kind, summary, required, optional, adapter }
    }

    /// Validate and convert parameters into a remote call.
    pub fn prepare(&self, params: &Params, env: &ActionEnv) -> Result<PreparedCall, ActionError> {
        (self.adapter)(params, env)
    }

    /// Parameters the adapter reads, required first.
    pub fn parameter_names(&self) -> impl Iterator<Item = &'static str> {
        self.required.iter().chain(self.optional.iter()).copied()
    }
}

/// Decoder from a raw payload into an action output.
type Decoder = fn(serde_json::Value, &'static str) -> Result<ActionOutput, ActionError>;

/// How a prepared call reaches the remote side.
#[derive(Debug, Clone)]
pub enum CallKind {
    /// Read-only; the payload is decoded on return
    Query { decode: Decoder },
    /// Signed by `signer`; yields a submission id
    Submit { signer: String },
}

/// A fully validated call, ready to be dispatched or described.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    /// Remote domain
    pub domain: &'static str,

    /// Remote operation
    pub operation: &'static str,

    /// Rendered arguments
    pub args: OperationArgs,

    /// Dispatch path
    pub kind: CallKind,
}

impl PreparedCall {
    /// Prepare a typed query.
    pub fn query<Q: QueryOperation>(request: &Q) -> Self {
        Self {
            domain: Q::DOMAIN,
            operation: Q::OPERATION,
            args: request.args(),
            kind: CallKind::Query { decode: decode_typed::<Q> },
        }
    }

    /// Prepare a query whose payload is passed through undecoded.
    pub fn raw_query<Q: QueryOperation<Response = serde_json::Value>>(request: &Q) -> Self {
        Self {
            domain: Q::DOMAIN,
            operation: Q::OPERATION,
            args: request.args(),
            kind: CallKind::Query { decode: decode_raw },
        }
    }

    /// Prepare a signed state change.
    pub fn submit<T: TxOperation>(request: &T) -> Self {
        Self {
            domain: T::DOMAIN,
            operation: T::OPERATION,
            args: request.args(),
            kind: CallKind::Submit { signer: request.signer().to_string() },
        }
    }

    /// Whether dispatching this call changes ledger state.
    pub fn is_submission(&self) -> bool {
        matches!(self.kind, CallKind::Submit { .. })
    }

    /// Human-readable form of the call, as the node CLI would take it.
    pub fn describe(&self) -> String {
        let mut line = match self.kind {
            CallKind::Query { .. } if self.domain == "keys" => format!("keys {}", self.operation),
            CallKind::Query { .. } if self.domain == self.operation => format!("query {}", self.domain),
            CallKind::Query { .. } => format!("query {} {}", self.domain, self.operation),
            CallKind::Submit { .. } => format!("tx {} {}", self.domain, self.operation),
        };
        let args = self.args.render();
        if !args.is_empty() {
            line.push(' ');
            line.push_str(&args);
        }
        if let CallKind::Submit { ref signer } = self.kind {
            line.push_str(&format!(" --from={signer}"));
        }
        line
    }

    /// Issue the call. Submissions return as soon as the node accepts them.
    pub async fn dispatch(&self, client: &dyn LedgerClient) -> Result<ActionOutput, ActionError> {
        match self.kind {
            CallKind::Query { decode } => {
                let payload = client.query(self.domain, self.operation, &self.args).await?;
                decode(payload, self.operation)
            }
            CallKind::Submit { ref signer } => {
                let id = client.submit(self.domain, self.operation, signer, &self.args).await?;
                Ok(ActionOutput::Submitted { id })
            }
        }
    }
}

fn decode_typed<Q: QueryOperation>(
    payload: serde_json::Value,
    operation: &'static str,
) -> Result<ActionOutput, ActionError> {
    let response: Q::Response = serde_json::from_value(payload)
        .map_err(|e| ActionError::Decode { operation: operation.to_string(), reason: e.to_string() })?;
    let primary = Q::primary(&response);
    let body = serde_json::to_value(&response)
        .map_err(|e| ActionError::Decode { operation: operation.to_string(), reason: e.to_string() })?;
    Ok(ActionOutput::Payload { primary, body })
}

fn decode_raw(
    payload: serde_json::Value,
    _operation: &'static str,
) -> Result<ActionOutput, ActionError> {
    Ok(ActionOutput::Raw { body: payload })
}

/// Normalized result of a dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutput {
    /// Payload decoded into the operation's response type
    Payload { primary: Option<String>, body: serde_json::Value },
    /// Loosely-typed payload passed through as the node returned it
    Raw { body: serde_json::Value },
    /// State change accepted for inclusion
    Submitted { id: SubmissionId },
}

impl ActionOutput {
    /// The value a playbook captures with `register`.
    pub fn primary_value(&self) -> String {
        match self {
            Self::Payload { primary: Some(value), .. } => value.clone(),
            Self::Payload { primary: None, body } | Self::Raw { body } => compact(body),
            Self::Submitted { id } => id.to_string(),
        }
    }

    /// The submission id, for state changes.
    pub fn submission(&self) -> Option<&SubmissionId> {
        match self {
            Self::Submitted { id } => Some(id),
            _ => None,
        }
    }

    /// Text shown in reports.
    pub fn summary(&self) -> String {
        match self {
            Self::Payload { primary: Some(value), .. } => value.clone(),
            Self::Payload { primary: None, body } | Self::Raw { body } => compact(body),
            Self::Submitted { id } => format!("submitted {id}"),
        }
    }
}

/// Compact text form of a payload: strings unquoted, null empty.
fn compact(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fixed table of adapters, keyed by module then action.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, BTreeMap<&'static str, ActionSpec>>,
}

static BUILTIN: Lazy<Arc<ActionRegistry>> = Lazy::new(|| Arc::new(ActionRegistry::builtin()));

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry with every built-in adapter.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        auth::register(&mut registry);
        bank::register(&mut registry);
        distribution::register(&mut registry);
        gov::register(&mut registry);
        keys::register(&mut registry);
        mint::register(&mut registry);
        slashing::register(&mut registry);
        staking::register(&mut registry);
        wasm::register(&mut registry);
        registry
    }

    /// Shared built-in registry, built once per process.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Register an adapter.
    pub fn register(&mut self, spec: ActionSpec) {
        let previous = self.actions.entry(spec.module).or_default().insert(spec.action, spec);
        debug_assert!(previous.is_none(), "duplicate action registration");
    }

    /// Look up the adapter for a pair.
    pub fn resolve(&self, module: &str, action: &str) -> Result<&ActionSpec, ActionError> {
        self.actions.get(module).and_then(|actions| actions.get(action)).ok_or_else(|| {
            ActionError::UnknownAction { module: module.to_string(), action: action.to_string() }
        })
    }

    /// Check whether a pair is registered.
    pub fn contains(&self, module: &str, action: &str) -> bool {
        self.resolve(module, action).is_ok()
    }

    /// All entries, ordered by module then action.
    pub fn all(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.values().flat_map(BTreeMap::values)
    }

    /// Entries of one module.
    pub fn module(&self, module: &str) -> impl Iterator<Item = &ActionSpec> {
        self.actions.get(module).into_iter().flat_map(BTreeMap::values)
    }

    /// Module names, sorted.
    pub fn modules(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.values().map(BTreeMap::len).sum()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockClient;

    /// Every pair reachable from a playbook, by module.
    const EXPECTED: &[(&str, &[&str])] = &[
        ("auth", &["account", "tx"]),
        ("bank", &["balance", "balances", "multi-send", "send", "total-supply"]),
        (
            "distribution",
            &["commission", "rewards", "set-withdraw-address", "withdraw-all-rewards", "withdraw-rewards"],
        ),
        ("gov", &["deposit", "proposal", "proposals", "submit-proposal", "tally", "vote"]),
        ("keys", &["add", "delete", "list", "show"]),
        ("mint", &["annual-provisions", "inflation"]),
        ("slashing", &["signing-info", "unjail"]),
        (
            "staking",
            &["delegate", "delegation", "delegations", "redelegate", "unbond", "validator", "validators"],
        ),
        ("wasm", &["contract-info", "execute", "instantiate", "query-smart", "store"]),
    ];

    #[test]
    fn test_builtin_registry_is_complete() {
        let registry = ActionRegistry::builtin();

        for (module, actions) in EXPECTED {
            for action in *actions {
                assert!(registry.contains(module, action), "missing adapter for {module}.{action}");
            }
        }

        let expected_total: usize = EXPECTED.iter().map(|(_, actions)| actions.len()).sum();
        assert_eq!(registry.len(), expected_total, "registry has unlisted adapters");
    }

    #[test]
    fn test_modules_listing() {
        let registry = ActionRegistry::builtin();
        let modules: Vec<_> = EXPECTED.iter().map(|(m, _)| *m).collect();
        assert_eq!(registry.modules(), modules);
        assert_eq!(registry.module("mint").count(), 2);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ActionRegistry::shared();
        let err = registry.resolve("bank", "teleport").unwrap_err();
        assert_eq!(
            err,
            ActionError::UnknownAction { module: "bank".into(), action: "teleport".into() }
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_every_required_parameter_is_enforced() {
        let registry = ActionRegistry::builtin();
        let env = ActionEnv { default_signer: Some("validator".to_string()) };

        for spec in registry.all() {
            for missing in spec.required {
                let params = Params::from_pairs(
                    spec.required
                        .iter()
                        .filter(|name| *name != missing)
                        .map(|name| (*name, sample_value(name))),
                );
                match spec.prepare(&params, &env) {
                    Err(ActionError::MissingParameter(name)) => assert_eq!(&name, missing),
                    other => panic!(
                        "{}.{} without '{missing}' should fail, got {other:?}",
                        spec.module, spec.action
                    ),
                }
            }
        }
    }

    #[test]
    fn test_every_adapter_prepares_with_sample_params() {
        let registry = ActionRegistry::builtin();
        let env = ActionEnv { default_signer: Some("validator".to_string()) };

        for spec in registry.all() {
            let params =
                Params::from_pairs(spec.required.iter().map(|name| (*name, sample_value(name))));
            let call = spec
                .prepare(&params, &env)
                .unwrap_or_else(|e| panic!("{}.{} failed: {e}", spec.module, spec.action));
            assert_eq!(
                call.is_submission(),
                spec.kind == ActionKind::Transaction,
                "{}.{} kind mismatch",
                spec.module,
                spec.action
            );
        }
    }

    #[test]
    fn test_describe_call() {
        let registry = ActionRegistry::builtin();
        let params = Params::from_pairs([("from", "alice"), ("to", "kex1b"), ("amount", "5ukex")]);
        let call = registry.resolve("bank", "send").unwrap().prepare(&params, &ActionEnv::default()).unwrap();

        assert_eq!(call.describe(), "tx bank send alice kex1b 5ukex --from=alice");
    }

    #[tokio::test]
    async fn test_dispatch_query_decodes_primary() {
        let client = MockClient::new().with_query(
            "bank",
            "balances",
            serde_json::json!({"balances": [{"denom": "ukex", "amount": "5"}]}),
        );
        let registry = ActionRegistry::builtin();
        let params = Params::from_pairs([("address", "kex1a")]);
        let call = registry.resolve("bank", "balances").unwrap().prepare(&params, &ActionEnv::default()).unwrap();

        let output = call.dispatch(&client).await.unwrap();
        assert_eq!(output.primary_value(), "5ukex");
    }

    #[tokio::test]
    async fn test_dispatch_decode_failure() {
        let client =
            MockClient::new().with_query("staking", "validator", serde_json::json!("nonsense"));
        let registry = ActionRegistry::builtin();
        let params = Params::from_pairs([("validator", "kexvaloper1v")]);
        let call =
            registry.resolve("staking", "validator").unwrap().prepare(&params, &ActionEnv::default()).unwrap();

        let err = call.dispatch(&client).await.unwrap_err();
        assert!(matches!(err, ActionError::Decode { .. }));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_primary_value_forms() {
        let submitted = ActionOutput::Submitted { id: SubmissionId::new("AB12") };
        assert_eq!(submitted.primary_value(), "AB12");
        assert_eq!(submitted.summary(), "submitted AB12");

        let raw = ActionOutput::Raw { body: serde_json::json!({"count": 3}) };
        assert_eq!(raw.primary_value(), r#"{"count":3}"#);

        let text = ActionOutput::Payload { primary: None, body: serde_json::json!("0.13") };
        assert_eq!(text.primary_value(), "0.13");
    }

    /// A value each adapter accepts for a parameter of the given name.
    pub(crate) fn sample_value(name: &str) -> &'static str {
        match name {
            "amount" | "deposit" => "5ukex",
            "proposal_id" | "code_id" => "1",
            "option" => "yes",
            "msg" | "query" => r#"{"ping":{}}"#,
            "pubkey" => r#"{"@type":"/cosmos.crypto.ed25519.PubKey","key":"AAAA"}"#,
            "to" => "kex1recipient",
            "hash" => "0A1B2C3D",
            "file" => "contract.wasm",
            "validator" | "src_validator" | "dst_validator" => "kexvaloper1validator",
            _ => "sample",
        }
    }
}
