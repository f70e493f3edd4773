//! Remote ledger client interface.
//!
//! Everything the engine needs from the transport layer goes through
//! [`LedgerClient`]: read-only queries, signed state changes, and status
//! polls for submitted transactions. Concrete transports live beside it:
//! [`CliTransport`] drives the node daemon binary, [`mock::MockClient`] is a
//! scripted double for tests.

mod cli;
pub mod mock;
mod operation;

pub use cli::CliTransport;
pub use operation::{Operation, QueryOperation, TxOperation};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Arguments for a remote operation, split the way the node CLI takes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationArgs {
    /// Positional arguments, in order
    pub positional: Vec<String>,

    /// Keyed arguments (`--name=value`)
    pub flags: BTreeMap<String, String>,
}

impl OperationArgs {
    /// Create empty arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyed argument.
    pub fn flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    /// Set a keyed argument only when a value is present.
    pub fn flag_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.flag(name, value),
            None => self,
        }
    }

    /// Set a boolean switch when enabled.
    pub fn switch(self, name: impl Into<String>, enabled: bool) -> Self {
        if enabled {
            self.flag(name, "true")
        } else {
            self
        }
    }

    /// Render the arguments as a single command-line fragment.
    pub fn render(&self) -> String {
        let mut parts = self.positional.clone();
        parts.extend(self.flags.iter().map(|(k, v)| format!("--{k}={v}")));
        parts.join(" ")
    }
}

/// Identifier of a submitted state change (the transaction hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    /// Create a submission id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// Transaction hash
    pub txhash: String,

    /// Block height the transaction was included at
    pub height: u64,

    /// Gas consumed
    pub gas_used: u64,

    /// Gas requested
    pub gas_wanted: u64,
}

/// Inclusion status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Not yet seen in a block
    Pending,
    /// Included and executed successfully
    Committed(TxResult),
    /// Included, but execution failed on chain
    Rejected(String),
}

/// Transaction response as the node reports it, both for broadcasts and
/// for `query tx`. Numeric fields arrive as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxResponse {
    /// Transaction hash
    pub txhash: String,

    /// Inclusion height ("0" for a broadcast that is not yet included)
    pub height: String,

    /// ABCI result code, zero on success
    pub code: u32,

    /// Codespace of a failing code
    pub codespace: String,

    /// Raw execution log
    pub raw_log: String,

    /// Gas consumed
    pub gas_used: String,

    /// Gas requested
    pub gas_wanted: String,
}

impl TxResponse {
    /// Convert into a committed result.
    pub fn to_result(&self) -> TxResult {
        TxResult {
            txhash: self.txhash.clone(),
            height: self.height.parse().unwrap_or(0),
            gas_used: self.gas_used.parse().unwrap_or(0),
            gas_wanted: self.gas_wanted.parse().unwrap_or(0),
        }
    }

    /// Classify an included transaction.
    pub fn status(&self) -> TxStatus {
        if self.code == 0 {
            TxStatus::Committed(self.to_result())
        } else if self.raw_log.is_empty() {
            TxStatus::Rejected(format!("{} code {}", self.codespace, self.code).trim().to_string())
        } else {
            TxStatus::Rejected(self.raw_log.clone())
        }
    }
}

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The node binary could not be spawned.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The node command exited with an error.
    #[error("node command failed: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    /// The node rejected the transaction at broadcast time.
    #[error("broadcast rejected with code {code}: {log}")]
    Broadcast { code: u32, log: String },

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Uniform access to the remote ledger service.
///
/// Implementations are long-lived and shared across all steps of a run;
/// any connection pooling or retry policy belongs below this trait.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Run a read-only operation and return its JSON payload.
    async fn query(
        &self,
        domain: &str,
        operation: &str,
        args: &OperationArgs,
    ) -> Result<serde_json::Value, ClientError>;

    /// Sign and broadcast a state change, returning its submission id.
    async fn submit(
        &self,
        domain: &str,
        operation: &str,
        signer: &str,
        args: &OperationArgs,
    ) -> Result<SubmissionId, ClientError>;

    /// Check whether a submitted state change has been included.
    async fn poll_status(&self, id: &SubmissionId) -> Result<TxStatus, ClientError>;

    /// Get the transport name.
    fn name(&self) -> &str;
}
