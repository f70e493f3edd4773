//! Scripted in-memory client.
//!
//! Records every call it receives so tests can assert on what the engine
//! sent, and answers from canned responses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ClientError, LedgerClient, OperationArgs, SubmissionId, TxResult, TxStatus};

/// A call received by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Query { domain: String, operation: String, args: OperationArgs },
    Submit { domain: String, operation: String, signer: String, args: OperationArgs },
    Poll { id: SubmissionId },
}

/// How submitted transactions resolve when polled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Committed on the first poll
    #[default]
    Immediately,
    /// Reported pending forever
    Never,
    /// Rejected on chain with the given log
    Reject(String),
}

/// Scripted [`LedgerClient`] for tests.
#[derive(Debug, Default)]
pub struct MockClient {
    queries: Mutex<HashMap<(String, String), Result<serde_json::Value, String>>>,
    submit_errors: Mutex<HashMap<(String, String), String>>,
    confirm_mode: Mutex<ConfirmMode>,
    failing_polls: AtomicU64,
    pending_polls: AtomicU64,
    next_tx: AtomicU64,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockClient {
    /// Create a mock that commits every submission immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer a query with a payload.
    pub fn with_query(self, domain: &str, operation: &str, payload: serde_json::Value) -> Self {
        self.queries.lock().insert((domain.to_string(), operation.to_string()), Ok(payload));
        self
    }

    /// Fail a query with a transport error.
    pub fn with_query_error(self, domain: &str, operation: &str, message: &str) -> Self {
        self.queries
            .lock()
            .insert((domain.to_string(), operation.to_string()), Err(message.to_string()));
        self
    }

    /// Fail a submission with a transport error.
    pub fn with_submit_error(self, domain: &str, operation: &str, message: &str) -> Self {
        self.submit_errors
            .lock()
            .insert((domain.to_string(), operation.to_string()), message.to_string());
        self
    }

    /// Never report submissions as included.
    pub fn never_confirms(self) -> Self {
        *self.confirm_mode.lock() = ConfirmMode::Never;
        self
    }

    /// Report every submission as failed on chain.
    pub fn rejects(self, reason: &str) -> Self {
        *self.confirm_mode.lock() = ConfirmMode::Reject(reason.to_string());
        self
    }

    /// Fail the next `count` polls with transport errors.
    pub fn with_failing_polls(self, count: u64) -> Self {
        self.failing_polls.store(count, Ordering::SeqCst);
        self
    }

    /// Report the next `count` polls as pending before resolving.
    pub fn with_pending_polls(self, count: u64) -> Self {
        self.pending_polls.store(count, Ordering::SeqCst);
        self
    }

    /// All calls received, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Query calls received, as `(domain, operation, args)`.
    pub fn query_calls(&self) -> Vec<(String, String, OperationArgs)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Query { domain, operation, args } => {
                    Some((domain.clone(), operation.clone(), args.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Submit calls received, as `(domain, operation, signer, args)`.
    pub fn submit_calls(&self) -> Vec<(String, String, String, OperationArgs)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Submit { domain, operation, signer, args } => {
                    Some((domain.clone(), operation.clone(), signer.clone(), args.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of status polls received.
    pub fn poll_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| matches!(c, RecordedCall::Poll { .. })).count()
    }

    fn take_one(counter: &AtomicU64) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

#[async_trait]
impl LedgerClient for MockClient {
    async fn query(
        &self,
        domain: &str,
        operation: &str,
        args: &OperationArgs,
    ) -> Result<serde_json::Value, ClientError> {
        self.calls.lock().push(RecordedCall::Query {
            domain: domain.to_string(),
            operation: operation.to_string(),
            args: args.clone(),
        });

        match self.queries.lock().get(&(domain.to_string(), operation.to_string())) {
            Some(Ok(payload)) => Ok(payload.clone()),
            Some(Err(message)) => Err(ClientError::Transport(message.clone())),
            None => Err(ClientError::Transport(format!(
                "no response scripted for {domain} {operation}"
            ))),
        }
    }

    async fn submit(
        &self,
        domain: &str,
        operation: &str,
        signer: &str,
        args: &OperationArgs,
    ) -> Result<SubmissionId, ClientError> {
        self.calls.lock().push(RecordedCall::Submit {
            domain: domain.to_string(),
            operation: operation.to_string(),
            signer: signer.to_string(),
            args: args.clone(),
        });

        if let Some(message) =
            self.submit_errors.lock().get(&(domain.to_string(), operation.to_string()))
        {
            return Err(ClientError::Transport(message.clone()));
        }

        let n = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SubmissionId::new(format!("{n:064X}")))
    }

    async fn poll_status(&self, id: &SubmissionId) -> Result<TxStatus, ClientError> {
        self.calls.lock().push(RecordedCall::Poll { id: id.clone() });

        if Self::take_one(&self.failing_polls) {
            return Err(ClientError::Transport("connection reset".to_string()));
        }
        if Self::take_one(&self.pending_polls) {
            return Ok(TxStatus::Pending);
        }

        Ok(match &*self.confirm_mode.lock() {
            ConfirmMode::Immediately => TxStatus::Committed(TxResult {
                txhash: id.to_string(),
                height: 100,
                gas_used: 65_000,
                gas_wanted: 80_000,
            }),
            ConfirmMode::Never => TxStatus::Pending,
            ConfirmMode::Reject(reason) => TxStatus::Rejected(reason.clone()),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
