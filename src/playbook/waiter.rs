//! Confirmation waiting for submitted state changes.
//!
//! After a transaction is accepted by the node it still has to be included
//! in a block. The waiter polls its status until it is committed, rejected,
//! the deadline passes, or the run is cancelled.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::{LedgerClient, SubmissionId, TxResult, TxStatus};

/// Interval between status polls unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shortest interval between status polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a confirmation wait ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    /// Included and executed successfully
    Confirmed(TxResult),

    /// Included, but the chain reports failure
    Rejected(String),

    /// Still unknown when the deadline passed
    TimedOut,

    /// The run was cancelled while waiting
    Cancelled,
}

impl WaitOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Polls a submission until it reaches a final status.
pub struct ConfirmationWaiter {
    client: Arc<dyn LedgerClient>,
    poll_interval: Duration,
}

impl ConfirmationWaiter {
    /// Create a waiter with the default poll interval.
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    /// Set the interval between polls, never below [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Wait for `id` to be included, for at most `timeout`. A timeout too
    /// large to represent as a deadline waits until confirmation or
    /// cancellation.
    pub async fn wait(
        &self,
        id: &SubmissionId,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        let deadline = Instant::now().checked_add(timeout);
        if deadline.is_none() {
            tracing::debug!(txhash = %id, "Confirmation timeout out of range, waiting without deadline");
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(txhash = %id, "Confirmation wait cancelled");
                WaitOutcome::Cancelled
            }
            outcome = self.poll_until(id, deadline) => outcome,
        }
    }

    async fn poll_until(&self, id: &SubmissionId, deadline: Option<Instant>) -> WaitOutcome {
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let polled = match deadline {
                Some(deadline) => timeout_at(deadline, self.client.poll_status(id)).await,
                None => Ok(self.client.poll_status(id).await),
            };
            match polled {
                Err(_) => break,
                Ok(Ok(TxStatus::Committed(result))) => {
                    tracing::info!(txhash = %id, height = result.height, attempt, "Transaction confirmed");
                    return WaitOutcome::Confirmed(result);
                }
                Ok(Ok(TxStatus::Rejected(reason))) => {
                    tracing::warn!(txhash = %id, reason = %reason, "Transaction rejected");
                    return WaitOutcome::Rejected(reason);
                }
                Ok(Ok(TxStatus::Pending)) => {
                    tracing::debug!(txhash = %id, attempt, "Transaction pending");
                }
                Ok(Err(e)) => {
                    tracing::warn!(txhash = %id, attempt, error = %e, "Status poll failed, retrying");
                }
            }

            match (Instant::now().checked_add(self.poll_interval), deadline) {
                (Some(next), Some(deadline)) if next < deadline => sleep_until(next).await,
                (Some(next), None) => sleep_until(next).await,
                (_, Some(deadline)) => {
                    sleep_until(deadline).await;
                    break;
                }
                (None, None) => std::future::pending::<()>().await,
            }
        }

        tracing::warn!(txhash = %id, attempts = attempt, "Confirmation timed out");
        WaitOutcome::TimedOut
    }
}
