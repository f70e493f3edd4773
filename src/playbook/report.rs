//! Execution reports.
//!
//! A report is the complete, serializable record of one run: what was
//! attempted, how each step ended, and why the run stopped.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::waiter::WaitOutcome;
use crate::actions::{ActionKind, ActionOutput};
use crate::client::SubmissionId;

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Dispatched and, for state changes, confirmed
    Succeeded,
    /// Prepared but not dispatched
    DryRun,
    /// Failed before or during dispatch
    Failed,
    /// State change included but failed on chain
    Rejected,
    /// Confirmation still unknown at the deadline
    TimedOut,
    /// Interrupted by run cancellation
    Cancelled,
}

impl StepStatus {
    /// Whether the continuation policy treats this status as a failure.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Succeeded | Self::DryRun)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "ok",
            Self::DryRun => "dry-run",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unknown action, missing or invalid parameter
    Validation,
    /// A placeholder named a variable not in scope
    UndefinedVariable,
    /// The remote call did not complete
    Transport,
    /// The chain reported the state change as failed
    Rejected,
    /// Confirmation status unknown at the deadline
    TimedOut,
    /// The run was cancelled
    Cancelled,
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Result of executing one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Position in the playbook, starting at 0
    pub index: usize,

    /// Step name
    pub name: String,

    /// Module (remote domain)
    pub module: String,

    /// Action (remote operation)
    pub action: String,

    /// Kind of action, once resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActionKind>,

    /// Final status
    pub status: StepStatus,

    /// The prepared call, in node CLI form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<String>,

    /// Dispatch output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ActionOutput>,

    /// Failure details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,

    /// Submission id of a state change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionId>,

    /// Final confirmation status of a state change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<WaitOutcome>,

    /// Variable bound from this step's output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered: Option<String>,

    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl StepResult {
    pub(crate) fn new(index: usize, name: &str, module: &str, action: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            module: module.to_string(),
            action: action.to_string(),
            kind: None,
            status: StepStatus::Succeeded,
            call: None,
            output: None,
            failure: None,
            submission: None,
            confirmation: None,
            registered: None,
            duration_ms: 0,
        }
    }

    /// Mark the step failed.
    pub(crate) fn fail(&mut self, status: StepStatus, kind: FailureKind, message: impl Into<String>) {
        self.status = status;
        self.failure = Some(StepFailure { kind, message: message.into() });
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    /// The value `register` binds from this step.
    pub fn primary_value(&self) -> Option<String> {
        self.output.as_ref().map(ActionOutput::primary_value)
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Every step was attempted
    Completed,
    /// The run stopped before the end of the playbook
    Aborted,
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// A step did not resolve; nothing ran
    Validation,
    /// A step failed under halt-on-error
    Halted,
    /// The run was cancelled
    Cancelled,
}

/// Complete record of a playbook run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Unique id of this run
    pub run_id: Uuid,

    /// Playbook name
    pub playbook: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Whether remote calls were suppressed
    pub dry_run: bool,

    /// True when the run completed and no attempted step failed
    pub success: bool,

    /// Terminal state
    pub state: RunState,

    /// Why the run stopped early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,

    /// Results of attempted steps, in order
    pub steps: Vec<StepResult>,

    /// Steps that were never attempted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_attempted: Vec<String>,

    /// Aggregate error when the run stopped early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Variables in scope at the end of the run
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionReport {
    pub(crate) fn new(playbook: &str, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            playbook: playbook.to_string(),
            started_at: Utc::now(),
            dry_run,
            success: false,
            state: RunState::Completed,
            abort_reason: None,
            steps: Vec::new(),
            not_attempted: Vec::new(),
            error: None,
            variables: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    /// Record an early stop.
    pub(crate) fn abort(&mut self, reason: AbortReason, error: impl Into<String>) {
        self.state = RunState::Aborted;
        self.abort_reason = Some(reason);
        self.error = Some(error.into());
    }

    /// Settle `success` once all results are in.
    pub(crate) fn finish(&mut self, duration_ms: u64) {
        self.success =
            self.state == RunState::Completed && self.steps.iter().all(|s| !s.status.is_failure());
        self.duration_ms = duration_ms;
    }

    /// Number of attempted steps that failed.
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_failure()).count()
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Plain-text rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };
        let _ = writeln!(out, "Playbook: {}{mode}", self.playbook);
        let _ = writeln!(out, "Run: {}\n", self.run_id);

        for step in &self.steps {
            let _ = writeln!(
                out,
                "  {}. [{}] {} ({}.{}) {}ms",
                step.index + 1,
                step.status.label(),
                step.name,
                step.module,
                step.action,
                step.duration_ms
            );
            if let Some(ref call) = step.call {
                if self.dry_run {
                    let _ = writeln!(out, "     would execute: {call}");
                }
            }
            if let Some(ref output) = step.output {
                let summary = output.summary();
                if !summary.is_empty() {
                    let _ = writeln!(out, "     {summary}");
                }
            }
            if let Some(WaitOutcome::Confirmed(ref result)) = step.confirmation {
                let _ = writeln!(out, "     confirmed at height {}", result.height);
            }
            if let Some(ref failure) = step.failure {
                let _ = writeln!(out, "     error: {}", failure.message);
            }
        }

        for name in &self.not_attempted {
            let _ = writeln!(out, "  - [skipped] {name}");
        }

        let _ = writeln!(out);
        match (self.state, self.abort_reason) {
            (RunState::Completed, _) if self.success => {
                let _ = write!(out, "Completed: {} steps succeeded", self.steps.len());
            }
            (RunState::Completed, _) => {
                let _ = write!(
                    out,
                    "Completed with failures: {} of {} steps failed",
                    self.failed_count(),
                    self.steps.len()
                );
            }
            (RunState::Aborted, reason) => {
                let reason = match reason {
                    Some(AbortReason::Validation) => "validation failed",
                    Some(AbortReason::Halted) => "halted on error",
                    Some(AbortReason::Cancelled) => "cancelled",
                    None => "aborted",
                };
                let _ = write!(out, "Aborted ({reason})");
                if let Some(ref error) = self.error {
                    let _ = write!(out, ": {error}");
                }
            }
        }
        out.push('\n');
        out
    }
}
