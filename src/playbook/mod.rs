//! Playbook engine.
//!
//! Playbooks are YAML or JSON files that describe a named, ordered sequence
//! of ledger operations with templated parameters. The runner validates the
//! whole playbook against the action registry before anything executes,
//! then runs the steps in order and produces an [`ExecutionReport`].

mod parser;
mod report;
mod runner;
mod schema;
pub mod template;
mod waiter;

pub use parser::{
    discover_playbooks, lint_variables, locate_playbook, parse_playbook, parse_playbook_str,
    validate_playbook, VariableWarning,
};
pub use report::{
    AbortReason, ExecutionReport, FailureKind, RunState, StepFailure, StepResult, StepStatus,
};
pub use runner::{PlaybookRunner, RunOptions, RunnerState};
pub use schema::{Playbook, Step};
pub use template::{TemplateError, VariableSet};
pub use waiter::{ConfirmationWaiter, WaitOutcome, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a playbook.
#[derive(Debug, Error)]
pub enum PlaybookError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or shape error.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Structurally invalid playbook.
    #[error("{0}")]
    Invalid(String),

    /// No playbook matches a name.
    #[error("playbook '{0}' not found")]
    NotFound(String),
}
