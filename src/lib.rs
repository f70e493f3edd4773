//! # Ledgerbook
//!
//! Playbook execution engine for a ledger node CLI.
//!
//! A playbook is a named, ordered list of ledger operations written in YAML
//! or JSON, with `{{ variable }}` placeholders in step parameters. Ledgerbook
//! validates the whole playbook against a static registry of typed action
//! adapters, runs the steps in order, waits for on-chain confirmation of
//! every state change, and produces a structured execution report.
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a playbook without touching the network
//! ledgerbook validate playbooks/stake.yaml
//!
//! # Show what would be executed
//! ledgerbook run stake --dry-run --var amount=10ukex
//!
//! # Run it
//! ledgerbook run stake --from validator
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::large_enum_variant)]

pub mod actions;
pub mod client;
pub mod core;
pub mod playbook;

// Re-export commonly used types
pub use actions::{ActionError, ActionRegistry};
pub use client::{CliTransport, LedgerClient};
pub use core::Config;
pub use playbook::{ExecutionReport, Playbook, PlaybookRunner, RunOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ledgerbook";
