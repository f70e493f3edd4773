//! Core configuration for Ledgerbook.
//!
//! The configuration is loaded once by the binary and passed explicitly to
//! the transport and the runner.

mod config;

pub use config::{Config, NodeConfig, RunnerConfig, SigningConfig, TxConfig};
