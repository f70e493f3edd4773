//! Transport that drives the node daemon binary.
//!
//! Queries run `<binary> query <domain> <operation> ...`, state changes run
//! `<binary> tx <domain> <operation> ... --from <signer> --yes`, and
//! keyring operations run `<binary> keys <operation> ...`. Everything is
//! requested with `--output=json`. When a container is configured the
//! binary runs through `docker exec`.

use async_trait::async_trait;
use tokio::process::Command as ProcessCommand;

use super::{ClientError, LedgerClient, OperationArgs, SubmissionId, TxResponse, TxStatus};
use crate::core::{NodeConfig, TxConfig};

/// Domain handled by the local keyring rather than the chain.
const KEYRING_DOMAIN: &str = "keys";

/// [`LedgerClient`] backed by the node CLI.
#[derive(Debug, Clone)]
pub struct CliTransport {
    node: NodeConfig,
    tx: TxConfig,
}

impl CliTransport {
    /// Create a transport from configuration.
    pub fn new(node: NodeConfig, tx: TxConfig) -> Self {
        Self { node, tx }
    }

    /// Build the argument vector for a query (or keyring operation).
    pub fn query_argv(&self, domain: &str, operation: &str, args: &OperationArgs) -> Vec<String> {
        let mut argv = Vec::new();
        if domain == KEYRING_DOMAIN {
            argv.extend([KEYRING_DOMAIN.to_string(), operation.to_string()]);
            argv.extend(args.positional.iter().cloned());
            argv.extend(render_flags(args));
            argv.push(format!("--keyring-backend={}", self.node.keyring_backend));
            if let Some(ref home) = self.node.home {
                argv.push(format!("--home={home}"));
            }
        } else {
            argv.extend(["query".to_string(), domain.to_string()]);
            // Top-level queries such as `query tx <hash>` name themselves once.
            if operation != domain {
                argv.push(operation.to_string());
            }
            argv.extend(args.positional.iter().cloned());
            argv.extend(render_flags(args));
            if let Some(ref node) = self.node.node {
                argv.push(format!("--node={node}"));
            }
        }
        argv.push("--output=json".to_string());
        argv
    }

    /// Build the argument vector for a signed transaction.
    pub fn submit_argv(
        &self,
        domain: &str,
        operation: &str,
        signer: &str,
        args: &OperationArgs,
    ) -> Vec<String> {
        let mut argv = vec!["tx".to_string(), domain.to_string(), operation.to_string()];
        argv.extend(args.positional.iter().cloned());
        argv.extend(render_flags(args));
        argv.push(format!("--from={signer}"));
        argv.push("--yes".to_string());
        argv.push(format!("--gas={}", self.tx.gas));
        if let Some(adjustment) = self.tx.gas_adjustment {
            argv.push(format!("--gas-adjustment={adjustment}"));
        }
        if let Some(ref fees) = self.tx.fees {
            argv.push(format!("--fees={fees}"));
        }
        if let Some(ref chain_id) = self.node.chain_id {
            argv.push(format!("--chain-id={chain_id}"));
        }
        if let Some(ref node) = self.node.node {
            argv.push(format!("--node={node}"));
        }
        argv.push(format!("--keyring-backend={}", self.node.keyring_backend));
        if let Some(ref home) = self.node.home {
            argv.push(format!("--home={home}"));
        }
        argv.push("--output=json".to_string());
        argv
    }

    /// Build the argument vector for an inclusion lookup.
    pub fn poll_argv(&self, id: &SubmissionId) -> Vec<String> {
        let mut argv = vec!["query".to_string(), "tx".to_string(), id.to_string()];
        if let Some(ref node) = self.node.node {
            argv.push(format!("--node={node}"));
        }
        argv.push("--output=json".to_string());
        argv
    }

    /// Run the node binary and return its stdout.
    async fn run(&self, argv: &[String]) -> Result<String, ClientError> {
        let mut cmd = match self.node.container {
            Some(ref container) => {
                let mut cmd = ProcessCommand::new("docker");
                cmd.arg("exec").arg(container).arg(&self.node.binary);
                cmd
            }
            None => ProcessCommand::new(&self.node.binary),
        };
        cmd.args(argv);
        cmd.kill_on_drop(true);

        tracing::debug!(binary = %self.node.binary, args = ?argv, "Running node command");

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ClientError::CommandFailed {
                code: output.status.code(),
                stderr: if stderr.is_empty() { stdout.trim().to_string() } else { stderr },
            });
        }

        Ok(stdout)
    }
}

/// Render keyed arguments as `--name=value`.
fn render_flags(args: &OperationArgs) -> impl Iterator<Item = String> + '_ {
    args.flags.iter().map(|(k, v)| format!("--{k}={v}"))
}

/// Parse JSON output; empty output decodes as null.
fn parse_json(stdout: &str) -> Result<serde_json::Value, ClientError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(trimmed).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Whether a failed lookup means the transaction is simply not indexed yet.
fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("not found") || lower.contains("no transaction")
}

#[async_trait]
impl LedgerClient for CliTransport {
    async fn query(
        &self,
        domain: &str,
        operation: &str,
        args: &OperationArgs,
    ) -> Result<serde_json::Value, ClientError> {
        let stdout = self.run(&self.query_argv(domain, operation, args)).await?;
        parse_json(&stdout)
    }

    async fn submit(
        &self,
        domain: &str,
        operation: &str,
        signer: &str,
        args: &OperationArgs,
    ) -> Result<SubmissionId, ClientError> {
        let stdout = self.run(&self.submit_argv(domain, operation, signer, args)).await?;
        let response: TxResponse =
            serde_json::from_value(parse_json(&stdout)?).map_err(|e| ClientError::Decode(e.to_string()))?;

        if response.code != 0 {
            return Err(ClientError::Broadcast { code: response.code, log: response.raw_log });
        }
        if response.txhash.is_empty() {
            return Err(ClientError::Decode("broadcast response has no txhash".to_string()));
        }

        tracing::info!(txhash = %response.txhash, domain, operation, "Transaction broadcast");
        Ok(SubmissionId::new(response.txhash))
    }

    async fn poll_status(&self, id: &SubmissionId) -> Result<TxStatus, ClientError> {
        match self.run(&self.poll_argv(id)).await {
            Ok(stdout) => {
                let response: TxResponse = serde_json::from_value(parse_json(&stdout)?)
                    .map_err(|e| ClientError::Decode(e.to_string()))?;
                Ok(response.status())
            }
            Err(ClientError::CommandFailed { ref stderr, .. }) if is_not_found(stderr) => {
                Ok(TxStatus::Pending)
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> CliTransport {
        let node = NodeConfig {
            chain_id: Some("kex-1".to_string()),
            node: Some("tcp://localhost:26657".to_string()),
            ..NodeConfig::default()
        };
        CliTransport::new(node, TxConfig::default())
    }

    #[test]
    fn test_query_argv() {
        let args = OperationArgs::new().arg("kex1abc").flag("limit", "10");
        let argv = transport().query_argv("bank", "balances", &args);

        assert_eq!(
            argv,
            vec![
                "query",
                "bank",
                "balances",
                "kex1abc",
                "--limit=10",
                "--node=tcp://localhost:26657",
                "--output=json"
            ]
        );
    }

    #[test]
    fn test_keyring_argv_skips_query_prefix() {
        let argv = transport().query_argv("keys", "add", &OperationArgs::new().arg("alice"));

        assert_eq!(argv[..3], ["keys", "add", "alice"]);
        assert!(argv.contains(&"--keyring-backend=test".to_string()));
        assert!(!argv.iter().any(|a| a.starts_with("--node")));
    }

    #[test]
    fn test_submit_argv() {
        let args = OperationArgs::new().arg("kexvaloper1x").arg("5ukex");
        let argv = transport().submit_argv("staking", "delegate", "alice", &args);

        assert_eq!(argv[..5], ["tx", "staking", "delegate", "kexvaloper1x", "5ukex"]);
        assert!(argv.contains(&"--from=alice".to_string()));
        assert!(argv.contains(&"--yes".to_string()));
        assert!(argv.contains(&"--chain-id=kex-1".to_string()));
        assert!(argv.contains(&"--gas=auto".to_string()));
        assert_eq!(argv.last().map(String::as_str), Some("--output=json"));
    }

    #[test]
    fn test_top_level_query_argv() {
        let argv = transport().query_argv("tx", "tx", &OperationArgs::new().arg("ABCD"));
        assert_eq!(argv[..3], ["query", "tx", "ABCD"]);
    }

    #[test]
    fn test_poll_argv() {
        let argv = transport().poll_argv(&SubmissionId::new("ABCD"));
        assert_eq!(argv[..3], ["query", "tx", "ABCD"]);
    }

    #[test]
    fn test_parse_json_empty_is_null() {
        assert_eq!(parse_json("  \n").unwrap(), serde_json::Value::Null);
        assert!(parse_json("not json").is_err());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("Error: tx (ABCD) not found"));
        assert!(!is_not_found("connection refused"));
    }
}
