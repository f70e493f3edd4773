//! Playbook Integration Tests
//!
//! Loads playbooks from disk and runs them end-to-end against the scripted
//! client.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ledgerbook::actions::ActionRegistry;
use ledgerbook::client::mock::MockClient;
use ledgerbook::client::LedgerClient;
use ledgerbook::playbook::{
    discover_playbooks, locate_playbook, parse_playbook, AbortReason, PlaybookError,
    PlaybookRunner, RunOptions, RunState, StepStatus,
};
use tempfile::TempDir;

const ONBOARD: &str = r#"
name: onboard
description: Create a key, fund it and stake from it
variables:
  amount: 1000ukex
  validator: kexvaloper1abc
steps:
  - name: create-key
    module: keys
    action: add
    params:
      name: carol
    register: carol
  - name: fund
    module: bank
    action: send
    params:
      from: treasury
      to: "{{ carol }}"
      amount: "{{ amount }}"
  - name: stake
    module: staking
    action: delegate
    params:
      from: carol
      validator: "{{validator}}"
      amount: 500ukex
  - name: check
    module: bank
    action: balance
    params:
      address: "{{ carol }}"
      denom: ukex
    register: remaining
"#;

fn write(dir: &Path, relative: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn scripted_client() -> Arc<MockClient> {
    Arc::new(
        MockClient::new()
            .with_query(
                "keys",
                "add",
                serde_json::json!({"name": "carol", "type": "local", "address": "kex1carol"}),
            )
            .with_query(
                "bank",
                "balance",
                serde_json::json!({"balance": {"denom": "ukex", "amount": "500"}}),
            ),
    )
}

fn runner(client: &Arc<MockClient>, options: RunOptions) -> PlaybookRunner {
    let client: Arc<dyn LedgerClient> = client.clone();
    PlaybookRunner::new(ActionRegistry::shared(), client)
        .with_options(options.poll_interval(Duration::from_millis(10)))
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_parse_yaml_file() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "onboard.yaml", ONBOARD);

    let playbook = parse_playbook(&path).unwrap();
    assert_eq!(playbook.name, "onboard");
    assert_eq!(playbook.steps.len(), 4);
    assert_eq!(playbook.steps[0].register.as_deref(), Some("carol"));
}

#[test]
fn test_parse_json_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "inflation.json",
        r#"{"name": "inflation", "steps": [{"name": "read", "module": "mint", "action": "inflation"}]}"#,
    );

    let playbook = parse_playbook(&path).unwrap();
    assert_eq!(playbook.steps[0].target(), "mint.inflation");
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    let err = parse_playbook(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, PlaybookError::Read { .. }));
}

#[test]
fn test_discover_skips_broken_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".ledgerbook/playbooks/onboard.yaml", ONBOARD);
    write(dir.path(), "playbooks/broken.yml", "name: [unclosed");
    write(dir.path(), "playbooks/notes.txt", "not a playbook");
    write(
        dir.path(),
        "playbooks/supply.yml",
        "name: supply\nsteps:\n  - name: total\n    module: bank\n    action: total-supply\n",
    );

    let found = discover_playbooks(dir.path());
    let names: Vec<_> = found.iter().map(|(name, _, _)| name.as_str()).collect();
    assert_eq!(names, vec!["onboard", "supply"]);
}

#[test]
fn test_locate_by_path_and_name() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "playbooks/setup.yaml", ONBOARD);

    let (found, playbook) = locate_playbook(dir.path(), path.to_str().unwrap()).unwrap();
    assert_eq!(found, path);
    assert_eq!(playbook.name, "onboard");

    // File stem and playbook name both work
    assert!(locate_playbook(dir.path(), "setup").is_ok());
    assert!(locate_playbook(dir.path(), "onboard").is_ok());

    let err = locate_playbook(dir.path(), "missing").unwrap_err();
    assert!(matches!(err, PlaybookError::NotFound(_)));
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_full_run_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "onboard.yaml", ONBOARD);
    let playbook = parse_playbook(&path).unwrap();
    let client = scripted_client();

    let report = runner(&client, RunOptions::default()).run(&playbook).await;

    assert!(report.success, "{}", report.render_text());
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.steps.len(), 4);
    assert!(report.steps.iter().all(|s| s.status == StepStatus::Succeeded));
    assert_eq!(report.variables.get("carol").map(String::as_str), Some("kex1carol"));
    assert_eq!(report.variables.get("remaining").map(String::as_str), Some("500"));

    let submits = client.submit_calls();
    let targets: Vec<_> = submits
        .iter()
        .map(|(domain, op, signer, _)| (domain.as_str(), op.as_str(), signer.as_str()))
        .collect();
    assert_eq!(targets, vec![("bank", "send", "treasury"), ("staking", "delegate", "carol")]);
    assert_eq!(submits[0].3.positional, vec!["treasury", "kex1carol", "1000ukex"]);
    assert_eq!(client.poll_count(), 2);
}

#[tokio::test]
async fn test_override_changes_amount() {
    let dir = TempDir::new().unwrap();
    let playbook = parse_playbook(&write(dir.path(), "onboard.yaml", ONBOARD)).unwrap();
    let client = scripted_client();

    let report =
        runner(&client, RunOptions::default().var("amount", "42ukex")).run(&playbook).await;

    assert!(report.success);
    assert_eq!(client.submit_calls()[0].3.positional[2], "42ukex");
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let playbook = parse_playbook(&write(dir.path(), "onboard.yaml", ONBOARD)).unwrap();
    let client = scripted_client();

    let report = runner(&client, RunOptions::default().dry_run(true)).run(&playbook).await;

    assert!(report.success, "{}", report.render_text());
    assert!(report.dry_run);
    assert!(report.steps.iter().all(|s| s.status == StepStatus::DryRun));
    assert!(client.calls().is_empty());
    assert_eq!(
        report.steps[1].call.as_deref(),
        Some("tx bank send treasury <carol> 1000ukex --from=treasury")
    );
}

#[tokio::test]
async fn test_halt_leaves_later_steps_unattempted() {
    let dir = TempDir::new().unwrap();
    let playbook = parse_playbook(&write(dir.path(), "onboard.yaml", ONBOARD)).unwrap();
    let client = Arc::new(MockClient::new().rejects("out of gas"));

    let report = runner(&client, RunOptions::default()).run(&playbook).await;

    // keys add is unscripted, so the first step already fails
    assert!(!report.success);
    assert_eq!(report.abort_reason, Some(AbortReason::Halted));
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.not_attempted, vec!["fund", "stake", "check"]);
}

#[tokio::test]
async fn test_report_serializes() {
    let dir = TempDir::new().unwrap();
    let playbook = parse_playbook(&write(dir.path(), "onboard.yaml", ONBOARD)).unwrap();
    let client = scripted_client();

    let report = runner(&client, RunOptions::default()).run(&playbook).await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["playbook"], "onboard");
    assert_eq!(json["state"], "completed");
    assert_eq!(json["steps"][1]["status"], "succeeded");
    assert_eq!(json["steps"][1]["kind"], "transaction");

    let yaml = serde_yaml::to_string(&report).unwrap();
    assert!(yaml.contains("playbook: onboard"));
}
