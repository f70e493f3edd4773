//! Playbook execution engine.
//!
//! Validates every step against the action registry, then executes steps
//! strictly in order: resolve templates, prepare the call, dispatch it,
//! wait for confirmation of state changes, and bind registered outputs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::report::{AbortReason, ExecutionReport, FailureKind, RunState, StepResult, StepStatus};
use super::template::{self, TemplateError, VariableSet};
use super::waiter::{ConfirmationWaiter, WaitOutcome, DEFAULT_POLL_INTERVAL};
use super::{Playbook, Step};
use crate::actions::{ActionEnv, ActionRegistry, ActionSpec};
use crate::client::LedgerClient;
use crate::core::RunnerConfig;

/// Options fixed for the duration of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Prepare steps without dispatching them
    pub dry_run: bool,

    /// Keep going after a failing step
    pub continue_on_error: bool,

    /// How long to wait for each state change to be included
    pub confirm_timeout: Duration,

    /// Interval between inclusion polls
    pub poll_interval: Duration,

    /// Signer for steps without `from`
    pub signer: Option<String>,

    /// Variable overrides, applied over playbook defaults
    pub overrides: BTreeMap<String, String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            continue_on_error: false,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: DEFAULT_POLL_INTERVAL,
            signer: None,
            overrides: BTreeMap::new(),
        }
    }
}

impl RunOptions {
    /// Options taken from the `[runner]` config section.
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            continue_on_error: config.continue_on_error,
            confirm_timeout: config.confirm_timeout(),
            poll_interval: config.poll_interval(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn signer(mut self, signer: Option<String>) -> Self {
        self.signer = signer;
        self
    }

    /// Override a variable.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }
}

/// Runner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Loaded,
    Validating,
    Running,
    Completed,
    Aborted,
}

/// Executes playbooks against a ledger client.
pub struct PlaybookRunner {
    registry: Arc<ActionRegistry>,
    client: Arc<dyn LedgerClient>,
    options: RunOptions,
    cancel: CancellationToken,
    state: RunnerState,
}

impl PlaybookRunner {
    /// Create a runner with default options.
    pub fn new(registry: Arc<ActionRegistry>, client: Arc<dyn LedgerClient>) -> Self {
        Self {
            registry,
            client,
            options: RunOptions::default(),
            cancel: CancellationToken::new(),
            state: RunnerState::Loaded,
        }
    }

    /// Set run options.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this runner.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Resolve every step's action. Returns all failures, not just the first.
    pub fn validate(&self, playbook: &Playbook) -> Result<Vec<ActionSpec>, Vec<String>> {
        let mut specs = Vec::with_capacity(playbook.steps.len());
        let mut errors = Vec::new();

        for step in &playbook.steps {
            match self.registry.resolve(&step.module, &step.action) {
                Ok(spec) => specs.push(spec.clone()),
                Err(e) => errors.push(format!("step '{}': {e}", step.name)),
            }
        }

        if errors.is_empty() {
            Ok(specs)
        } else {
            Err(errors)
        }
    }

    /// Run a playbook to completion or until it stops early.
    pub async fn run(&mut self, playbook: &Playbook) -> ExecutionReport {
        let started = Instant::now();
        let mut report = ExecutionReport::new(&playbook.name, self.options.dry_run);

        self.state = RunnerState::Validating;
        tracing::debug!(playbook = %playbook.name, steps = playbook.steps.len(), "Validating playbook");

        let specs = match self.validate(playbook) {
            Ok(specs) => specs,
            Err(errors) => {
                tracing::warn!(playbook = %playbook.name, errors = errors.len(), "Playbook failed validation");
                report.abort(AbortReason::Validation, errors.join("; "));
                report.not_attempted = playbook.step_names();
                report.variables =
                    VariableSet::seeded(&playbook.variables, &self.options.overrides).to_map();
                report.finish(elapsed_ms(started));
                self.state = RunnerState::Aborted;
                return report;
            }
        };

        self.state = RunnerState::Running;
        let mut vars = VariableSet::seeded(&playbook.variables, &self.options.overrides);
        let env = ActionEnv { default_signer: self.options.signer.clone() };

        for (index, (step, spec)) in playbook.steps.iter().zip(&specs).enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(step = %step.name, "Run cancelled");
                report.abort(AbortReason::Cancelled, "run cancelled");
                report.not_attempted = remaining(playbook, index);
                break;
            }

            tracing::info!(step = %step.name, module = %step.module, action = %step.action, "Executing step");
            let mut result = self.execute_step(index, step, spec, &vars, &env).await;

            if let Some(ref name) = step.register {
                let value = match result.status {
                    StepStatus::Succeeded => result.primary_value(),
                    StepStatus::DryRun => Some(format!("<{name}>")),
                    _ => None,
                };
                if let Some(value) = value {
                    tracing::debug!(step = %step.name, variable = %name, "Registered output");
                    vars.set(name.clone(), value.clone());
                    result.registered = Some(value);
                }
            }

            let status = result.status;
            let message = result.failure.as_ref().map(|f| f.message.clone());
            report.steps.push(result);

            if status == StepStatus::Cancelled {
                report.abort(AbortReason::Cancelled, "run cancelled");
                report.not_attempted = remaining(playbook, index + 1);
                break;
            }

            if status.is_failure() {
                tracing::warn!(step = %step.name, status = status.label(), "Step failed");
                // A failing last step ends the sequence; nothing was cut short.
                let is_last = index + 1 == playbook.steps.len();
                if !self.options.continue_on_error && !is_last {
                    let detail = message.unwrap_or_else(|| status.label().to_string());
                    report.abort(AbortReason::Halted, format!("step '{}' failed: {detail}", step.name));
                    report.not_attempted = remaining(playbook, index + 1);
                    break;
                }
            }
        }

        report.variables = vars.to_map();
        report.finish(elapsed_ms(started));
        self.state = match report.state {
            RunState::Completed => RunnerState::Completed,
            RunState::Aborted => RunnerState::Aborted,
        };

        tracing::info!(
            playbook = %playbook.name,
            success = report.success,
            steps = report.steps.len(),
            duration_ms = report.duration_ms,
            "Playbook finished"
        );
        report
    }

    /// Execute a single step. Failures are recorded, never returned.
    async fn execute_step(
        &self,
        index: usize,
        step: &Step,
        spec: &ActionSpec,
        vars: &VariableSet,
        env: &ActionEnv,
    ) -> StepResult {
        let started = Instant::now();
        let mut result = StepResult::new(index, &step.name, &step.module, &step.action);
        result.kind = Some(spec.kind);

        self.dispatch_step(step, spec, vars, env, &mut result).await;

        result.duration_ms = elapsed_ms(started);
        result
    }

    async fn dispatch_step(
        &self,
        step: &Step,
        spec: &ActionSpec,
        vars: &VariableSet,
        env: &ActionEnv,
        result: &mut StepResult,
    ) {
        let params = match template::resolve_params(&step.params, vars) {
            Ok(params) => params,
            Err(e) => {
                let kind = match e {
                    TemplateError::UndefinedVariable(_) => FailureKind::UndefinedVariable,
                    TemplateError::InvalidPlaceholder(_) => FailureKind::Validation,
                };
                result.fail(StepStatus::Failed, kind, e.to_string());
                return;
            }
        };

        let call = match spec.prepare(&params, env) {
            Ok(call) => call,
            Err(e) => {
                result.fail(StepStatus::Failed, FailureKind::Validation, e.to_string());
                return;
            }
        };
        result.call = Some(call.describe());

        if self.options.dry_run {
            tracing::info!(step = %step.name, call = %call.describe(), "Would execute");
            result.status = StepStatus::DryRun;
            return;
        }

        let output = match call.dispatch(self.client.as_ref()).await {
            Ok(output) => output,
            Err(e) => {
                let kind =
                    if e.is_validation() { FailureKind::Validation } else { FailureKind::Transport };
                result.fail(StepStatus::Failed, kind, e.to_string());
                return;
            }
        };

        let Some(id) = output.submission().cloned() else {
            result.output = Some(output);
            return;
        };
        result.output = Some(output);
        result.submission = Some(id.clone());

        let outcome = ConfirmationWaiter::new(Arc::clone(&self.client))
            .poll_interval(self.options.poll_interval)
            .wait(&id, self.options.confirm_timeout, &self.cancel)
            .await;

        match outcome {
            WaitOutcome::Confirmed(_) => {}
            WaitOutcome::Rejected(ref reason) => {
                result.fail(StepStatus::Rejected, FailureKind::Rejected, reason.clone());
            }
            WaitOutcome::TimedOut => result.fail(
                StepStatus::TimedOut,
                FailureKind::TimedOut,
                format!(
                    "no confirmation for {id} within {}s",
                    self.options.confirm_timeout.as_secs_f64()
                ),
            ),
            WaitOutcome::Cancelled => result.fail(
                StepStatus::Cancelled,
                FailureKind::Cancelled,
                format!("cancelled while waiting for {id}"),
            ),
        }
        result.confirmation = Some(outcome);
    }
}

fn remaining(playbook: &Playbook, from: usize) -> Vec<String> {
    playbook.steps.iter().skip(from).map(|s| s.name.clone()).collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
