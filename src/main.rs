//! Ledgerbook - playbook runner for ledger node CLIs.
//!
//! Loads a playbook, validates it against the built-in action registry,
//! and runs it through the node binary, waiting for every transaction to be
//! confirmed.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ledgerbook::actions::ActionRegistry;
use ledgerbook::client::CliTransport;
use ledgerbook::playbook::{
    discover_playbooks, lint_variables, locate_playbook, ExecutionReport, PlaybookRunner,
    RunOptions,
};
use ledgerbook::Config;

/// Run ledger playbooks against a node
#[derive(Parser)]
#[command(name = "ledgerbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./.ledgerbook.toml, then the user config)
    #[arg(long, global = true, env = "LEDGERBOOK_CONFIG")]
    config: Option<String>,
}

/// Output format for reports and listings.
#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a playbook
    Run {
        /// Playbook file, or name of a discovered playbook
        playbook: String,

        /// Variable override (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Validate and resolve every step without calling the node
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Keep going after a failing step
        #[arg(long)]
        continue_on_error: bool,

        /// Seconds to wait for each transaction to be confirmed
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Key that signs steps without their own `from`
        #[arg(long, env = "LEDGERBOOK_FROM")]
        from: Option<String>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Check a playbook without touching the network
    Validate {
        /// Playbook file, or name of a discovered playbook
        playbook: String,

        /// Variable override (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },

    /// List discovered playbooks
    List {
        /// Project directory to search
        #[arg(long, default_value = ".")]
        path: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List available actions
    Actions {
        /// Only show one module
        #[arg(short, long)]
        module: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_env("LEDGERBOOK_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let ok = match cli.command {
        Commands::Run { playbook, vars, dry_run, continue_on_error, timeout, from, format } => {
            let config = load_config(cli.config.as_deref())?;
            let args = RunArgs { vars, dry_run, continue_on_error, timeout, from, format };
            cmd_run(&playbook, args, config)?
        }
        Commands::Validate { playbook, vars } => cmd_validate(&playbook, &vars)?,
        Commands::List { path, format } => {
            cmd_list(&path, format)?;
            true
        }
        Commands::Actions { module, format } => cmd_actions(module.as_deref(), format)?,
        Commands::Completions { shell } => {
            cmd_completions(shell);
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Parse a `NAME=VALUE` override.
fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (name, value) =
        raw.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let path = PathBuf::from(shellexpand::tilde(path).as_ref());
            Config::load_from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Config::load(),
    }
}

/// Options of the `run` command.
struct RunArgs {
    vars: Vec<(String, String)>,
    dry_run: bool,
    continue_on_error: bool,
    timeout: Option<u64>,
    from: Option<String>,
    format: OutputFormat,
}

/// Run a playbook. Returns whether the run succeeded.
fn cmd_run(reference: &str, args: RunArgs, config: Config) -> Result<bool> {
    let cwd = std::env::current_dir()?;
    let (path, playbook) = locate_playbook(&cwd, reference)?;
    tracing::debug!(path = %path.display(), "Loaded playbook");

    // Flag > config > default
    let mut options = RunOptions::from_config(&config.runner)
        .dry_run(args.dry_run)
        .continue_on_error(args.continue_on_error || config.runner.continue_on_error)
        .signer(args.from.or_else(|| config.signing.default_key.clone()));
    if let Some(secs) = args.timeout {
        options = options.confirm_timeout(Duration::from_secs(secs));
    }
    for (name, value) in args.vars {
        options = options.var(name, value);
    }

    for warning in lint_variables(&playbook, &options.overrides) {
        tracing::warn!(step = %warning.step, variable = %warning.variable, "Variable is never bound");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupted, stopping after the current step");
        interrupt.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let transport = CliTransport::new(config.node, config.tx);
    let mut runner = PlaybookRunner::new(ActionRegistry::shared(), Arc::new(transport))
        .with_options(options)
        .with_cancellation(cancel);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let report = runtime.block_on(runner.run(&playbook));

    print_report(&report, args.format)?;
    Ok(report.success)
}

fn print_report(report: &ExecutionReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(report)?),
    }
    Ok(())
}

/// Validate a playbook: structure, action resolution, required parameters
/// and variable scope.
fn cmd_validate(reference: &str, vars: &[(String, String)]) -> Result<bool> {
    let cwd = std::env::current_dir()?;
    let (path, playbook) = locate_playbook(&cwd, reference)?;
    let registry = ActionRegistry::shared();

    println!("Playbook: {} ({})", playbook.name, path.display());
    if let Some(ref desc) = playbook.description {
        println!("Description: {desc}");
    }
    println!("Steps: {}\n", playbook.steps.len());

    let mut errors = 0;
    for (i, step) in playbook.steps.iter().enumerate() {
        match registry.resolve(&step.module, &step.action) {
            Ok(spec) => {
                let missing: Vec<&str> = spec
                    .required
                    .iter()
                    .copied()
                    .filter(|name| !step.params.contains_key(*name))
                    .collect();
                if missing.is_empty() {
                    println!("  {}. {} ({}) [{}]", i + 1, step.name, step.target(), spec.kind);
                } else {
                    errors += 1;
                    println!(
                        "  {}. {} ({}) missing parameters: {}",
                        i + 1,
                        step.name,
                        step.target(),
                        missing.join(", ")
                    );
                }
                for name in step.params.keys() {
                    if !spec.parameter_names().any(|known| known == name.as_str()) {
                        println!("     warning: unused parameter '{name}'");
                    }
                }
            }
            Err(e) => {
                errors += 1;
                println!("  {}. {} {e}", i + 1, step.name);
            }
        }
    }

    let overrides: BTreeMap<String, String> = vars.iter().cloned().collect();
    let warnings = lint_variables(&playbook, &overrides);
    for warning in &warnings {
        println!("  warning: step '{}' uses unbound variable '{}'", warning.step, warning.variable);
    }

    if errors == 0 {
        println!("\nPlaybook is valid ({} warnings)", warnings.len());
    } else {
        println!("\n{errors} errors");
    }
    Ok(errors == 0)
}

/// List discovered playbooks.
fn cmd_list(path: &str, format: OutputFormat) -> Result<()> {
    let dir = PathBuf::from(shellexpand::tilde(path).as_ref());
    let playbooks = discover_playbooks(&dir);

    let entries: Vec<_> = playbooks
        .iter()
        .map(|(name, file, playbook)| {
            serde_json::json!({
                "name": name,
                "title": playbook.name,
                "description": playbook.description,
                "steps": playbook.steps.len(),
                "path": display_path(&dir, file),
            })
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&entries)?),
        OutputFormat::Text => {
            for (name, file, playbook) in &playbooks {
                println!(
                    "{name} - {} ({} steps) {}",
                    playbook.description.as_deref().unwrap_or(&playbook.name),
                    playbook.steps.len(),
                    display_path(&dir, file)
                );
            }
            println!("\nTotal: {} playbooks", playbooks.len());
        }
    }

    Ok(())
}

fn display_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}

/// List registered actions.
fn cmd_actions(module: Option<&str>, format: OutputFormat) -> Result<bool> {
    let registry = ActionRegistry::shared();
    let specs: Vec<_> = match module {
        Some(module) => registry.module(module).collect(),
        None => registry.all().collect(),
    };

    if specs.is_empty() {
        if let Some(module) = module {
            eprintln!("Unknown module '{module}'. Modules: {}", registry.modules().join(", "));
            return Ok(false);
        }
    }

    match format {
        OutputFormat::Text => {
            for spec in &specs {
                println!("{}.{} [{}] - {}", spec.module, spec.action, spec.kind, spec.summary);
                if !spec.required.is_empty() {
                    println!("    required: {}", spec.required.join(", "));
                }
                if !spec.optional.is_empty() {
                    println!("    optional: {}", spec.optional.join(", "));
                }
            }
            println!("\nTotal: {} actions", specs.len());
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            let entries: Vec<_> = specs
                .iter()
                .map(|spec| {
                    serde_json::json!({
                        "module": spec.module,
                        "action": spec.action,
                        "kind": spec.kind,
                        "summary": spec.summary,
                        "required": spec.required,
                        "optional": spec.optional,
                    })
                })
                .collect();
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", serde_yaml::to_string(&entries)?);
            }
        }
    }

    Ok(true)
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "ledgerbook", &mut io::stdout());
}
