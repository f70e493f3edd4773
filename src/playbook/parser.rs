//! Playbook parser.
//!
//! Parses YAML or JSON playbook files into [`Playbook`] values and checks
//! them for structural errors.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::template;
use super::{Playbook, PlaybookError};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("valid identifier regex"));

/// Extensions recognized during discovery.
const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Parse a playbook from a file. `.json` files are read as JSON, anything
/// else as YAML.
pub fn parse_playbook(path: &Path) -> Result<Playbook, PlaybookError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| PlaybookError::Read { path: path.to_path_buf(), source })?;

    let playbook: Playbook = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    validate_playbook(&playbook)?;
    Ok(playbook)
}

/// Parse a playbook from a YAML (or JSON) string.
pub fn parse_playbook_str(content: &str) -> Result<Playbook, PlaybookError> {
    let playbook: Playbook = serde_yaml::from_str(content)?;
    validate_playbook(&playbook)?;
    Ok(playbook)
}

/// Validate a playbook for structural errors.
pub fn validate_playbook(playbook: &Playbook) -> Result<(), PlaybookError> {
    if playbook.name.trim().is_empty() {
        return Err(PlaybookError::Invalid("playbook name cannot be empty".to_string()));
    }

    if playbook.steps.is_empty() {
        return Err(PlaybookError::Invalid("playbook must have at least one step".to_string()));
    }

    let mut seen = BTreeSet::new();
    for (i, step) in playbook.steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            return Err(PlaybookError::Invalid(format!("step {} has no name", i + 1)));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(PlaybookError::Invalid(format!("duplicate step name '{}'", step.name)));
        }
        if step.module.trim().is_empty() {
            return Err(PlaybookError::Invalid(format!("step '{}' has no module", step.name)));
        }
        if step.action.trim().is_empty() {
            return Err(PlaybookError::Invalid(format!("step '{}' has no action", step.name)));
        }
        if let Some(ref register) = step.register {
            if !IDENTIFIER.is_match(register) {
                return Err(PlaybookError::Invalid(format!(
                    "step '{}' registers invalid variable name '{register}'",
                    step.name
                )));
            }
        }
    }

    Ok(())
}

/// A placeholder that nothing in scope can bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableWarning {
    /// Step containing the placeholder
    pub step: String,

    /// Unbound variable name
    pub variable: String,
}

/// Report placeholders that no default, override, or earlier `register`
/// binds. These fail at run time with an undefined variable error.
pub fn lint_variables(
    playbook: &Playbook,
    overrides: &BTreeMap<String, String>,
) -> Vec<VariableWarning> {
    let mut known: BTreeSet<&str> =
        playbook.variables.keys().chain(overrides.keys()).map(String::as_str).collect();
    let mut warnings = Vec::new();

    for step in &playbook.steps {
        let mut reported = BTreeSet::new();
        for value in step.params.values() {
            for name in template::value_placeholders(value) {
                if !known.contains(name.as_str()) && reported.insert(name.clone()) {
                    tracing::debug!(step = %step.name, variable = %name, "Unbound variable");
                    warnings.push(VariableWarning { step: step.name.clone(), variable: name });
                }
            }
        }
        if let Some(ref register) = step.register {
            known.insert(register.as_str());
        }
    }

    warnings
}

/// Discover playbooks under a project directory.
///
/// Looks in `.ledgerbook/playbooks/` and `playbooks/`. Files that fail to
/// parse are logged and skipped.
pub fn discover_playbooks(dir: &Path) -> Vec<(String, PathBuf, Playbook)> {
    let mut playbooks = Vec::new();

    for candidate in [dir.join(".ledgerbook").join("playbooks"), dir.join("playbooks")] {
        if candidate.is_dir() {
            playbooks.extend(scan_playbook_dir(&candidate));
        }
    }

    playbooks
}

/// Scan a directory for playbook files, sorted by file name.
fn scan_playbook_dir(dir: &Path) -> Vec<(String, PathBuf, Playbook)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e))
        })
        .collect();
    paths.sort();

    let mut playbooks = Vec::new();
    for path in paths {
        match parse_playbook(&path) {
            Ok(playbook) => {
                let name =
                    path.file_stem().and_then(|n| n.to_str()).unwrap_or("unknown").to_string();
                playbooks.push((name, path, playbook));
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to parse playbook");
            }
        }
    }

    playbooks
}

/// Find a playbook by path, or by name among the discovered ones.
pub fn locate_playbook(dir: &Path, reference: &str) -> Result<(PathBuf, Playbook), PlaybookError> {
    let expanded = PathBuf::from(shellexpand::tilde(reference).as_ref());
    if expanded.is_file() {
        let playbook = parse_playbook(&expanded)?;
        return Ok((expanded, playbook));
    }

    discover_playbooks(dir)
        .into_iter()
        .find(|(name, _, playbook)| name == reference || playbook.name == reference)
        .map(|(_, path, playbook)| (path, playbook))
        .ok_or_else(|| PlaybookError::NotFound(reference.to_string()))
}
