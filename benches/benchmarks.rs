//! Performance benchmarks for Ledgerbook.
//!
//! This module contains benchmarks for:
//! - Template resolution over strings and parameter maps
//! - Registry lookup and adapter preparation
//! - Playbook parsing
//!
//! Run with: `cargo bench`

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ledgerbook::actions::{ActionEnv, ActionRegistry, ParamValue, Params};
use ledgerbook::playbook::template::{resolve_params, resolve_str};
use ledgerbook::playbook::{parse_playbook_str, VariableSet};

// ============================================================================
// Fixtures
// ============================================================================

mod fixtures {
    use super::*;

    /// A variable set with `count` entries named `var0`, `var1`, ...
    pub fn variables(count: usize) -> VariableSet {
        let mut vars = VariableSet::new();
        for i in 0..count {
            vars.set(format!("var{i}"), format!("value-{i}"));
        }
        vars
    }

    /// A string with `count` placeholders separated by literal text.
    pub fn template(count: usize) -> String {
        (0..count).map(|i| format!("prefix {{{{ var{i} }}}} ")).collect()
    }

    /// Raw step parameters, half of them templated.
    pub fn raw_params(count: usize) -> BTreeMap<String, ParamValue> {
        (0..count)
            .map(|i| {
                let value = if i % 2 == 0 {
                    ParamValue::Text(format!("{{{{ var{i} }}}}"))
                } else {
                    ParamValue::Text(format!("literal-{i}"))
                };
                (format!("param{i}"), value)
            })
            .collect()
    }

    /// A playbook with `steps` bank sends.
    pub fn playbook_yaml(steps: usize) -> String {
        let mut yaml = String::from("name: bench\nvariables:\n  amount: 1ukex\nsteps:\n");
        for i in 0..steps {
            yaml.push_str(&format!(
                "  - name: send-{i}\n    module: bank\n    action: send\n    params:\n      \
                 from: treasury\n      to: kex1recipient{i}\n      amount: \"{{{{ amount }}}}\"\n"
            ));
        }
        yaml
    }
}

// ============================================================================
// Template Benchmarks
// ============================================================================

fn bench_resolve_str(c: &mut Criterion) {
    let mut group = c.benchmark_group("template/resolve_str");
    let vars = fixtures::variables(64);

    for count in [1, 8, 64] {
        let raw = fixtures::template(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &raw, |b, raw| {
            b.iter(|| resolve_str(black_box(raw), &vars));
        });
    }

    group.bench_function("no_placeholders", |b| {
        b.iter(|| resolve_str(black_box("1000ukex"), &vars));
    });

    group.finish();
}

fn bench_resolve_params(c: &mut Criterion) {
    let mut group = c.benchmark_group("template/resolve_params");
    let vars = fixtures::variables(64);

    for count in [4, 16, 64] {
        let raw = fixtures::raw_params(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &raw, |b, raw| {
            b.iter(|| resolve_params(black_box(raw), &vars));
        });
    }

    group.finish();
}

// ============================================================================
// Registry Benchmarks
// ============================================================================

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    let registry = ActionRegistry::shared();
    let env = ActionEnv { default_signer: Some("treasury".to_string()) };

    group.bench_function("build", |b| {
        b.iter(ActionRegistry::builtin);
    });

    group.bench_function("resolve", |b| {
        b.iter(|| registry.resolve(black_box("staking"), black_box("delegate")));
    });

    let send = Params::from_pairs([("to", "kex1recipient"), ("amount", "1000ukex,5uatom")]);
    group.bench_function("prepare/bank.send", |b| {
        let spec = registry.resolve("bank", "send").unwrap();
        b.iter(|| spec.prepare(black_box(&send), &env));
    });

    let vote = Params::from_pairs([("proposal_id", "7"), ("option", "Yes")]);
    group.bench_function("prepare/gov.vote", |b| {
        let spec = registry.resolve("gov", "vote").unwrap();
        b.iter(|| spec.prepare(black_box(&vote), &env).map(|call| call.describe()));
    });

    group.finish();
}

// ============================================================================
// Parser Benchmarks
// ============================================================================

fn bench_parse_playbook(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/parse_playbook_str");

    for steps in [1, 10, 100] {
        let yaml = fixtures::playbook_yaml(steps);
        group.throughput(Throughput::Bytes(yaml.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(steps), &yaml, |b, yaml| {
            b.iter(|| parse_playbook_str(black_box(yaml)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_str,
    bench_resolve_params,
    bench_registry,
    bench_parse_playbook
);
criterion_main!(benches);
