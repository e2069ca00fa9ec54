//! Fails when a gate benchmark median exceeds the per-event budget.
//!
//! Run after `cargo bench --bench gate`:
//!
//! ```text
//! bench_guard [criterion-dir] [--budget-ns <ns>]
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// Host checks must not be delayed by more than this per event.
const DEFAULT_BUDGET_NS: u64 = 1_000_000;

const GUARDED: [&str; 3] = [
    "gate/host_check_processed",
    "gate/service_check_processed",
    "gate/ignored_phase",
];

struct Args {
    criterion_dir: String,
    budget_ns: u64,
}

fn parse_args() -> Args {
    let mut args = Args {
        criterion_dir: "target/criterion".to_string(),
        budget_ns: DEFAULT_BUDGET_NS,
    };
    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--budget-ns" => {
                let Some(v) = it.next() else {
                    eprintln!("bench_guard: --budget-ns requires a value");
                    process::exit(2);
                };
                args.budget_ns = v.parse().unwrap_or_else(|_| {
                    eprintln!("bench_guard: invalid budget: {v}");
                    process::exit(2);
                });
            }
            dir => args.criterion_dir = dir.to_string(),
        }
    }
    args
}

fn main() {
    let args = parse_args();
    let Some(root) = locate_criterion_dir(&args.criterion_dir) else {
        eprintln!("bench_guard: criterion output not found at {}", args.criterion_dir);
        process::exit(2);
    };

    let mut failures = Vec::new();
    for bench in GUARDED {
        match median_ns(&root, bench) {
            Ok(m) if m > args.budget_ns => {
                failures.push(format!("{bench}: median {m}ns exceeds {}ns", args.budget_ns));
            }
            Ok(m) => println!("{bench}: median {m}ns (budget {}ns)", args.budget_ns),
            Err(e) => failures.push(format!("{bench}: {e}")),
        }
    }

    if !failures.is_empty() {
        eprintln!("bench_guard failed:");
        for f in &failures {
            eprintln!("- {f}");
        }
        process::exit(1);
    }
}

/// Accept the path as given, or look for it under parent directories when
/// the target dir lives above the crate.
fn locate_criterion_dir(requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    if requested.exists() {
        return Some(requested.to_path_buf());
    }
    if requested.is_absolute() {
        return None;
    }
    env::current_dir()
        .ok()?
        .ancestors()
        .take(6)
        .map(|dir| dir.join(requested))
        .find(|p| p.exists())
}

fn median_ns(root: &Path, bench: &str) -> Result<u64, String> {
    // criterion writes <group>/<function>/new/estimates.json
    let estimates = root.join(bench).join("new").join("estimates.json");
    let bytes = fs::read(&estimates).map_err(|e| format!("read {}: {e}", estimates.display()))?;
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("parse {}: {e}", estimates.display()))?;

    let median = json
        .pointer("/median/point_estimate")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| format!("no median in {}", estimates.display()))?;
    if !median.is_finite() || median < 0.0 {
        return Err(format!("invalid median {median} in {}", estimates.display()));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(median.round() as u64)
}
