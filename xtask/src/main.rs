use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the order tracking workspace",
    long_about = "A unified CLI for running the tracking demo, benchmarks,\n\
                  and CI checks in the order tracking workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking demo to arrival
    Run {
        /// Log filter passed through RUST_LOG
        #[arg(long, env = "RUST_LOG", default_value = "track_core=info")]
        log: String,
    },
    /// Run Criterion benchmarks
    Bench,
    /// Compare benchmarks: stash changes, create baseline, restore, compare
    BenchCompare,
    /// Run CI checks (fmt, clippy, tests, examples, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests (with and without the http feature)
    Check,
    /// Build and run the demo
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn command(program: &str, args: &[&str], envs: &[(&str, &str)]) -> ExitStatus {
    eprintln!("+ {program} {}", args.join(" "));
    Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .status()
        .unwrap_or_else(|err| panic!("failed to execute {program}: {err}"))
}

fn exit_on_failure(status: ExitStatus) {
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_cargo(args: &[&str]) {
    exit_on_failure(command("cargo", args, &[]));
}

fn run_cargo_with_env(args: &[&str], envs: &[(&str, &str)]) {
    exit_on_failure(command("cargo", args, envs));
}

fn run_git(args: &[&str]) {
    exit_on_failure(command("git", args, &[]));
}

const BENCH_ARGS: [&str; 5] = ["bench", "--package", "track_core", "--bench", "performance"];

fn bench_with(extra: &[&str]) {
    let mut args: Vec<&str> = BENCH_ARGS.to_vec();
    if !extra.is_empty() {
        args.push("--");
        args.extend_from_slice(extra);
    }
    run_cargo(&args);
}

fn run_demo(log: &str) {
    run_cargo_with_env(
        &["run", "-p", "track_core", "--example", "tracking_run", "--release"],
        &[("RUST_LOG", log)],
    );
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test track_core");
    run_cargo(&["test", "-p", "track_core"]);

    step("Test track_core with the http feature");
    run_cargo(&["test", "-p", "track_core", "--features", "http"]);
}

fn ci_examples() {
    step("Run tracking_run");
    run_demo("track_core=info");
}

fn ci_bench() {
    step("Run benchmarks");
    bench_with(&[]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { log } => run_demo(&log),
        Commands::Bench => bench_with(&[]),
        Commands::BenchCompare => {
            let baseline_dir = Path::new("target/criterion");
            if baseline_dir.exists() {
                step("Removing existing benchmark data");
                std::fs::remove_dir_all(baseline_dir).expect("failed to remove target/criterion");
            }

            step("Stashing current changes");
            run_git(&[
                "stash",
                "push",
                "-m",
                "Temporary stash for benchmark comparison",
            ]);

            step("Running benchmark to create baseline");
            bench_with(&["--save-baseline", "main"]);

            step("Reapplying changes");
            run_git(&["stash", "pop"]);

            step("Running benchmark comparing against baseline");
            bench_with(&["--baseline", "main"]);

            eprintln!("\nDone! Check the output above to see performance comparison.");
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
