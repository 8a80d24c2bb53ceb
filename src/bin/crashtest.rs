use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use clap::Parser;

use crashtest::{
    parse_duration, setup_logger, Orchestrator, OrchestratorConfig, OsProcess,
    Registry, SledStore, WriterInvocation,
};

const EXIT_FAILED: i32 = 1;
const EXIT_FATAL: i32 = 2;
const EXIT_WRITER_ERROR: i32 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "crashtest",
    version,
    about = "Kills a store writer at random points and verifies what survives"
)]
struct Args {
    /// Comma-separated tests to run. Defaults to every registered test.
    #[arg(long)]
    test: Option<String>,

    /// Average time to wait before terminating the writer process.
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    time: Duration,

    /// Directory that holds the test databases.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Number of repetitions of each test.
    #[arg(long, default_value_t = 1000)]
    count: u64,

    /// Seed of the generated key/value stream.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Let writers exit on their own after this many entries.
    #[arg(long)]
    entries: Option<u64>,

    /// Move failing databases aside instead of deleting them.
    #[arg(long)]
    keep_failed: bool,

    /// Print the available tests and exit.
    #[arg(long)]
    list: bool,
}

fn main() {
    setup_logger();

    let registry = Registry::default();

    // Run the writer if we're the child process.
    match WriterInvocation::from_env() {
        Ok(Some(invocation)) => {
            match invocation.run::<SledStore>(&registry) {
                Ok(written) => {
                    log::info!("writer finished after {} entries", written);
                    return;
                }
                Err(e) => {
                    log::error!("writer failed: {}", e);
                    exit(EXIT_WRITER_ERROR);
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("{}", e);
            exit(EXIT_FATAL);
        }
    }

    // Be the front-end otherwise.
    let args = Args::parse();

    if args.list {
        for name in registry.names() {
            if let Ok(strategy) = registry.get(name) {
                let contract = if strategy.guarantees_acknowledged_writes() {
                    "durable"
                } else {
                    "best-effort"
                };
                println!("{:24} {:12} {}", name, contract, strategy);
            }
        }
        return;
    }

    let selection = args
        .test
        .clone()
        .unwrap_or_else(|| registry.names().collect::<Vec<_>>().join(","));

    let strategies = match registry.select(&selection) {
        Ok(strategies) => strategies,
        Err(e) => {
            log::error!("{}", e);
            exit(EXIT_FATAL);
        }
    };

    let process = match OsProcess::current_exe() {
        Ok(process) => process,
        Err(e) => {
            log::error!("{}", e);
            exit(EXIT_FATAL);
        }
    };

    let config = OrchestratorConfig {
        base_dir: args.dir,
        repetitions: args.count,
        average_wait: args.time,
        seed: args.seed,
        entry_limit: args.entries,
        keep_failed: args.keep_failed,
    };

    let orchestrator: Orchestrator =
        Orchestrator::new(registry, process, config);

    let report = match orchestrator.run_all(
        &strategies,
        orchestrator.config().repetitions,
        orchestrator.config().average_wait,
    ) {
        Ok(report) => report,
        Err(e) => {
            log::error!("aborting: {}", e);
            exit(EXIT_FATAL);
        }
    };

    let failed = report.failures().count();
    log::info!(
        "{} trials run, {} passed, {} failed",
        report.len(),
        report.len() - failed,
        failed
    );

    if report.any_failed() {
        for outcome in report.failures() {
            log::error!("{}", outcome);
        }
        log::error!("one or more tests failed");
        exit(EXIT_FAILED);
    }
}
