//! Load test: concurrent random transactions.

use serde::Serialize;
use snaptx_core::TransactionManager;
use snaptx_testkit::{stress_random_transactions, StressConfig, StressTestResult};

#[derive(Debug, Serialize)]
struct StressReport<'a> {
    root: String,
    threads: usize,
    transactions_per_thread: usize,
    files: usize,
    #[serde(flatten)]
    result: &'a StressTestResult,
    duration_ms: u128,
}

/// Runs the stress test and prints its outcome.
pub fn run(
    tm: &TransactionManager,
    threads: usize,
    transactions: usize,
    files: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if files == 0 {
        return Err("--files must be at least 1".into());
    }
    let config = StressConfig {
        threads,
        transactions,
        files,
    };

    tracing::info!(threads, transactions, files, "starting stress run");
    let result = stress_random_transactions(tm, &config);

    match format {
        "json" => {
            let report = StressReport {
                root: tm.root().display().to_string(),
                threads,
                transactions_per_thread: transactions,
                files,
                result: &result,
                duration_ms: result.duration.as_millis(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "text" => result.print_summary("Stress test"),
        other => return Err(format!("Unknown format: {other} (expected text or json)").into()),
    }

    if tm.active_count() != 0 {
        return Err(format!("{} transactions left unfinished", tm.active_count()).into());
    }
    Ok(())
}
