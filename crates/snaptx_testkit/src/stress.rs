//! Concurrent stress runs against a transaction manager.
//!
//! Many threads run short random transactions over a small set of shared
//! files, so commits regularly conflict and roll the volume back.

use rand::Rng;
use serde::Serialize;
use snaptx_core::{CoreError, CoreResult, Transaction, TransactionManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Result of a stress test run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Transactions started or attempted.
    pub attempted: usize,
    /// Transactions whose writes were kept.
    pub committed: usize,
    /// Transactions rolled back by a conflict or timeout.
    pub rolled_back: usize,
    /// Transactions that hit any other error, including provider failures.
    pub failed: usize,
    /// Share of attempted transactions that were rolled back.
    pub conflict_rate: f64,
    /// Total duration.
    pub duration: Duration,
    /// Transactions per second.
    pub transactions_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(committed: usize, rolled_back: usize, failed: usize, duration: Duration) -> Self {
        let attempted = committed + rolled_back + failed;
        let conflict_rate = if attempted > 0 {
            rolled_back as f64 / attempted as f64
        } else {
            0.0
        };
        let transactions_per_second = if duration.as_secs_f64() > 0.0 {
            attempted as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            attempted,
            committed,
            rolled_back,
            failed,
            conflict_rate,
            duration,
            transactions_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Attempted: {}", self.attempted);
        println!("Committed: {}", self.committed);
        println!("Rolled back: {}", self.rolled_back);
        println!("Failed: {}", self.failed);
        println!("Conflict rate: {:.2}%", self.conflict_rate * 100.0);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} txn/sec", self.transactions_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Transactions each thread runs.
    pub transactions: usize,
    /// Number of distinct files (`test_0.txt` ..) the threads fight over.
    pub files: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            transactions: 50,
            files: 5,
        }
    }
}

/// One random operation of a stress transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StressOp {
    Read,
    Write,
    Delete,
}

/// Runs `config.threads` threads, each committing `config.transactions`
/// transactions of one random read, write or delete.
///
/// Every attempted transaction lands in exactly one of the result's
/// committed, rolled-back or failed counts.
pub fn stress_random_transactions(
    manager: &TransactionManager,
    config: &StressConfig,
) -> StressTestResult {
    let committed = AtomicUsize::new(0);
    let rolled_back = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let files = config.files.max(1);

    let start = Instant::now();
    thread::scope(|scope| {
        for _ in 0..config.threads {
            scope.spawn(|| {
                let mut rng = rand::thread_rng();
                for _ in 0..config.transactions {
                    let name = format!("test_{}.txt", rng.gen_range(0..files));
                    let op = match rng.gen_range(0..3) {
                        0 => StressOp::Read,
                        1 => StressOp::Write,
                        _ => StressOp::Delete,
                    };
                    match manager.transaction(|txn| apply(txn, &name, op)) {
                        Ok(()) => committed.fetch_add(1, Ordering::Relaxed),
                        Err(e) if e.is_rolled_back() => {
                            rolled_back.fetch_add(1, Ordering::Relaxed)
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, file = %name, "stress transaction failed");
                            failed.fetch_add(1, Ordering::Relaxed)
                        }
                    };
                }
            });
        }
    });

    StressTestResult::new(
        committed.into_inner(),
        rolled_back.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

fn apply(txn: &mut Transaction, name: &str, op: StressOp) -> CoreResult<()> {
    match op {
        StressOp::Read => match txn.read(name) {
            Ok(_) | Err(CoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        },
        StressOp::Write => txn.write(name, format!("Random content: {}", Uuid::new_v4())),
        StressOp::Delete => txn.delete(name),
    }
}
