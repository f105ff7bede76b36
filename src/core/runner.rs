//! Concurrent job runner
//!
//! Fans a list of named jobs out across a fixed pool of worker tasks. One
//! failing job never aborts the batch: the error is recorded against the
//! job's name and the remaining jobs keep flowing. Collected outcomes are
//! reassembled in submission order, so output is deterministic regardless of
//! how the scheduler interleaves workers.
//!
//! A shared shutdown flag drains the pool gracefully: workers finish the job
//! in hand and stop picking up new ones.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::core::error::Result;

/// What processing one resource produced
#[derive(Debug)]
pub enum Outcome {
    /// A summary entry for the parser's index listing
    Entry(Value),
    /// Entries grouped into named buckets rather than the flat listing; one
    /// job may contribute to several buckets at once
    Buckets(BTreeMap<String, Vec<Value>>),
    /// The resource does not exist in the target generation
    Skip,
}

/// A unit of work: a display name plus whatever the processor needs
#[derive(Debug)]
pub struct Job<T> {
    pub name: String,
    pub payload: T,
}

impl<T> Job<T> {
    pub fn new(name: impl Into<String>, payload: T) -> Self {
        Job {
            name: name.into(),
            payload,
        }
    }
}

/// A job that returned an error, by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub name: String,
    pub error: String,
}

/// Aggregated results of one batch
#[derive(Debug, Default)]
pub struct RunReport {
    /// Index entries, in submission order
    pub entries: Vec<Value>,
    /// Bucketed entries, in submission order within each bucket
    pub categorized: BTreeMap<String, Vec<Value>>,
    /// Jobs that produced an entry
    pub processed: usize,
    /// Jobs skipped as absent from the target generation
    pub skipped: usize,
    /// Jobs that failed, in submission order
    pub failures: Vec<JobFailure>,
    /// True when a shutdown request cut the batch short
    pub interrupted: bool,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failures.len()
    }
}

/// Run `jobs` on `workers` concurrent tasks and collect the outcomes.
///
/// `process` is invoked once per job. Setting `shutdown` stops workers from
/// taking further jobs; in-flight jobs run to completion.
pub async fn run_jobs<T, F, Fut>(
    jobs: Vec<Job<T>>,
    workers: usize,
    shutdown: Arc<AtomicBool>,
    process: F,
) -> RunReport
where
    T: Send + 'static,
    F: Fn(Job<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome>> + Send + 'static,
{
    let submitted = jobs.len();
    let (sender, receiver) = mpsc::channel(submitted.max(1));
    for (index, job) in jobs.into_iter().enumerate() {
        // Capacity equals the job count, so sends never block.
        if sender.send((index, job)).await.is_err() {
            break;
        }
    }
    drop(sender);

    let receiver = Arc::new(Mutex::new(receiver));
    let process = Arc::new(process);

    let mut handles = Vec::with_capacity(workers.max(1));
    for worker in 0..workers.max(1) {
        let receiver = Arc::clone(&receiver);
        let process = Arc::clone(&process);
        let shutdown = Arc::clone(&shutdown);
        handles.push(tokio::spawn(async move {
            let mut collected: Vec<(usize, String, std::result::Result<Outcome, String>)> =
                Vec::new();
            loop {
                if shutdown.load(Ordering::SeqCst) {
                    debug!(worker, "shutdown requested, draining worker");
                    break;
                }
                let next = { receiver.lock().await.recv().await };
                let Some((index, job)) = next else {
                    break;
                };
                let name = job.name.clone();
                match process(job).await {
                    Ok(outcome) => collected.push((index, name, Ok(outcome))),
                    Err(err) => {
                        warn!(name = %name, error = %err, "job failed");
                        collected.push((index, name, Err(err.to_string())));
                    }
                }
            }
            collected
        }));
    }

    let mut outcomes = Vec::with_capacity(submitted);
    for handle in handles {
        match handle.await {
            Ok(collected) => outcomes.extend(collected),
            Err(err) => error!(error = %err, "worker task aborted"),
        }
    }
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut report = RunReport {
        interrupted: shutdown.load(Ordering::SeqCst),
        ..RunReport::default()
    };
    for (_, name, outcome) in outcomes {
        match outcome {
            Ok(Outcome::Entry(entry)) => {
                report.processed += 1;
                report.entries.push(entry);
            }
            Ok(Outcome::Buckets(buckets)) => {
                report.processed += 1;
                for (category, entries) in buckets {
                    report.categorized.entry(category).or_default().extend(entries);
                }
            }
            Ok(Outcome::Skip) => report.skipped += 1,
            Err(error) => report.failures.push(JobFailure { name, error }),
        }
    }
    report
}
