//! Runs the workflow with a constant number of concurrent logical users.
//!
//! This is a closed injection model: exactly `users` iterations are in flight at any time. Each
//! iteration is one logical user with its own session. As soon as a user finishes, a new one
//! starts with the next feeder record. Once the duration elapses, no new users are started and
//! the runner waits for the in-flight users to finish.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use sketches_ddsketch::DDSketch;
use tokio::sync::Semaphore;

use crate::error::{FailureKind, IterationError, Step};
use crate::feeder::Feeder;
use crate::http::HttpRemote;
use crate::workflow::{self, Iteration};

/// The shape of the injected load.
#[derive(Clone, Copy, Debug)]
pub struct Injection {
    /// Number of logical users kept in flight.
    pub users: usize,
    /// How long new users are started for.
    pub duration: Duration,
}

/// Runs the workflow against `remote` until the injection duration has elapsed.
///
/// Returns the aggregated metrics of all iterations. Failed iterations are counted and logged,
/// they do not fail the run.
pub async fn run(remote: HttpRemote, feeder: Feeder, injection: Injection) -> Result<Report> {
    let Injection { users, duration } = injection;
    anyhow::ensure!(users > 0, "at least one concurrent user is required");
    let max_permits = u32::try_from(users)?;

    tracing::info!(
        base_url = %remote.base_url(),
        users,
        ?duration,
        "starting load test"
    );

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
        .with_message("Running load test:");
    bar.enable_steady_tick(Duration::from_millis(100));

    let remote = Arc::new(remote);
    let semaphore = Arc::new(Semaphore::new(users));
    let metrics = Arc::new(Mutex::new(Metrics::default()));

    let start = Instant::now();
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;

            _ = &mut sleep => break,
            permit = semaphore.clone().acquire_owned() => {
                let permit = permit?;
                let remote = Arc::clone(&remote);
                let metrics = Arc::clone(&metrics);
                let record = feeder.next_record();

                tokio::spawn(async move {
                    let iteration = workflow::run_iteration(&remote, &record).await;
                    if let Err(ref err) = iteration.result {
                        tracing::warn!(
                            name = %record.name,
                            error = err as &dyn std::error::Error,
                            "iteration failed"
                        );
                    }
                    metrics
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .record(&iteration);
                    drop(permit);
                });
            }
        }
    }

    // by acquiring *all* the permits, we wait for all in-flight users to finish
    let _permits = semaphore.acquire_many(max_permits).await?;
    bar.finish_and_clear();

    let metrics = std::mem::take(&mut *metrics.lock().unwrap_or_else(PoisonError::into_inner));
    let report = Report {
        users,
        elapsed: start.elapsed(),
        metrics,
    };

    tracing::info!(
        iterations = report.metrics.iterations(),
        failures = report.metrics.failures(),
        "load test finished"
    );

    Ok(report)
}

/// The result of a load test run.
#[derive(Debug)]
pub struct Report {
    /// Number of concurrent logical users.
    pub users: usize,
    /// Wall time of the run, including the drain of in-flight users.
    pub elapsed: Duration,
    /// The aggregated metrics.
    pub metrics: Metrics,
}

/// Latency and failures of one step.
#[derive(Default)]
pub struct StepMetrics {
    /// Latencies of successful requests in seconds.
    pub timing: DDSketch,
    /// Number of failed requests.
    pub failures: u64,
}

/// Aggregated results of all iterations.
#[derive(Default)]
pub struct Metrics {
    create: StepMetrics,
    update: StepMetrics,
    read: StepMetrics,

    /// Total latencies of successful iterations in seconds.
    pub iteration_timing: DDSketch,

    /// Number of iterations that passed all steps and the consistency check.
    pub successes: u64,

    /// Iterations that failed with [`FailureKind::Status`].
    pub status_failures: u64,
    /// Iterations that failed with [`FailureKind::Extraction`].
    pub extraction_failures: u64,
    /// Iterations that failed with [`FailureKind::Consistency`].
    pub consistency_failures: u64,
    /// Iterations that failed with [`FailureKind::Transport`].
    pub transport_failures: u64,
}

impl Metrics {
    /// Adds the outcome of one iteration.
    pub fn record(&mut self, iteration: &Iteration) {
        for timing in &iteration.timings {
            self.step_mut(timing.step)
                .timing
                .add(timing.elapsed.as_secs_f64());
        }

        match &iteration.result {
            Ok(()) => {
                self.successes += 1;
                self.iteration_timing
                    .add(iteration.elapsed().as_secs_f64());
            }
            Err(err) => self.record_failure(err),
        }
    }

    fn record_failure(&mut self, err: &IterationError) {
        if let Some(step) = err.step() {
            self.step_mut(step).failures += 1;
        }

        let counter = match err.kind() {
            FailureKind::Status => &mut self.status_failures,
            FailureKind::Extraction => &mut self.extraction_failures,
            FailureKind::Consistency => &mut self.consistency_failures,
            FailureKind::Transport => &mut self.transport_failures,
        };
        *counter += 1;
    }

    /// Metrics of the given step.
    pub fn step(&self, step: Step) -> &StepMetrics {
        match step {
            Step::Create => &self.create,
            Step::Update => &self.update,
            Step::Read => &self.read,
        }
    }

    fn step_mut(&mut self, step: Step) -> &mut StepMetrics {
        match step {
            Step::Create => &mut self.create,
            Step::Update => &mut self.update,
            Step::Read => &mut self.read,
        }
    }

    /// Number of failed iterations.
    pub fn failures(&self) -> u64 {
        self.status_failures
            + self.extraction_failures
            + self.consistency_failures
            + self.transport_failures
    }

    /// Number of completed iterations, successful or not.
    pub fn iterations(&self) -> u64 {
        self.successes + self.failures()
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("successes", &self.successes)
            .field("status_failures", &self.status_failures)
            .field("extraction_failures", &self.extraction_failures)
            .field("consistency_failures", &self.consistency_failures)
            .field("transport_failures", &self.transport_failures)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for StepMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepMetrics")
            .field("count", &self.timing.count())
            .field("failures", &self.failures)
            .finish()
    }
}
