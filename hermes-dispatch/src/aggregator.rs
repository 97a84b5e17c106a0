//! Folds a round's worker results into the run state and trips the circuit breaker.

use std::{ops::Range, time::Instant};

use hermes_common::internal;

use crate::{
    error::{DispatchError, SendError},
    quota::{DailyWindow, QuotaBook},
    task::WorkerResult,
};

/// Per-run failure accounting.
#[derive(Debug)]
pub struct Aggregator {
    threshold: u32,
    consecutive_errors: u32,
    failed: Vec<Range<usize>>,
    failed_count: usize,
}

impl Aggregator {
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_errors: 0,
            failed: Vec::new(),
            failed_count: 0,
        }
    }

    /// Absorbs every result of a round, in launch order.
    ///
    /// All results are applied even once the threshold is reached, so recipients of
    /// batches that already ran are always accounted for.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::CircuitOpen`] carrying the failure that reached the
    /// threshold.
    pub fn absorb(
        &mut self,
        results: Vec<WorkerResult>,
        quotas: &mut QuotaBook,
        now: Instant,
        window: &DailyWindow,
    ) -> Result<(), DispatchError> {
        let mut tripped: Option<(u32, SendError)> = None;

        for result in results {
            match result {
                WorkerResult::Success { sender, count } => {
                    self.consecutive_errors = 0;
                    if let Some(quota) = quotas.by_email_mut(&sender) {
                        quota.record_success(count, now, window);
                    }
                }
                WorkerResult::Failure {
                    sender,
                    sent,
                    error,
                    unsent,
                } => {
                    if let Some(quota) = quotas.by_email_mut(&sender) {
                        if sent > 0 {
                            quota.record_success(sent, now, window);
                        }
                        if quota.record_failure(unsent.len()) {
                            internal!(
                                level = WARN,
                                "{sender} quarantined after {} failed batches",
                                quota.failed_batches()
                            );
                        }
                    }

                    self.failed_count += unsent.len();
                    self.failed.push(unsent);
                    self.consecutive_errors += 1;

                    if tripped.is_none() && self.consecutive_errors >= self.threshold {
                        tripped = Some((self.consecutive_errors, error));
                    }
                }
            }
        }

        match tripped {
            Some((consecutive, cause)) => Err(DispatchError::CircuitOpen {
                consecutive,
                threshold: self.threshold,
                cause,
            }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub const fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Failed recipients as ranges into the run's recipient list, in the order they
    /// were recorded.
    #[must_use]
    pub fn failed_ranges(&self) -> &[Range<usize>] {
        &self.failed
    }

    #[must_use]
    pub const fn failed_count(&self) -> usize {
        self.failed_count
    }
}
