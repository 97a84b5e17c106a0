//! The dispatch loop.
//!
//! A run proceeds in rounds. Each round walks the senders round-robin, hands a batch
//! to every eligible sender until `workers` batches are in flight or the recipients
//! run out, then waits for all of them before the results are folded into the quota
//! book. Only this task ever mutates quotas, the window or the failure list.

use std::{ops::Range, sync::Arc};

use ahash::AHashSet;
use futures_util::future::join_all;
use hermes_common::{MessageTemplates, Recipient, SenderIdentity, internal};
use tokio::task::JoinHandle;

use crate::{
    aggregator::Aggregator,
    batch::BatchBuilder,
    clock::Clock,
    config::DispatchConfig,
    error::{BuildError, DispatchError, SendError},
    failures::FailureLog,
    quota::{DailyWindow, Eligibility, QuotaBook, QuotaPolicy},
    task::{DispatchTask, WorkerResult},
    transport::Transport,
    worker,
};

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub rounds: usize,
    pub sent: usize,
    pub failed: usize,
    /// Recipients never handed to a worker. Non-zero only for aborted runs.
    pub undispatched: usize,
}

struct Launched {
    sender: String,
    range: Range<usize>,
    handle: JoinHandle<WorkerResult>,
}

pub struct Scheduler {
    config: DispatchConfig,
    senders: Vec<Arc<SenderIdentity>>,
    recipients: Arc<[Recipient]>,
    templates: Arc<MessageTemplates>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    quotas: QuotaBook,
    window: DailyWindow,
    batches: BatchBuilder,
    aggregator: Aggregator,
    failures: FailureLog,
    cursor: usize,
    rounds: usize,
}

impl Scheduler {
    /// # Errors
    ///
    /// Returns a [`BuildError`] if the configuration is invalid, there are no senders,
    /// or a sender appears twice.
    pub fn new(
        config: DispatchConfig,
        senders: Vec<SenderIdentity>,
        recipients: Vec<Recipient>,
        templates: MessageTemplates,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BuildError> {
        config.validate()?;

        if senders.is_empty() {
            return Err(BuildError::NoSenders);
        }

        let mut seen = AHashSet::with_capacity(senders.len());
        for sender in &senders {
            if !seen.insert(sender.email.as_str()) {
                return Err(BuildError::DuplicateSender(sender.email.clone()));
            }
        }

        let window = DailyWindow::new(clock.now(), config.daily_window());
        let quotas = QuotaBook::new(
            senders.iter().map(|s| s.email.as_str()),
            QuotaPolicy {
                per_day: config.per_day,
                cooldown: config.cooldown(),
                quarantine_after: config.quarantine_after,
            },
            &window,
        );

        Ok(Self {
            batches: BatchBuilder::new(recipients.len(), config.per_minute),
            aggregator: Aggregator::new(config.error_threshold),
            failures: FailureLog::new(&config.failures_path),
            senders: senders.into_iter().map(Arc::new).collect(),
            recipients: recipients.into(),
            templates: Arc::new(templates),
            transport,
            clock,
            quotas,
            window,
            config,
            cursor: 0,
            rounds: 0,
        })
    }

    #[must_use]
    pub const fn quotas(&self) -> &QuotaBook {
        &self.quotas
    }

    /// Recipients whose batch failed, in the order the failures were recorded.
    pub fn failed_recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.aggregator
            .failed_ranges()
            .iter()
            .flat_map(|range| self.recipients[range.clone()].iter())
    }

    #[must_use]
    pub fn report(&self) -> DispatchReport {
        DispatchReport {
            rounds: self.rounds,
            sent: self.quotas.sent_total(),
            failed: self.aggregator.failed_count(),
            undispatched: self.batches.remaining(),
        }
    }

    /// Dispatches every recipient, then writes the failed recipients out.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::CircuitOpen`] or [`DispatchError::SendersExhausted`]
    /// when the run stops early, [`DispatchError::Persist`] when the failure file
    /// cannot be written, or [`DispatchError::Combined`] for both.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(senders = self.senders.len(), recipients = self.recipients.len())
    )]
    pub async fn run(&mut self) -> Result<DispatchReport, DispatchError> {
        let outcome = self.dispatch().await;
        let persisted = self.failures.persist(self.failed_recipients());

        match (outcome, persisted) {
            (Ok(()), Ok(_)) => {
                let report = self.report();
                internal!(
                    level = INFO,
                    "Run finished after {} rounds: {} sent, {} failed",
                    report.rounds,
                    report.sent,
                    report.failed
                );
                Ok(report)
            }
            (Ok(()), Err(persist)) => Err(persist.into()),
            (Err(abort), Ok(_)) => Err(abort),
            (Err(abort), Err(persist)) => {
                tracing::error!(error = %persist, "failed recipients could not be written");
                Err(DispatchError::Combined {
                    abort: Box::new(abort),
                    persist,
                })
            }
        }
    }

    async fn dispatch(&mut self) -> Result<(), DispatchError> {
        while !self.batches.is_exhausted() {
            let launched = self.launch_round().await?;
            self.rounds += 1;

            tracing::debug!(
                round = self.rounds,
                batches = launched.len(),
                "waiting for round"
            );
            let results = Self::collect(launched).await;

            let now = self.clock.now();
            self.window.roll(now);
            self.aggregator
                .absorb(results, &mut self.quotas, now, &self.window)?;

            tracing::info!(
                round = self.rounds,
                sent = self.quotas.sent_total(),
                failed = self.aggregator.failed_count(),
                remaining = self.batches.remaining(),
                "round complete"
            );
        }
        Ok(())
    }

    /// Waits for every worker of a round, in launch order.
    async fn collect(launched: Vec<Launched>) -> Vec<WorkerResult> {
        let (meta, handles): (Vec<_>, Vec<_>) = launched
            .into_iter()
            .map(|l| ((l.sender, l.range), l.handle))
            .unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(meta)
            .map(|(joined, (sender, range))| {
                joined.unwrap_or_else(|e| {
                    tracing::error!(sender = %sender, error = %e, "worker did not complete");
                    WorkerResult::whole_batch_failure(
                        &sender,
                        range,
                        SendError::Worker(e.to_string()),
                    )
                })
            })
            .collect()
    }

    /// Launches up to `workers` batches. Returns once the round is full, the
    /// recipients are exhausted, or every remaining sender has been skipped after at
    /// least one launch.
    async fn launch_round(&mut self) -> Result<Vec<Launched>, DispatchError> {
        let count = self.senders.len();
        let mut busy = vec![false; count];
        let mut launched = Vec::with_capacity(self.config.workers);
        let mut skips = 0;

        while launched.len() < self.config.workers && !self.batches.is_exhausted() {
            self.window.roll(self.clock.now());

            let active = self.active(&busy).count();
            if active == 0 {
                if launched.is_empty() {
                    return Err(DispatchError::SendersExhausted {
                        remaining: self.batches.remaining(),
                    });
                }
                break;
            }

            if skips >= active {
                if !launched.is_empty() {
                    break;
                }
                self.wait_for_sender(&busy).await;
                skips = 0;
                continue;
            }

            let position = self.cursor;
            self.cursor = (self.cursor + 1) % count;

            let Some(quota) = self.quotas.get(position) else {
                continue;
            };
            if busy[position] || quota.is_quarantined() {
                continue;
            }

            let now = self.clock.now();
            let eligibility = quota.eligibility(now, &self.window);
            let batch = if eligibility.is_eligible() {
                self.batches.next(quota.remaining_today(&self.window))
            } else {
                None
            };

            if let Some(range) = batch {
                launched.push(self.spawn(position, range));
                busy[position] = true;
                skips = 0;
            } else {
                skips += 1;
                tracing::debug!(
                    sender = %self.senders[position].email,
                    ?eligibility,
                    skips,
                    "sender skipped"
                );
                self.clock.sleep(self.config.skip_pause()).await;
            }
        }

        Ok(launched)
    }

    /// Positions of senders that can still take a batch this round.
    fn active<'a>(&'a self, busy: &'a [bool]) -> impl Iterator<Item = usize> + 'a {
        (0..self.senders.len()).filter(move |&position| {
            !busy[position]
                && self
                    .quotas
                    .get(position)
                    .is_some_and(|quota| !quota.is_quarantined())
        })
    }

    /// Sleeps until the earliest active sender becomes eligible.
    async fn wait_for_sender(&self, busy: &[bool]) {
        let now = self.clock.now();
        let earliest = self
            .active(busy)
            .filter_map(|position| self.quotas.get(position))
            .filter_map(|quota| match quota.eligibility(now, &self.window) {
                Eligibility::Eligible => Some(now),
                other => other.ready_at(),
            })
            .min();

        let until = earliest.unwrap_or_else(|| now + self.config.skip_pause());
        let duration = until.saturating_duration_since(now);
        if !duration.is_zero() {
            internal!(
                level = INFO,
                "Every sender is throttled, waiting {duration:?} for the next one"
            );
            self.clock.sleep(duration).await;
        }
    }

    fn spawn(&self, position: usize, range: Range<usize>) -> Launched {
        let sender = Arc::clone(&self.senders[position]);
        let email = sender.email.clone();

        tracing::info!(
            sender = %email,
            recipients = range.len(),
            first = range.start,
            "dispatching batch"
        );

        let task = DispatchTask {
            sender,
            recipients: Arc::clone(&self.recipients),
            range: range.clone(),
            host: self.config.host.clone(),
            read_receipt: self.config.read_receipt.clone(),
            templates: Arc::clone(&self.templates),
            auth: self.config.auth,
        };
        let transport = Arc::clone(&self.transport);
        let handle = tokio::spawn(async move { worker::run(task, transport.as_ref()).await });

        Launched {
            sender: email,
            range,
            handle,
        }
    }
}
