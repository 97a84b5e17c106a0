//! Per-sender rate-limit state.
//!
//! A [`SenderQuota`] is only ever touched by the coordinating task, after a round's
//! workers have all reported. The per-day cap is counted over one [`DailyWindow`]
//! shared by every sender: when the window rolls over, each quota's daily count is
//! treated as zero the next time it is read.

use std::time::{Duration, Instant};

use ahash::AHashMap;

/// The rolling window the per-day cap is counted in.
///
/// Not aligned to calendar days: a window starts at the first check after the
/// previous one expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    start: Instant,
    epoch: u64,
    length: Duration,
}

impl DailyWindow {
    #[must_use]
    pub const fn new(start: Instant, length: Duration) -> Self {
        Self {
            start,
            epoch: 0,
            length,
        }
    }

    /// Starts a new window at `now` if the current one has run its length. Returns
    /// whether it rolled.
    pub fn roll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.start) >= self.length {
            self.start = now;
            self.epoch += 1;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub const fn start(&self) -> Instant {
        self.start
    }

    /// When the current window will next roll.
    #[must_use]
    pub fn resets_at(&self) -> Instant {
        self.start + self.length
    }
}

/// Whether a sender can take a batch right now, and if not, until when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    CoolingDown { until: Instant },
    DailyCapReached { until: Instant },
    Quarantined,
}

impl Eligibility {
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }

    /// The instant the sender may become eligible again. `None` for eligible and
    /// quarantined senders.
    #[must_use]
    pub const fn ready_at(&self) -> Option<Instant> {
        match self {
            Self::CoolingDown { until } | Self::DailyCapReached { until } => Some(*until),
            Self::Eligible | Self::Quarantined => None,
        }
    }
}

/// Limits applied to every sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub per_day: usize,
    pub cooldown: Duration,
    pub quarantine_after: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SenderQuota {
    policy: QuotaPolicy,
    sent_today: usize,
    day_epoch: u64,
    sent_total: usize,
    failed: usize,
    failed_batches: u32,
    bounced: usize,
    cooldown_until: Option<Instant>,
    quarantined: bool,
}

impl SenderQuota {
    #[must_use]
    pub const fn new(policy: QuotaPolicy, window: &DailyWindow) -> Self {
        Self {
            policy,
            sent_today: 0,
            day_epoch: window.epoch(),
            sent_total: 0,
            failed: 0,
            failed_batches: 0,
            bounced: 0,
            cooldown_until: None,
            quarantined: false,
        }
    }

    /// Messages sent within the current window.
    #[must_use]
    pub const fn sent_today(&self, window: &DailyWindow) -> usize {
        if self.day_epoch == window.epoch() {
            self.sent_today
        } else {
            0
        }
    }

    #[must_use]
    pub const fn remaining_today(&self, window: &DailyWindow) -> usize {
        self.policy.per_day.saturating_sub(self.sent_today(window))
    }

    #[must_use]
    pub fn eligibility(&self, now: Instant, window: &DailyWindow) -> Eligibility {
        if self.quarantined {
            return Eligibility::Quarantined;
        }
        if let Some(until) = self.cooldown_until.filter(|until| now < *until) {
            return Eligibility::CoolingDown { until };
        }
        if self.remaining_today(window) == 0 {
            return Eligibility::DailyCapReached {
                until: window.resets_at(),
            };
        }
        Eligibility::Eligible
    }

    #[must_use]
    pub fn is_eligible(&self, now: Instant, window: &DailyWindow) -> bool {
        self.eligibility(now, window).is_eligible()
    }

    /// Credits `count` sent messages and starts the cooldown.
    pub fn record_success(&mut self, count: usize, now: Instant, window: &DailyWindow) {
        if self.day_epoch != window.epoch() {
            self.day_epoch = window.epoch();
            self.sent_today = 0;
        }
        self.sent_today += count;
        self.sent_total += count;
        self.cooldown_until = Some(now + self.policy.cooldown);
    }

    /// Records a failed batch of `count` recipients. Returns `true` if this failure
    /// quarantined the sender.
    pub fn record_failure(&mut self, count: usize) -> bool {
        self.failed += count;
        self.failed_batches += 1;

        let limit_reached = self
            .policy
            .quarantine_after
            .is_some_and(|limit| self.failed_batches >= limit);
        if limit_reached && !self.quarantined {
            self.quarantine();
            return true;
        }
        false
    }

    pub const fn quarantine(&mut self) {
        self.quarantined = true;
    }

    #[must_use]
    pub const fn is_quarantined(&self) -> bool {
        self.quarantined
    }

    #[must_use]
    pub const fn sent_total(&self) -> usize {
        self.sent_total
    }

    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    #[must_use]
    pub const fn failed_batches(&self) -> u32 {
        self.failed_batches
    }

    /// Always zero: bounces are not processed.
    #[must_use]
    pub const fn bounced(&self) -> usize {
        self.bounced
    }

    #[must_use]
    pub const fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }
}

/// One quota per sender, in sender order, addressable by sender email.
#[derive(Debug, Clone)]
pub struct QuotaBook {
    quotas: Vec<SenderQuota>,
    index: AHashMap<String, usize>,
}

impl QuotaBook {
    /// `emails` must be unique.
    pub fn new<'a>(
        emails: impl IntoIterator<Item = &'a str>,
        policy: QuotaPolicy,
        window: &DailyWindow,
    ) -> Self {
        let mut quotas = Vec::new();
        let mut index = AHashMap::new();
        for (position, email) in emails.into_iter().enumerate() {
            index.insert(email.to_string(), position);
            quotas.push(SenderQuota::new(policy, window));
        }
        Self { quotas, index }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quotas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotas.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&SenderQuota> {
        self.quotas.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut SenderQuota> {
        self.quotas.get_mut(position)
    }

    #[must_use]
    pub fn by_email(&self, email: &str) -> Option<&SenderQuota> {
        self.index.get(email).and_then(|&position| self.get(position))
    }

    pub fn by_email_mut(&mut self, email: &str) -> Option<&mut SenderQuota> {
        let position = *self.index.get(email)?;
        self.get_mut(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SenderQuota> {
        self.quotas.iter()
    }

    /// Messages sent across every sender.
    #[must_use]
    pub fn sent_total(&self) -> usize {
        self.quotas.iter().map(SenderQuota::sent_total).sum()
    }

    #[must_use]
    pub fn all_quarantined(&self) -> bool {
        self.quotas.iter().all(SenderQuota::is_quarantined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);
    const DAY: Duration = Duration::from_secs(86400);

    fn policy(per_day: usize) -> QuotaPolicy {
        QuotaPolicy {
            per_day,
            cooldown: MINUTE,
            quarantine_after: Some(2),
        }
    }

    #[test]
    fn test_cooldown_ends_exactly_at_deadline() {
        let start = Instant::now();
        let window = DailyWindow::new(start, DAY);
        let mut quota = SenderQuota::new(policy(100), &window);

        assert!(quota.is_eligible(start, &window));
        quota.record_success(2, start, &window);

        let almost = start + MINUTE - Duration::from_millis(1);
        assert_eq!(
            quota.eligibility(almost, &window),
            Eligibility::CoolingDown {
                until: start + MINUTE
            }
        );
        assert!(quota.is_eligible(start + MINUTE, &window));
    }

    #[test]
    fn test_daily_cap_resets_lazily_with_window() {
        let start = Instant::now();
        let mut window = DailyWindow::new(start, DAY);
        let mut quota = SenderQuota::new(policy(3), &window);

        quota.record_success(3, start, &window);
        let later = start + Duration::from_secs(3600);
        assert_eq!(
            quota.eligibility(later, &window),
            Eligibility::DailyCapReached {
                until: start + DAY
            }
        );
        assert_eq!(quota.remaining_today(&window), 0);

        assert!(!window.roll(later));
        assert!(window.roll(start + DAY));
        assert_eq!(quota.sent_today(&window), 0);
        assert_eq!(quota.remaining_today(&window), 3);
        assert!(quota.is_eligible(start + DAY, &window));

        quota.record_success(1, start + DAY, &window);
        assert_eq!(quota.sent_today(&window), 1);
        assert_eq!(quota.sent_total(), 4);
    }

    #[test]
    fn test_failures_quarantine_after_limit() {
        let start = Instant::now();
        let window = DailyWindow::new(start, DAY);
        let mut quota = SenderQuota::new(policy(100), &window);

        assert!(!quota.record_failure(3));
        assert!(quota.is_eligible(start, &window));
        assert!(quota.record_failure(1));
        assert!(!quota.record_failure(1));

        assert_eq!(quota.eligibility(start, &window), Eligibility::Quarantined);
        assert_eq!(quota.failed(), 5);
        assert_eq!(quota.bounced(), 0);
    }

    #[test]
    fn test_quarantine_disabled() {
        let start = Instant::now();
        let window = DailyWindow::new(start, DAY);
        let mut quota = SenderQuota::new(
            QuotaPolicy {
                quarantine_after: None,
                ..policy(100)
            },
            &window,
        );

        for _ in 0..10 {
            assert!(!quota.record_failure(1));
        }
        assert!(!quota.is_quarantined());
    }

    #[test]
    fn test_book_lookup() {
        let window = DailyWindow::new(Instant::now(), DAY);
        let mut book = QuotaBook::new(["a@example.com", "b@example.com"], policy(10), &window);

        if let Some(quota) = book.by_email_mut("b@example.com") {
            quota.record_success(2, window.start(), &window);
        }

        assert_eq!(book.len(), 2);
        assert_eq!(book.by_email("b@example.com").map(SenderQuota::sent_total), Some(2));
        assert_eq!(book.sent_total(), 2);
        assert!(book.by_email("c@example.com").is_none());
        assert!(!book.all_quarantined());
    }
}
