use std::ops::Range;

/// The next slice of pending recipients.
///
/// Its length is `min(per_minute, remaining_today, total - cursor)`; an empty range
/// means there is nothing left to hand out (or the sender has no allowance left).
#[must_use]
pub fn next_batch(
    cursor: usize,
    total: usize,
    per_minute: usize,
    remaining_today: usize,
) -> Range<usize> {
    let len = per_minute
        .min(remaining_today)
        .min(total.saturating_sub(cursor));
    cursor..cursor + len
}

/// Walks the recipient list front to back, handing out each recipient exactly once.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    cursor: usize,
    total: usize,
    per_minute: usize,
}

impl BatchBuilder {
    #[must_use]
    pub const fn new(total: usize, per_minute: usize) -> Self {
        Self {
            cursor: 0,
            total,
            per_minute,
        }
    }

    /// Takes the next batch for a sender with `remaining_today` messages left, or
    /// `None` if that batch would be empty.
    pub fn next(&mut self, remaining_today: usize) -> Option<Range<usize>> {
        let range = next_batch(self.cursor, self.total, self.per_minute, remaining_today);
        if range.is_empty() {
            return None;
        }
        self.cursor = range.end;
        Some(range)
    }

    /// Recipients handed out so far.
    #[must_use]
    pub const fn dispatched(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total - self.cursor
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.cursor >= self.total
    }
}
