use std::{ops::Range, sync::Arc};

use hermes_common::{MessageTemplates, Recipient, SenderIdentity};
use hermes_smtp::AuthMechanism;

use crate::error::SendError;

/// One sender's batch for one round.
///
/// Owned by its worker. The recipient list and templates are shared with the
/// scheduler; `range` selects this batch's slice.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub sender: Arc<SenderIdentity>,
    pub recipients: Arc<[Recipient]>,
    pub range: Range<usize>,
    pub host: String,
    pub read_receipt: Option<String>,
    pub templates: Arc<MessageTemplates>,
    pub auth: AuthMechanism,
}

impl DispatchTask {
    /// The recipients of this batch.
    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients[self.range.clone()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// What a worker reports for its batch.
#[derive(Debug)]
pub enum WorkerResult {
    /// Every recipient of the batch was accepted.
    Success { sender: String, count: usize },
    /// The batch stopped at its first error. `sent` recipients were accepted before
    /// it; `unsent` indexes the rest into the run's recipient list.
    Failure {
        sender: String,
        sent: usize,
        error: SendError,
        unsent: Range<usize>,
    },
}

impl WorkerResult {
    #[must_use]
    pub fn sender(&self) -> &str {
        match self {
            Self::Success { sender, .. } | Self::Failure { sender, .. } => sender,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// A failure covering the whole batch `range`, for workers that never reported.
    #[must_use]
    pub fn whole_batch_failure(sender: &str, range: Range<usize>, error: SendError) -> Self {
        Self::Failure {
            sender: sender.to_string(),
            sent: 0,
            error,
            unsent: range,
        }
    }
}
