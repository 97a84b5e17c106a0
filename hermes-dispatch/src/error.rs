//! Error taxonomy for a dispatch run.
//!
//! - [`BuildError`]: the scheduler could not be constructed; nothing was sent.
//! - [`TransportError`] / [`SendError`]: one batch failed. Recorded, not fatal alone.
//! - [`DispatchError`]: the run stopped early (circuit breaker, no usable senders) or
//!   the failed-recipient file could not be written.

use std::path::PathBuf;

use hermes_common::{RecordError, TemplateError};
use hermes_smtp::client::ClientError;
use thiserror::Error;

/// Failures of the SMTP transport for one batch.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connection or greeting failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// TLS is required but the server does not offer it, or the upgrade failed.
    #[error("TLS required: {0}")]
    TlsRequired(String),

    /// Credentials would have been sent in the clear to a remote host.
    #[error("Refusing to authenticate over an unencrypted connection to {host}")]
    PlaintextCredentials { host: String },

    /// The server rejected the credentials.
    #[error("Authentication failed: {code} {message}")]
    AuthenticationFailed { code: u16, message: String },

    /// The server rejected a command.
    #[error("Server rejected {stage}: {code} {message}")]
    Rejected {
        stage: &'static str,
        code: u16,
        message: String,
    },

    /// An SMTP operation did not complete in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The underlying client failed (I/O, parse, closed connection).
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl TransportError {
    /// Returns `true` if retrying the same batch cannot succeed without a change in
    /// configuration or data (5xx replies, bad credentials, TLS policy).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::TlsRequired(_)
            | Self::PlaintextCredentials { .. }
            | Self::AuthenticationFailed { .. } => true,
            Self::Rejected { code, .. } => *code >= 500 && *code < 600,
            Self::Connect(_) | Self::Timeout(_) | Self::Client(_) => false,
        }
    }

    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        !self.is_permanent()
    }
}

/// Why a batch failed.
#[derive(Debug, Error)]
pub enum SendError {
    /// A template referenced a variable the recipient does not define.
    #[error("Template rendering failed: {0}")]
    Render(#[from] TemplateError),

    /// The message could not be assembled.
    #[error("Message construction failed: {0}")]
    Message(#[source] ClientError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The worker task panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl SendError {
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// The scheduler could not be constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No senders were provided")]
    NoSenders,

    #[error("Sender {0} appears more than once")]
    DuplicateSender(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Writing the failed-recipient file failed.
#[derive(Debug, Error)]
#[error("Failed to write failed recipients to {path}: {source}")]
pub struct PersistError {
    pub path: PathBuf,
    #[source]
    pub source: RecordError,
}

/// The run ended with an error.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Consecutive failed batches reached the error threshold.
    #[error("Aborting after {consecutive} consecutive failed batches (threshold {threshold}): {cause}")]
    CircuitOpen {
        consecutive: u32,
        threshold: u32,
        #[source]
        cause: SendError,
    },

    /// Every sender was quarantined while recipients remained.
    #[error("All senders are quarantined with {remaining} recipients left undispatched")]
    SendersExhausted { remaining: usize },

    #[error(transparent)]
    Persist(#[from] PersistError),

    /// The run aborted and the failed recipients could not be written either.
    #[error("{abort}; additionally, {persist}")]
    Combined {
        abort: Box<DispatchError>,
        persist: PersistError,
    },
}

impl DispatchError {
    /// Returns `true` if the run stopped before every recipient was dispatched.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        match self {
            Self::CircuitOpen { .. } | Self::SendersExhausted { .. } => true,
            Self::Persist(_) => false,
            Self::Combined { abort, .. } => abort.is_abort(),
        }
    }
}
