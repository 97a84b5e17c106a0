//! Rate-limited dispatch of a recipient list across a pool of sender identities.
//!
//! The [`Scheduler`] hands contiguous batches of recipients to eligible senders
//! round-robin, runs up to `workers` batches concurrently per round, and folds the
//! results back into per-sender quotas once every batch of the round has reported.
//! Persistent failures trip a circuit breaker that aborts the run; recipients that
//! could not be sent are written to a CSV file in the recipient record shape.

pub mod aggregator;
pub mod batch;
pub mod clock;
pub mod config;
pub mod error;
pub mod failures;
pub mod quota;
pub mod scheduler;
pub mod task;
pub mod transport;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatchConfig, SmtpTimeouts, SmtpTransportConfig, TlsPolicy};
pub use error::{BuildError, DispatchError, PersistError, SendError, TransportError};
pub use failures::FailureLog;
pub use quota::{DailyWindow, Eligibility, QuotaBook, SenderQuota};
pub use scheduler::{DispatchReport, Scheduler};
pub use task::{DispatchTask, WorkerResult};
pub use transport::{BatchError, OutboundMessage, SmtpTransport, Transport};
