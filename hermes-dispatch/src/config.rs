use std::{path::PathBuf, time::Duration};

use hermes_smtp::AuthMechanism;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

const fn default_workers() -> usize {
    2
}

const fn default_per_minute() -> usize {
    2
}

const fn default_per_day() -> usize {
    100
}

const fn default_error_threshold() -> u32 {
    6
}

const fn default_cooldown() -> u64 {
    60
}

const fn default_skip_pause() -> u64 {
    2
}

const fn default_daily_window() -> u64 {
    86400 // 24 hours
}

#[allow(clippy::unnecessary_wraps)]
const fn default_quarantine_after() -> Option<u32> {
    Some(3)
}

fn default_failures_path() -> PathBuf {
    PathBuf::from("errored_receivers.csv")
}

/// Settings for one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Batches launched concurrently per round.
    ///
    /// Default: 2
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Largest batch handed to one sender in one round.
    ///
    /// Default: 2
    #[serde(default = "default_per_minute")]
    pub per_minute: usize,

    /// Messages one sender may send within a daily window.
    ///
    /// Default: 100
    #[serde(default = "default_per_day")]
    pub per_day: usize,

    /// Consecutive failed batches that abort the run.
    ///
    /// Default: 6
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,

    /// Address that read receipts are requested to.
    #[serde(default)]
    pub read_receipt: Option<String>,

    /// SMTP host every sender submits through.
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub auth: AuthMechanism,

    /// Seconds a sender rests after a batch. Not derived from `per_minute`.
    ///
    /// Default: 60
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Seconds to pause after passing over an ineligible sender.
    ///
    /// Default: 2
    #[serde(default = "default_skip_pause")]
    pub skip_pause_secs: u64,

    /// Length of the shared window `per_day` is counted over.
    ///
    /// Default: 86400 (24 hours)
    #[serde(default = "default_daily_window")]
    pub daily_window_secs: u64,

    /// Failed batches after which a sender is excluded from the rest of the run.
    /// `None` never quarantines.
    ///
    /// Default: 3
    #[serde(default = "default_quarantine_after")]
    pub quarantine_after: Option<u32>,

    /// Where recipients that could not be sent are written.
    ///
    /// Default: `errored_receivers.csv`
    #[serde(default = "default_failures_path")]
    pub failures_path: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            per_minute: default_per_minute(),
            per_day: default_per_day(),
            error_threshold: default_error_threshold(),
            read_receipt: None,
            host: String::new(),
            auth: AuthMechanism::default(),
            cooldown_secs: default_cooldown(),
            skip_pause_secs: default_skip_pause(),
            daily_window_secs: default_daily_window(),
            quarantine_after: default_quarantine_after(),
            failures_path: default_failures_path(),
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    #[must_use]
    pub const fn skip_pause(&self) -> Duration {
        Duration::from_secs(self.skip_pause_secs)
    }

    #[must_use]
    pub const fn daily_window(&self) -> Duration {
        Duration::from_secs(self.daily_window_secs)
    }

    /// # Errors
    ///
    /// Returns [`BuildError::InvalidConfig`] for a zero limit, an empty host or a zero
    /// length daily window.
    pub fn validate(&self) -> Result<(), BuildError> {
        let invalid = |reason: &str| Err(BuildError::InvalidConfig(reason.to_string()));

        if self.workers == 0 {
            return invalid("workers must be at least 1");
        }
        if self.per_minute == 0 {
            return invalid("per_minute must be at least 1");
        }
        if self.per_day == 0 {
            return invalid("per_day must be at least 1");
        }
        if self.error_threshold == 0 {
            return invalid("error_threshold must be at least 1");
        }
        if self.quarantine_after == Some(0) {
            return invalid("quarantine_after must be at least 1");
        }
        if self.daily_window_secs == 0 {
            return invalid("daily_window_secs must be at least 1");
        }
        if self.host.trim().is_empty() {
            return invalid("an SMTP host is required");
        }
        Ok(())
    }
}

/// How STARTTLS is treated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsPolicy {
    /// Fail the batch unless the connection is upgraded. Local hosts that do not
    /// offer STARTTLS are exempt.
    #[default]
    Required,
    /// Upgrade when offered; otherwise continue in plaintext.
    Opportunistic,
}

/// SMTP operation timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpTimeouts {
    /// Default: 30 seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_secs: u64,

    /// Wait for the server's 220 greeting after connecting.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_greeting_timeout")]
    pub greeting_secs: u64,

    /// Default: 30 seconds
    #[serde(default = "default_ehlo_timeout")]
    pub ehlo_secs: u64,

    /// Default: 30 seconds
    #[serde(default = "default_starttls_timeout")]
    pub starttls_secs: u64,

    /// Default: 30 seconds
    #[serde(default = "default_auth_timeout")]
    pub auth_secs: u64,

    /// Default: 30 seconds
    #[serde(default = "default_mail_from_timeout")]
    pub mail_from_secs: u64,

    /// Default: 30 seconds
    #[serde(default = "default_rcpt_to_timeout")]
    pub rcpt_to_secs: u64,

    /// DATA command and message transmission.
    ///
    /// Default: 120 seconds
    #[serde(default = "default_data_timeout")]
    pub data_secs: u64,

    /// Default: 10 seconds
    #[serde(default = "default_quit_timeout")]
    pub quit_secs: u64,
}

impl Default for SmtpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_timeout(),
            greeting_secs: default_greeting_timeout(),
            ehlo_secs: default_ehlo_timeout(),
            starttls_secs: default_starttls_timeout(),
            auth_secs: default_auth_timeout(),
            mail_from_secs: default_mail_from_timeout(),
            rcpt_to_secs: default_rcpt_to_timeout(),
            data_secs: default_data_timeout(),
            quit_secs: default_quit_timeout(),
        }
    }
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_greeting_timeout() -> u64 {
    30
}

const fn default_ehlo_timeout() -> u64 {
    30
}

const fn default_starttls_timeout() -> u64 {
    30
}

const fn default_auth_timeout() -> u64 {
    30
}

const fn default_mail_from_timeout() -> u64 {
    30
}

const fn default_rcpt_to_timeout() -> u64 {
    30
}

const fn default_data_timeout() -> u64 {
    120
}

const fn default_quit_timeout() -> u64 {
    10
}

const fn default_port() -> u16 {
    587
}

fn default_helo_name() -> String {
    "localhost".to_string()
}

/// Connection settings for [`crate::SmtpTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpTransportConfig {
    /// Submission port.
    ///
    /// Default: 587
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub tls: TlsPolicy,

    /// Accept any server certificate. Only for testing against self-signed servers.
    ///
    /// Default: `false`
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Name announced in EHLO.
    ///
    /// Default: `localhost`
    #[serde(default = "default_helo_name")]
    pub helo_name: String,

    #[serde(default)]
    pub timeouts: SmtpTimeouts,
}

impl Default for SmtpTransportConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            tls: TlsPolicy::default(),
            accept_invalid_certs: false,
            helo_name: default_helo_name(),
            timeouts: SmtpTimeouts::default(),
        }
    }
}
