//! Delivery of a rendered batch over one authenticated SMTP session.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use hermes_common::SenderIdentity;
use hermes_smtp::{
    AuthMechanism,
    client::{ClientError, Response, SmtpClient},
};
use thiserror::Error;

use crate::{
    config::{SmtpTransportConfig, TlsPolicy},
    error::TransportError,
};

/// One fully rendered message and its SMTP envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Envelope recipients: the recipient, then cc, then bcc.
    pub envelope: Vec<String>,
    /// RFC 5322 content.
    pub content: String,
}

/// A batch send stopped at `index`; messages before it were accepted.
#[derive(Debug, Error)]
#[error("Message {index} of the batch failed: {error}")]
pub struct BatchError {
    pub index: usize,
    #[source]
    pub error: TransportError,
}

impl BatchError {
    /// A failure before any message was attempted.
    #[must_use]
    pub const fn connection(error: TransportError) -> Self {
        Self { index: 0, error }
    }
}

/// Sends every message of a batch as `sender` through `host`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns the index of the first message that was not accepted together with
    /// the reason.
    async fn send_batch(
        &self,
        sender: &SenderIdentity,
        host: &str,
        auth: AuthMechanism,
        messages: &[OutboundMessage],
    ) -> Result<(), BatchError>;
}

/// Hosts that may receive credentials without TLS.
#[must_use]
pub fn is_localhost(host: &str) -> bool {
    matches!(host, "localhost" | "::1" | "[::1]") || host.starts_with("127.")
}

async fn timed<T>(
    secs: u64,
    what: &str,
    operation: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, TransportError> {
    let limit = Duration::from_secs(secs);
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| TransportError::Timeout(format!("{what} timed out after {limit:?}")))?
        .map_err(TransportError::from)
}

fn expect_success(response: &Response, stage: &'static str) -> Result<(), TransportError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            stage,
            code: response.code,
            message: response.message(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsOutcome {
    Upgraded,
    Plaintext,
    RetryWithoutTls,
}

/// [`Transport`] over SMTP submission with STARTTLS and AUTH.
#[derive(Debug, Clone, Default)]
pub struct SmtpTransport {
    config: SmtpTransportConfig,
}

impl SmtpTransport {
    #[must_use]
    pub const fn new(config: SmtpTransportConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SmtpTransportConfig {
        &self.config
    }

    async fn connect_and_greet(&self, host: &str) -> Result<SmtpClient, TransportError> {
        let address = format!("{host}:{}", self.config.port);
        let mut client = timed(
            self.config.timeouts.connect_secs,
            "Connect",
            SmtpClient::connect(&address, host.to_string()),
        )
        .await
        .map_err(|e| TransportError::Connect(format!("Failed to connect to {address}: {e}")))?
        .accept_invalid_certs(self.config.accept_invalid_certs);

        let greeting = timed(
            self.config.timeouts.greeting_secs,
            "Greeting",
            client.read_greeting(),
        )
        .await?;
        if !greeting.is_success() {
            return Err(TransportError::Connect(format!(
                "Server rejected connection: {} {}",
                greeting.code,
                greeting.message()
            )));
        }

        Ok(client)
    }

    async fn ehlo(&self, client: &mut SmtpClient) -> Result<Response, TransportError> {
        let response = timed(
            self.config.timeouts.ehlo_secs,
            "EHLO",
            client.ehlo(&self.config.helo_name),
        )
        .await?;
        expect_success(&response, "EHLO")?;
        Ok(response)
    }

    async fn negotiate_tls(
        &self,
        client: &mut SmtpClient,
        host: &str,
        ehlo: &Response,
    ) -> Result<TlsOutcome, TransportError> {
        let required = self.config.tls == TlsPolicy::Required;

        if !ehlo.has_extension("STARTTLS") {
            if required && !is_localhost(host) {
                return Err(TransportError::TlsRequired(format!(
                    "{host} does not offer STARTTLS"
                )));
            }
            return Ok(TlsOutcome::Plaintext);
        }

        let result = timed(
            self.config.timeouts.starttls_secs,
            "STARTTLS",
            client.starttls(),
        )
        .await;

        match result {
            Ok(response) if response.is_success() => Ok(TlsOutcome::Upgraded),
            Ok(response) => {
                let reason = format!(
                    "Server rejected STARTTLS: {} {}",
                    response.code,
                    response.message()
                );
                if required {
                    return Err(TransportError::TlsRequired(reason));
                }
                tracing::info!(host, %reason, "continuing without TLS");
                Ok(TlsOutcome::Plaintext)
            }
            Err(e) if required => Err(TransportError::TlsRequired(e.to_string())),
            Err(e) => {
                tracing::info!(host, error = %e, "STARTTLS failed, reconnecting without TLS");
                Ok(TlsOutcome::RetryWithoutTls)
            }
        }
    }

    /// Connects, negotiates TLS and authenticates.
    async fn open_session(
        &self,
        sender: &SenderIdentity,
        host: &str,
        auth: AuthMechanism,
    ) -> Result<SmtpClient, TransportError> {
        let mut client = self.connect_and_greet(host).await?;
        let ehlo = self.ehlo(&mut client).await?;

        match self.negotiate_tls(&mut client, host, &ehlo).await? {
            TlsOutcome::Upgraded => {
                self.ehlo(&mut client).await?;
            }
            TlsOutcome::Plaintext => {}
            TlsOutcome::RetryWithoutTls => {
                drop(client);
                client = self.connect_and_greet(host).await?;
                self.ehlo(&mut client).await?;
            }
        }

        if !client.is_tls() && !is_localhost(host) {
            return Err(TransportError::PlaintextCredentials {
                host: host.to_string(),
            });
        }

        let response = timed(
            self.config.timeouts.auth_secs,
            "AUTH",
            client.authenticate(auth, &sender.email, &sender.password),
        )
        .await?;
        if !response.is_success() {
            return Err(TransportError::AuthenticationFailed {
                code: response.code,
                message: response.message(),
            });
        }

        Ok(client)
    }

    async fn send_message(
        &self,
        client: &mut SmtpClient,
        sender: &SenderIdentity,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        let timeouts = &self.config.timeouts;

        let response = timed(
            timeouts.mail_from_secs,
            "MAIL FROM",
            client.mail_from(&sender.email),
        )
        .await?;
        expect_success(&response, "MAIL FROM")?;

        for recipient in &message.envelope {
            let response =
                timed(timeouts.rcpt_to_secs, "RCPT TO", client.rcpt_to(recipient)).await?;
            expect_success(&response, "RCPT TO")?;
        }

        let response = timed(timeouts.data_secs, "DATA", client.data()).await?;
        if !response.is_intermediate() {
            return Err(TransportError::Rejected {
                stage: "DATA",
                code: response.code,
                message: response.message(),
            });
        }

        let response = timed(
            timeouts.data_secs,
            "Message data",
            client.send_data(&message.content),
        )
        .await?;
        expect_success(&response, "message data")
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(sender = %sender.email, host, messages = messages.len())
    )]
    async fn send_batch(
        &self,
        sender: &SenderIdentity,
        host: &str,
        auth: AuthMechanism,
        messages: &[OutboundMessage],
    ) -> Result<(), BatchError> {
        if self.config.accept_invalid_certs {
            tracing::warn!(
                host,
                "SECURITY WARNING: TLS certificate validation is disabled for this connection"
            );
        }

        let mut client = self
            .open_session(sender, host, auth)
            .await
            .map_err(BatchError::connection)?;

        for (index, message) in messages.iter().enumerate() {
            self.send_message(&mut client, sender, message)
                .await
                .map_err(|error| BatchError { index, error })?;
        }

        let quit_timeout = Duration::from_secs(self.config.timeouts.quit_secs);
        match tokio::time::timeout(quit_timeout, client.quit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                tracing::debug!(host, %error, "QUIT failed after a delivered batch");
            }
            Err(_) => {
                tracing::warn!(host, timeout = ?quit_timeout, "QUIT timed out after a delivered batch");
            }
        }

        Ok(())
    }
}
