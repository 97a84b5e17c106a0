//! RFC 5322 message construction.
//!
//! Produces text-only, HTML-only or `multipart/alternative` messages with CRLF line
//! endings. Blind copies are an envelope concern and never appear here.

use std::{
    fmt::Write as _,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::error::{ClientError, Result};

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Builder for a single outbound message.
///
/// ```
/// use hermes_smtp::client::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("Emma Anderson <emma@example.com>")
///     .to("john@example.com")
///     .subject("Hello")
///     .text("This is the message body")
///     .build()
///     .unwrap();
///
/// assert!(message.contains("Content-Type: text/plain; charset=utf-8"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    subject: Option<String>,
    headers: Vec<(String, String)>,
    text: Option<String>,
    html: Option<String>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From header (a mailbox, optionally with a display name).
    #[must_use]
    pub fn from(mut self, mailbox: impl Into<String>) -> Self {
        self.from = Some(mailbox.into());
        self
    }

    #[must_use]
    pub fn to(mut self, email: impl Into<String>) -> Self {
        self.to.push(email.into());
        self
    }

    #[must_use]
    pub fn cc_multiple(mut self, emails: &[impl AsRef<str>]) -> Self {
        self.cc
            .extend(emails.iter().map(|email| email.as_ref().to_string()));
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a custom header. Headers are written in the order they were added.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    #[must_use]
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BuilderError`] when the sender, every recipient or
    /// both bodies are missing.
    pub fn build(self) -> Result<String> {
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| ClientError::BuilderError("No From mailbox".to_string()))?;
        if self.to.is_empty() {
            return Err(ClientError::BuilderError("No To recipient".to_string()));
        }

        let mut message = String::with_capacity(1024);
        write_header(&mut message, "From", from);
        write_header(&mut message, "To", &self.to.join(", "));
        if !self.cc.is_empty() {
            write_header(&mut message, "Cc", &self.cc.join(", "));
        }
        if let Some(subject) = &self.subject {
            write_header(&mut message, "Subject", &encode_header_value(subject));
        }
        for (name, value) in &self.headers {
            write_header(&mut message, name, value);
        }
        write_header(&mut message, "MIME-Version", "1.0");

        match (&self.text, &self.html) {
            (Some(text), None) => write_part(&mut message, "text/plain", text),
            (None, Some(html)) => write_part(&mut message, "text/html", html),
            (Some(text), Some(html)) => {
                let boundary = generate_boundary();
                write_header(
                    &mut message,
                    "Content-Type",
                    &format!("multipart/alternative; boundary=\"{boundary}\""),
                );
                message.push_str("\r\n");

                let _ = write!(message, "--{boundary}\r\n");
                write_part(&mut message, "text/plain", text);
                message.push_str("\r\n");
                let _ = write!(message, "--{boundary}\r\n");
                write_part(&mut message, "text/html", html);
                message.push_str("\r\n");
                let _ = write!(message, "--{boundary}--\r\n");
            }
            (None, None) => {
                return Err(ClientError::BuilderError("No message body".to_string()));
            }
        }

        Ok(message)
    }
}

fn write_header(message: &mut String, name: &str, value: &str) {
    let _ = write!(message, "{name}: {value}\r\n");
}

/// Writes the content headers, a blank line and the body of one part.
fn write_part(message: &mut String, content_type: &str, body: &str) {
    write_header(
        message,
        "Content-Type",
        &format!("{content_type}; charset=utf-8"),
    );
    write_header(message, "Content-Transfer-Encoding", "8bit");
    message.push_str("\r\n");
    message.push_str(&normalize_line_endings(body));
}

/// Converts lone `\n` and `\r` to CRLF.
fn normalize_line_endings(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            c => out.push(c),
        }
    }
    out
}

/// RFC 2047 encodes a header value that is not plain ASCII.
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

fn generate_boundary() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let sequence = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("----=_Part_{timestamp}_{sequence}")
}
