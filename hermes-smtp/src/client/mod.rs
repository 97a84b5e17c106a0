//! Async SMTP submission client.
//!
//! Supports plain TCP with a STARTTLS upgrade, AUTH PLAIN / LOGIN / CRAM-MD5 and
//! dot-stuffed DATA. Commands are sent one at a time and each reply is read before the
//! next command; there is no pipelining.
//!
//! ```no_run
//! use hermes_smtp::{AuthMechanism, client::{MessageBuilder, SmtpClient}};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("smtp.example.com:587", "smtp.example.com".into()).await?;
//! client.read_greeting().await?;
//! client.ehlo("localhost").await?;
//! client.starttls().await?;
//! client.ehlo("localhost").await?;
//! client
//!     .authenticate(AuthMechanism::Plain, "emma@example.com", "secret")
//!     .await?;
//!
//! let message = MessageBuilder::new()
//!     .from("emma@example.com")
//!     .to("john@example.com")
//!     .subject("Hello")
//!     .text("Hello World")
//!     .build()?;
//!
//! client.mail_from("emma@example.com").await?;
//! client.rcpt_to("john@example.com").await?;
//! client.data().await?;
//! client.send_data(&message).await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod message;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use message::MessageBuilder;
pub use response::{Response, ResponseLine};
pub use smtp_client::SmtpClient;
