//! Executes one [`DispatchTask`].
//!
//! Every message of the batch is rendered before anything is sent, so a template
//! failure fails the batch without a connection ever being opened.

use hermes_common::{Recipient, RenderedContent, SenderIdentity, internal};
use hermes_smtp::client::MessageBuilder;

use crate::{
    error::SendError,
    task::{DispatchTask, WorkerResult},
    transport::{OutboundMessage, Transport},
};

/// Builds the message for `recipient` from its rendered content.
///
/// # Errors
///
/// Returns [`SendError::Message`] if the message cannot be assembled.
pub fn compose(
    sender: &SenderIdentity,
    recipient: &Recipient,
    content: RenderedContent,
    read_receipt: Option<&str>,
) -> Result<OutboundMessage, SendError> {
    let mut builder = MessageBuilder::new()
        .from(sender.mailbox())
        .to(recipient.email.as_str())
        .cc_multiple(recipient.cc.as_slice())
        .subject(content.subject);

    if let Some(address) = read_receipt {
        builder = builder
            .header("Disposition-Notification-To", address)
            .header("Return-Receipt-To", address);
    }
    if let Some(text) = content.text {
        builder = builder.text(text);
    }
    if let Some(html) = content.html {
        builder = builder.html(html);
    }

    let content = builder.build().map_err(SendError::Message)?;

    Ok(OutboundMessage {
        envelope: recipient.envelope().map(str::to_string).collect(),
        content,
    })
}

fn render_batch(task: &DispatchTask) -> Result<Vec<OutboundMessage>, SendError> {
    task.recipients()
        .iter()
        .map(|recipient| {
            let content = task.templates.render(&recipient.variables)?;
            compose(
                &task.sender,
                recipient,
                content,
                task.read_receipt.as_deref(),
            )
        })
        .collect()
}

/// Renders and sends `task` through `transport`, reporting a single result.
pub async fn run(task: DispatchTask, transport: &dyn Transport) -> WorkerResult {
    let sender = task.sender.email.clone();
    let range = task.range.clone();

    let messages = match render_batch(&task) {
        Ok(messages) => messages,
        Err(error) => {
            internal!(
                level = WARN,
                "Batch of {} for {sender} could not be rendered: {error}",
                range.len()
            );
            return WorkerResult::whole_batch_failure(&sender, range, error);
        }
    };

    match transport
        .send_batch(&task.sender, &task.host, task.auth, &messages)
        .await
    {
        Ok(()) => {
            internal!(level = DEBUG, "{sender} sent a batch of {}", range.len());
            WorkerResult::Success {
                sender,
                count: range.len(),
            }
        }
        Err(failure) => {
            let sent = failure.index.min(range.len());
            internal!(
                level = WARN,
                "{sender} failed after {sent} of {} messages: {}",
                range.len(),
                failure.error
            );
            WorkerResult::Failure {
                sender,
                sent,
                error: SendError::Transport(failure.error),
                unsent: range.start + sent..range.end,
            }
        }
    }
}
