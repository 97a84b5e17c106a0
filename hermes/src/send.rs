use std::sync::Arc;

use anyhow::Context;
use hermes_common::{MessageTemplates, Template, load_recipients, load_senders};
use hermes_dispatch::{Clock, DispatchReport, Scheduler, SmtpTransport, SystemClock, Transport};

use crate::{cli::SendArgs, config::Config};

/// Loads the subject and whichever bodies were given.
///
/// # Errors
///
/// Returns an error if a template file cannot be read or does not parse.
pub fn load_templates(args: &SendArgs) -> anyhow::Result<MessageTemplates> {
    let subject = Template::parse("subject", &args.subject).context("Invalid subject template")?;
    let text = args
        .text
        .as_ref()
        .map(|path| {
            Template::from_file("text", path)
                .with_context(|| format!("Failed to load text template {}", path.display()))
        })
        .transpose()?;
    let html = args
        .html
        .as_ref()
        .map(|path| {
            Template::from_file("html", path)
                .with_context(|| format!("Failed to load HTML template {}", path.display()))
        })
        .transpose()?;

    Ok(MessageTemplates::new(subject, text, html)?)
}

/// Builds a scheduler from the command line and configuration.
///
/// # Errors
///
/// Returns an error if any input file fails to load or the configuration is invalid.
pub fn build_scheduler(
    args: &SendArgs,
    config: Config,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Scheduler> {
    let senders = load_senders(&args.senders)
        .with_context(|| format!("Failed to load senders from {}", args.senders.display()))?;
    let recipients = load_recipients(&args.receivers)
        .with_context(|| format!("Failed to load receivers from {}", args.receivers.display()))?;
    let templates = load_templates(args)?;

    tracing::info!(
        senders = senders.len(),
        recipients = recipients.len(),
        host = %config.dispatch.host,
        "starting dispatch"
    );

    Ok(Scheduler::new(
        config.dispatch,
        senders,
        recipients,
        templates,
        transport,
        clock,
    )?)
}

/// Runs `hermes send` over SMTP in real time.
///
/// # Errors
///
/// Returns an error if the run cannot be set up, is aborted, or its failed
/// recipients cannot be written.
pub async fn send(args: &SendArgs, mut config: Config) -> anyhow::Result<DispatchReport> {
    args.apply(&mut config);

    let transport = Arc::new(SmtpTransport::new(config.smtp.clone()));
    let mut scheduler = build_scheduler(args, config, transport, Arc::new(SystemClock))?;

    Ok(scheduler.run().await?)
}
