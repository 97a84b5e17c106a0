use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use hermes_smtp::AuthMechanism;
use tracing::level_filters::LevelFilter;

use crate::config::Config;

/// Send a templated mailing across a pool of rate-limited sender accounts
#[derive(Parser, Debug)]
#[command(name = "hermes")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Log level (overrides `LOG_LEVEL`)
    #[arg(long, global = true)]
    pub log_level: Option<LevelFilter>,

    /// Configuration file (overrides `HERMES_CONFIG` and the default locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message to every receiver
    Send(SendArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[command(group(
    ArgGroup::new("body")
        .required(true)
        .multiple(true)
        .args(["text", "html"])
))]
pub struct SendArgs {
    /// CSV file of sender accounts (`email,password,name`)
    #[arg(short, long)]
    pub senders: PathBuf,

    /// CSV file of receivers (`email,cc,bcc,variables`)
    #[arg(short, long)]
    pub receivers: PathBuf,

    /// Subject template
    #[arg(short = 'S', long)]
    pub subject: String,

    /// SMTP host to submit through
    #[arg(long)]
    pub host: Option<String>,

    /// Plain-text body template
    #[arg(short, long)]
    pub text: Option<PathBuf>,

    /// HTML body template
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Request read receipts to this address
    #[arg(short = 'R', long)]
    pub read_receipts: Option<String>,

    /// Batches sent concurrently per round
    #[arg(long)]
    pub workers: Option<usize>,

    /// Largest batch per sender per round
    #[arg(long)]
    pub per_minute: Option<usize>,

    /// Messages per sender per day
    #[arg(long)]
    pub per_day: Option<usize>,

    /// Consecutive failed batches before the run is aborted
    #[arg(long)]
    pub error_threshold: Option<u32>,

    /// Authentication mechanism: plain, login or cram-md5
    #[arg(long)]
    pub auth: Option<AuthMechanism>,

    /// Submission port
    #[arg(long)]
    pub port: Option<u16>,
}

impl SendArgs {
    /// Overrides `config` with every flag that was given.
    pub fn apply(&self, config: &mut Config) {
        let dispatch = &mut config.dispatch;

        if let Some(host) = &self.host {
            dispatch.host.clone_from(host);
        }
        if let Some(address) = &self.read_receipts {
            dispatch.read_receipt = Some(address.clone());
        }
        if let Some(workers) = self.workers {
            dispatch.workers = workers;
        }
        if let Some(per_minute) = self.per_minute {
            dispatch.per_minute = per_minute;
        }
        if let Some(per_day) = self.per_day {
            dispatch.per_day = per_day;
        }
        if let Some(threshold) = self.error_threshold {
            dispatch.error_threshold = threshold;
        }
        if let Some(auth) = self.auth {
            dispatch.auth = auth;
        }
        if let Some(port) = self.port {
            config.smtp.port = port;
        }
    }
}
