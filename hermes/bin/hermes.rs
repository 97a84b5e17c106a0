#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use clap::Parser;
use hermes::{Cli, Command, Config, send::send};
use hermes_common::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Send(args) => {
            let failures_path = config.dispatch.failures_path.clone();
            let report = send(&args, config).await?;
            tracing::info!(
                rounds = report.rounds,
                sent = report.sent,
                failed = report.failed,
                "dispatch complete"
            );
            if report.failed > 0 {
                eprintln!(
                    "{} of {} recipients failed; they were written to {}",
                    report.failed,
                    report.sent + report.failed,
                    failures_path.display()
                );
            }
        }
    }

    Ok(())
}
