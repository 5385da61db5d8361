use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::error;
use probe_models::RunSummary;
use sip_crab::helpers::{bootstrap, logging, stop};

mod error;
/// Console output of per-attempt lines and the final summary.
mod report;
/// Repeats probe transactions at a fixed cadence and folds their outcomes.
mod schedule;
mod sip_message;
mod transaction;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[clap(flatten)]
    logging: logging::Params,

    #[clap(flatten)]
    scheduler: schedule::Params,

    /// Print the final summary as JSON instead of the per-attempt lines and text summary
    #[arg(long)]
    json: bool,

    /// Hostname or IP address of the SIP endpoint to probe
    destination: String,
}

fn main() -> ExitCode {
    match bootstrap::run(parse_cli, |cli: &Cli| &cli.logging, do_run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn parse_cli() -> Cli {
    Cli::try_parse().unwrap_or_else(|err| {
        // --help and --version also end up here, these are not failures
        let _ = err.print();
        std::process::exit(if err.use_stderr() { 1 } else { 0 })
    })
}

async fn do_run(cli: Cli) -> Result<()> {
    let sig_handler = stop::new();
    let stop_rx = sig_handler.subscribe_stop();
    tokio::spawn(async move {
        if let Err(err) = sig_handler.wait_for_signal().await {
            error!("Unable to listen for signals, Ctrl+C will not stop gracefully: {:#}", err);
        }
    });
    // single-threaded runtime, give the handler a chance to register before probing
    tokio::task::yield_now().await;

    let config = schedule::RunConfig::from(cli.scheduler);
    let resolving = schedule::resolve_target(&cli.destination, config.port);
    let Some(target) = stop::until_stopped(&stop_rx, resolving).await.transpose()? else {
        let nothing = schedule::RunResult { interrupted: true, summary: RunSummary::Empty };
        return report::print_result(&nothing, cli.json);
    };
    if !cli.json {
        println!("{}", report::header_line(&target));
    }

    let mut reporter = report::ConsoleReporter::new(cli.json);
    let result = schedule::run(&target, &config, &stop_rx, &mut reporter).await?;
    report::print_result(&result, cli.json)
}
