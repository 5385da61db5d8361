use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use human_panic::setup_panic;
use log::debug;

use crate::helpers::logging;

/// Sets up the process-wide plumbing (panic handler, `.env`, logging, Tokio runtime) and then
/// drives `fn_run` to completion on a single-threaded runtime.
pub fn run<CliType, F, Fut, T>(
    fn_cli_parse: fn() -> CliType,
    fn_extract_logging: fn(&CliType) -> &logging::Params,
    fn_run: F,
) -> Result<T>
where
    F: FnOnce(CliType) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    setup_panic!();
    // .env needs to be loaded before parsing, otherwise clap won't see the env fallbacks
    match dotenvy::dotenv() {
        Err(env_err) if !env_err.not_found() => {
            return Err(env_err).with_context(|| "Failed to load `.env` file");
        }
        _ => {}
    }

    let cli = fn_cli_parse();
    let logger_handle = logging::configure_from(fn_extract_logging(&cli))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to start Tokio runtime")?;

    let command_result = runtime.block_on(fn_run(cli));

    debug!("Waiting up to 1 second for remaining tasks to finish");
    runtime.shutdown_timeout(Duration::from_secs(1));

    // Important with non-direct write mode
    // Handle needs to be kept alive until end of program
    logger_handle.flush();

    command_result
}
