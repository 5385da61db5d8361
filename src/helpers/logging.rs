use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use flexi_logger::{colored_default_format, detailed_format, Logger, LoggerHandle, WriteMode};
use log::Level;

const DEFAULT_LOG_SPEC_FILE: &str = "logspec.toml";

/// Probe results go to stdout, so log lines go to stderr and stay at warnings unless asked otherwise.
#[derive(Args, Debug)]
#[group(id = "logging")]
pub struct Params {
    #[clap(flatten)]
    verbose: Verbosity<WarnLevel>,

    /// Read the log spec from `logspec.toml` (flexi_logger format, reloaded on change)
    #[arg(long = "log-spec")]
    use_log_spec: bool,

    /// Read the log spec from this file, implies --log-spec
    #[arg(long, value_name = "TOML FILE", env = "LOG_SPEC_FILE")]
    log_spec_file: Option<PathBuf>,
}

impl Params {
    /// `-q` below the default ends up at errors only; the logger has no "off" for the CLI level.
    fn level(&self) -> Level {
        self.verbose.log_level().unwrap_or(Level::Error)
    }

    fn spec_file(&self) -> Option<&Path> {
        match (&self.log_spec_file, self.use_log_spec) {
            (Some(path), _) => Some(path.as_path()),
            (None, true) => Some(Path::new(DEFAULT_LOG_SPEC_FILE)),
            (None, false) => None,
        }
    }
}

pub fn configure_from(params: &Params) -> Result<LoggerHandle> {
    let log_builder = Logger::try_with_env_or_str(params.level().to_string())
        .context("Failed to parse logger spec from env RUST_LOG or cli level")?
        .log_to_stderr()
        .write_mode(WriteMode::Async)
        .format_for_stderr(colored_default_format)
        .format_for_files(detailed_format);

    match params.spec_file() {
        Some(path) => log_builder
            .start_with_specfile(path)
            .with_context(|| format!("Failed to start logger with specfile {:?}", path)),
        None => log_builder.start().context("Failed to start logger"),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::*;
    use assertor::*;
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        logging: Params,
    }

    fn parse(args: &[&str]) -> Result<Params> {
        Ok(TestCli::try_parse_from(args)?.logging)
    }

    #[test]
    fn level_follows_verbosity_flags() -> Result<()> {
        // given, when, then
        assert_that!(parse(&["test"])?.level()).is_equal_to(Level::Warn);
        assert_that!(parse(&["test", "-v"])?.level()).is_equal_to(Level::Info);
        assert_that!(parse(&["test", "-vvv"])?.level()).is_equal_to(Level::Trace);
        assert_that!(parse(&["test", "-qq"])?.level()).is_equal_to(Level::Error);
        Ok(())
    }

    #[test]
    fn spec_file_only_when_asked() -> Result<()> {
        // given, when, then
        assert_that!(parse(&["test"])?.spec_file()).is_none();
        assert_that!(parse(&["test", "--log-spec"])?.spec_file())
            .is_equal_to(Some(Path::new(DEFAULT_LOG_SPEC_FILE)));
        assert_that!(parse(&["test", "--log-spec-file", "other.toml"])?.spec_file())
            .is_equal_to(Some(Path::new("other.toml")));
        Ok(())
    }
}
