//! File logging setup.
//!
//! The TUI owns the terminal, so logs go to rotating files under the
//! profile's log directory and never to stdout/stderr.

use anyhow::{anyhow, Context, Result};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use std::path::Path;

const LOG_FILE_BASENAME: &str = "notefile";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

/// Starts the file logger. Keep the returned handle alive for the lifetime of
/// the process; dropping it flushes and stops logging.
pub fn init_logging(level: Option<&str>, log_dir: &Path) -> Result<LoggerHandle> {
    let level = normalize_level(level.unwrap_or(default_log_level()))?;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {:?}", log_dir))?;
    let handle = Logger::try_with_str(level)
        .with_context(|| format!("invalid log level `{level}`"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .context("starting logger")?;
    log::info!(
        "notefile {} starting, level={level} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );
    Ok(handle)
}

pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(anyhow!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_normalized() {
        assert_eq!(normalize_level(" WARNING ").unwrap(), "warn");
        assert_eq!(normalize_level("Info").unwrap(), "info");
        assert!(normalize_level("loud").is_err());
    }
}
