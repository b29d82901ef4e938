use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::{self, OpenOptions};
use std::io::Write;

use crate::config::Config;

/// Flushes the global logger when dropped. Keep it alive for the whole run.
#[must_use = "dropping the guard flushes logs immediately"]
pub struct LogGuard(());

impl Drop for LogGuard {
    fn drop(&mut self) {
        log::logger().flush();
    }
}

/// Install the process-wide logger. Call once, before any component runs.
///
/// The terminal UI owns the screen, so records are appended to
/// `paths.log_file`. `RUST_LOG` overrides `logging.level`.
pub fn init(cfg: &Config) -> Result<LogGuard> {
    let path = &cfg.paths.log_file;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log dir {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    Builder::from_env(Env::default().default_filter_or(cfg.logging.level.as_str()))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .context("logger already initialised")?;

    log::info!("logging to {}", path.display());
    Ok(LogGuard(()))
}
