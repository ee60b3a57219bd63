use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::query::telemetry::{AUDIT_TARGET, METRICS_TARGET};

pub const DEVLOG_TARGET: &str = "bookstore::devlog";

const ENC_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

type LogResult<T> = Result<T, Box<dyn std::error::Error>>;

/// `error|warn|info|debug|trace`, anything else means `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// `{base}/{stem}.log`, rolled into `{stem}.N.log` past 10 MiB.
fn rolling(base: &Path, stem: &str, keep: u32) -> LogResult<RollingFileAppender> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENC_PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the logger configuration: `app.log` for everything, `audit.log` for
/// document writes and `metrics.log` for query lines. With `enable_dev` the
/// developer sink lines are persisted to `dev.log` as well.
///
/// # Errors
/// Fails if the directory cannot be created or an appender cannot open its file.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev: bool,
) -> LogResult<Config> {
    let base = match dir {
        Some(d) => PathBuf::from(d),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level.unwrap_or("info"));

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl));
    builder = if enable_dev {
        builder
            .appender(Appender::builder().build("dev", Box::new(rolling(&base, "dev", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev")
                    .additive(false)
                    .build(DEVLOG_TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(DEVLOG_TARGET, LevelFilter::Off))
    };
    Ok(builder.build(Root::builder().appender("app").build(lvl))?)
}

/// Installs the file logger for the process. A second call is a no-op because
/// the global logger can only be set once.
///
/// # Errors
/// Propagates [`build_config`] failures.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev: bool,
) -> LogResult<()> {
    let config = build_config(dir, level, retention, enable_dev)?;
    if let Err(e) = log4rs::init_config(config) {
        log::debug!("logger already initialized: {e}");
    }
    Ok(())
}

/// `BOOKSTORE_LOG_RETENTION`: how many rolled files to keep per log.
#[must_use]
pub fn retention_from_env() -> Option<usize> {
    std::env::var("BOOKSTORE_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok())
}

/// `BOOKSTORE_DEVLOG` set to `1`/`true`/`yes`.
#[must_use]
pub fn devlog_from_env() -> bool {
    std::env::var("BOOKSTORE_DEVLOG")
        .is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn config_creates_log_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        build_config(Some(&dir), Some("warn"), Some(2), true).unwrap();
        assert!(dir.is_dir());
        assert!(dir.join("app.log").exists());
    }
}
