use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing_appender::{non_blocking::WorkerGuard, rolling::Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::LoggingConfig;

pub fn init_tracing_log(config: &LoggingConfig) -> eyre::Result<WorkerGuard> {
    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_thread_ids(false)
        .with_target(true)
        .compact();

    let log_level = match std::env::var("RUST_LOG") {
        Ok(level) => level.parse().map_err(|_| eyre::eyre!("invalid RUST_LOG {level}, change to eg 'info'"))?,
        Err(_) => tracing::Level::INFO,
    };

    match config {
        LoggingConfig::Console => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            let layer = tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(writer)
                .with_filter(get_crate_filter(log_level)?);

            tracing_subscriber::registry().with(layer).try_init()?;
            Ok(guard)
        }

        LoggingConfig::File { dir_path, file_name } => {
            let file_appender = tracing_appender::rolling::Builder::new()
                .filename_prefix(file_name)
                .max_log_files(14)
                .rotation(Rotation::DAILY)
                .build(dir_path)?;

            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(writer)
                .with_filter(get_crate_filter(log_level)?);

            tracing_subscriber::registry().with(layer).try_init()?;
            Ok(guard)
        }
    }
}

const CRATES: &[&str] = &["beacon", "builder", "common", "relay", "types", "crucible"];

fn get_crate_filter(crates_level: tracing::Level) -> eyre::Result<EnvFilter> {
    let mut env_filter = EnvFilter::new("info");

    for crate_name in CRATES {
        let directive = if *crate_name == "crucible" {
            format!("crucible={crates_level}")
        } else {
            format!("crucible_{crate_name}={crates_level}")
        };
        env_filter = env_filter.add_directive(directive.parse()?);
    }

    Ok(env_filter)
}

////// TIME //////

/// Duration since UNIX_EPOCH
pub fn utcnow_dur() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Seconds
pub fn utcnow_sec() -> u64 {
    utcnow_dur().as_secs()
}

/// Millis
pub fn utcnow_ms() -> u64 {
    utcnow_dur().as_millis() as u64
}
