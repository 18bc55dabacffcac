use crate::error::{CliError, Result};
use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self},
    prelude::*,
};

/// Crates whose logs are capped at WARN whatever the verbosity.
const NOISY_TARGETS: &[&str] = &["wgpu_core", "wgpu_hal", "naga", "cubecl", "reqwest", "hyper"];

fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::ERROR
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn targets(level: LevelFilter) -> Targets {
    NOISY_TARGETS.iter().fold(
        Targets::new().with_default(level),
        |targets, &name| targets.with_target(name, level.min(LevelFilter::WARN)),
    )
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level = level_for(verbosity, quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(targets(level))
        .with(stderr_layer);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path).map_err(CliError::Io)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use serial_test::serial;
    use std::thread;
    use std::time::Duration;
    use tracing::{debug, error, info, trace, warn};

    static GLOBAL_LOGGER: Lazy<()> = Lazy::new(|| {
        setup_logging(3, false, None).expect("Failed to set up global logger for tests");
    });

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        Lazy::force(&GLOBAL_LOGGER);

        error!("This is an error");
        warn!("This is a warning");
        info!(epoch = 3, "This is info");
        debug!("This is debug");
        trace!("This is trace");
    }

    #[test]
    fn quiet_wins_over_verbosity() {
        assert_eq!(level_for(3, true), LevelFilter::ERROR);
        assert_eq!(level_for(0, false), LevelFilter::WARN);
        assert_eq!(level_for(2, false), LevelFilter::DEBUG);
    }

    #[test]
    #[serial]
    fn noisy_targets_are_capped_at_warn() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("targets.log");

        let file = File::create(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(targets(LevelFilter::DEBUG))
            .with(fmt::layer().with_writer(file).with_ansi(false));

        tracing::subscriber::with_default(subscriber, || {
            debug!(target: "wgpu_core", "shader cache miss");
            debug!(target: "cathnet::engine", "epoch started");
        });

        thread::sleep(Duration::from_millis(100));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("epoch started"));
        assert!(!content.contains("shader cache miss"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
