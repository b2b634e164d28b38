use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use git_upstream_cli_types::LogLevel;
use log::LevelFilter;

/// Maps the repeatable `-v` count (or an explicit `--log-level`) onto a
/// `log::LevelFilter`. `-q` is handled by the caller forcing count to 0.
fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn level_for_explicit(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Critical | LogLevel::Error => LevelFilter::Error,
        LogLevel::Warning => LevelFilter::Warn,
        LogLevel::Notice | LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Notset => LevelFilter::Trace,
    }
}

/// Initialises `env_logger`, honouring `-v`/`-q`/`--log-level`/`--log-file`.
pub fn init(verbose: u8, quiet: bool, log_level: Option<LogLevel>, log_file: Option<&Path>) {
    let level = match log_level {
        Some(explicit) => level_for_explicit(explicit),
        None if quiet => LevelFilter::Warn,
        None => level_for_verbosity(verbose),
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    if let Some(path) = log_file {
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(path) {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }

    builder.init();
}

/// Emits a notice-level message: the `log` crate has no NOTICE level, so
/// this is `info` with a prefix, letting the CLI distinguish "user
/// cancelled" from ordinary progress chatter without a bespoke logger.
#[macro_export]
macro_rules! notice {
    ($($arg:tt)*) => {
        log::info!("notice: {}", format!($($arg)*))
    };
}

/// Dedents a multi-line log message before emission, replacing the
/// original's metaclass-based logger dedenting with a plain wrapper.
#[macro_export]
macro_rules! log_dedent {
    ($level:expr, $($arg:tt)*) => {
        log::log!($level, "{}", unindent::unindent(&format!($($arg)*)))
    };
}
