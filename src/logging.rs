//! Sets up the `log` backend for the command-line tool. The library itself
//! only ever talks to the `log` facade.
//!
//! Records look like `[makesite::build:131:INFO]:clearing: _site (time=Oct-19 14:02)`.

use log::LevelFilter;
use std::io::Write;

/// The level for a given number of `-v` flags: info by default, then debug,
/// then trace.
pub fn level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger. `RUST_LOG`, when set, takes precedence over
/// `verbosity`.
pub fn init(verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level(verbosity))
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}:{}:{}]:{} (time={})",
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args(),
                chrono::Local::now().format("%b-%d %H:%M"),
            )
        });

    // a logger may already be installed, e.g. by a test harness
    if let Err(e) = builder.try_init() {
        eprintln!("logger already initialized: {}", e);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level() {
        assert_eq!(LevelFilter::Info, level(0));
        assert_eq!(LevelFilter::Debug, level(1));
        assert_eq!(LevelFilter::Trace, level(2));
        assert_eq!(LevelFilter::Trace, level(7));
    }
}
