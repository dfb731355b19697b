//! Diagnostics on stderr
//!
//! stdout is reserved for `--dump-policy`, so every log line goes to stderr.

use console::style;
use env_logger::{Builder, Env, Target};
use log::{Level, LevelFilter};
use std::io::Write;

/// Initialize logger based on verbose flag
pub fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", if verbose { "debug" } else { "warn" });

    let mut builder = Builder::from_env(env);
    builder.target(Target::Stderr).format(|buf, record| {
        let tag = match record.level() {
            Level::Error => style("error").red().bold(),
            Level::Warn => style("warning").yellow().bold(),
            Level::Info => style("info").green(),
            Level::Debug => style("debug").cyan(),
            Level::Trace => style("trace").dim(),
        };
        writeln!(buf, "{}: {}", tag, record.args())
    });

    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }

    builder.init();
}
