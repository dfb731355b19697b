//! seccomp-unix-block CLI

use clap::Parser;
use console::style;
use seccomp_unix_block::cli::Cli;
use seccomp_unix_block::{logging, runner};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1; --help and --version are not errors.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    logging::init_logger(cli.verbose);

    if let Err(e) = runner::run(cli.into()) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
