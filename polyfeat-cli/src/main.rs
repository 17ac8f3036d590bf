//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use log::error;
use polyfeat_cli::CliError;

#[expect(
    clippy::print_stderr,
    reason = "fatal errors are reported on stderr before exiting"
)]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match polyfeat_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            error!("{} failed: {err}", err.stage());
            eprintln!("polyfeat: {} failed: {err}", err.stage());
            std::process::exit(1);
        }
    }
}
