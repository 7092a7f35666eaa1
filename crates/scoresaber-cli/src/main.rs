//! The `scoresaber` command line client.
//!
//! Subscribes to ScoreSaber API resources through `accio` and prints them, either once or, in
//! watch mode, on every change.

mod cli;
mod logging;
mod models;
mod output;

fn main() {
    match cli::execute() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
