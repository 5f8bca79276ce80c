//! docgate entry point
//!
//! Parses CLI arguments, dispatches, prints errors to stderr, and exits
//! non-zero on failure. All logic lives in the library.

use docgate::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
