#![forbid(unsafe_code)]

//! Binary entrypoint for the warren console.

/// Runs the console and exits with its status code.
#[tokio::main]
async fn main() {
    let code = warren_cli::run().await;
    std::process::exit(code);
}
