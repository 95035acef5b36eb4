use animated_image::cli::{self, Args};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Load .env without overriding variables that are already set.
fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

/// Logs go to stderr so stdout carries only the JSON result.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    load_env();
    init_logging();

    let args = Args::parse();
    let code = cli::run(args).await;
    std::process::exit(code);
}
