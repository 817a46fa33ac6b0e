use clap::Parser;
use tracing_subscriber::EnvFilter;
use triggerlab::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let filter =
        EnvFilter::try_from_env("TRIGGERLAB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}
