use numachurn::{RunConfig, benchmark_random_alloc};
use std::process::ExitCode;
use tracing::Level;

fn main() -> ExitCode {
    // Diagnostics go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::WARN)
        .init();

    match benchmark_random_alloc(RunConfig::default(), std::io::stdout().lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
