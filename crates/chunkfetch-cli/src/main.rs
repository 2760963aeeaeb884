use chunkfetch_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    // Fall back to stderr if the state dir is not writable.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }

    if let Err(err) = Cli::run_from_args().await {
        eprintln!("chunkfetch error: {:#}", err);
        std::process::exit(1);
    }
}
