pub mod ai;
mod console;
pub mod error;
pub mod identity;
pub mod session;

pub use console::Cli;
pub use error::{ConfigError, ErrorKind, SessionError, SessionResult};
pub use session::SessionMachine;

use tracing_subscriber::EnvFilter;

pub async fn run(cli: Cli) -> Result<(), String> {
    // Load .env file; fall back to the parent directory
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    // Initialize tracing with RUST_LOG env filter
    // Default: warn for most crates, info for session and provider events
    // Logs go to stderr so answers on stdout stay readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,medscan_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    console::run_console(cli).await
}
