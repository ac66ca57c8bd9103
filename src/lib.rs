pub mod ai;
pub mod analysis;
pub mod config;
pub mod http_client;
pub mod naming;
pub mod pipeline;
pub mod services;
pub mod storage;

use tracing_subscriber::EnvFilter;

/// Load `.env` from the working directory, falling back to its parent
pub fn load_env() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }
}

/// Initialize tracing with RUST_LOG env filter
pub fn init_tracing() {
    // Default: warn for dependencies, info for our own per-file summaries
    // Use RUST_LOG=sheet_sorter=debug for storage and classifier calls
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,sheet_sorter=info")),
        )
        .init();
}
