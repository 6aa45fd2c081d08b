pub mod app;
pub mod cli;
mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod notification;
pub mod presentation;
pub mod preview;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod theme;

pub use config::{load_app_config, AppConfig};
pub use error::{AppError, AppResult};

/// Entrypoint used by the binary and other CLI bindings.
pub fn run() -> AppResult<()> {
    use clap::Parser;

    logging::init();
    tracing::info!("starting backdrop");
    cli::run(cli::Cli::parse())
}
