pub mod api;
pub mod chat;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Startup error: {0}")]
    Core(#[from] core_state::CoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Server error: {0}")]
    Server(String),
}

pub fn run() -> Result<(), AppError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    // `cropswag generate-token` prints a fresh bearer token for CROPSWAG_USER_TOKENS.
    if std::env::args().nth(1).as_deref() == Some("generate-token") {
        println!("{}", api::types::generate_token());
        return Ok(());
    }

    tracing::info!("CropSwag starting v{}", config::APP_VERSION);

    let config = config::AppConfig::from_env()?;
    let bind_addr = config.bind_addr;

    // Built before the runtime: the generation client is a blocking one.
    let core = Arc::new(core_state::CoreState::from_config(config)?);

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(serve(core.clone(), bind_addr));
    drop(runtime);
    result
}

async fn serve(core: Arc<core_state::CoreState>, addr: std::net::SocketAddr) -> Result<(), AppError> {
    let server = api::start_api_server(core, addr)
        .await
        .map_err(AppError::Server)?;
    tracing::info!(addr = %server.addr, "Listening (Ctrl+C to stop)");

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}
