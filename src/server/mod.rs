pub mod error;
pub mod handlers;

use crate::domain::config::ResolvedConfig;
use crate::infra::registry::ProviderRegistry;
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
  pub providers: Arc<ProviderRegistry>,
  pub chunk_size: usize,
  pub upload_timeout: Duration,
}

pub fn create_router() -> Router<AppState> {
  Router::new()
    .route("/health", get(handlers::health_check))
    .route(
      "/v1/files/{provider}/{*path}",
      get(handlers::download_file)
        .put(handlers::upload_file)
        .delete(handlers::delete_file),
    )
}

pub async fn run_server(
  providers: ProviderRegistry,
  config: &ResolvedConfig,
) -> Result<(), std::io::Error> {
  tracing::info!(
    "Server starting with {} configured provider(s)",
    providers.names().count()
  );
  for name in providers.names() {
    tracing::info!("  - Provider configured: {}", name);
  }

  let app_state = AppState {
    providers: Arc::new(providers),
    chunk_size: config.chunk_size,
    upload_timeout: Duration::from_secs(config.upload_timeout),
  };

  let app = create_router().with_state(app_state);
  let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

  tracing::info!("Server running on port {}", config.port);
  axum::serve(listener, app).await?;

  Ok(())
}
