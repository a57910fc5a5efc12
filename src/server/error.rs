use crate::domain::provider::{ProviderError, ResolutionError};
use crate::domain::stream::StreamProtocolError;
use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("Provider resolution failed: {0}")]
  Resolution(#[from] ResolutionError),

  #[error("Provider error: {0}")]
  Provider(#[from] ProviderError),

  #[error("Stream protocol violation: {0}")]
  Stream(#[from] StreamProtocolError),

  #[error("Provider did not finish in time")]
  ProviderTimeout,

  #[error("Internal server error")]
  InternalError,
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      // Bad routing arguments are a client error, surfaced before any data
      ServerError::Resolution(err) => (StatusCode::BAD_REQUEST, err.to_string()),

      // Provider failures carry their own HTTP status
      ServerError::Provider(err) => (
        StatusCode::from_u16(err.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        err.message,
      ),

      ServerError::ProviderTimeout => (
        StatusCode::GATEWAY_TIMEOUT,
        "Provider did not finish in time".to_string(),
      ),

      // Generic fallback - log details but return safe message
      other => {
        tracing::error!("Server error: {}", other);
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "Internal server error".to_string(),
        )
      },
    };

    (status, [("Content-Type", "text/plain")], message).into_response()
  }
}
