use crate::domain::stream::ChunkStream;
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Failure declared by a provider, carrying the HTTP status it maps to.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
  pub code: u16,
  pub message: String,
}

impl ProviderError {
  pub fn new(code: u16, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
    }
  }

  pub fn not_found(path: &str) -> Self {
    Self::new(404, format!("resource not found: {}", path))
  }

  pub fn invalid_path(path: &str) -> Self {
    Self::new(400, format!("invalid path: {}", path))
  }
}

/// Failure to map a request onto a configured provider. Surfaced before any
/// body bytes are accepted.
#[derive(Debug, Error)]
pub enum ResolutionError {
  #[error("unknown provider: {0}")]
  UnknownProvider(String),
}

/// Readable byte-stream with response metadata.
pub struct FileStream {
  pub reader: Box<dyn AsyncRead + Send + Unpin>,
  pub content_type: String,
  /// None when the provider cannot report the size up front, in which case
  /// the Content-Length header is omitted and chunked transfer is used.
  pub size: Option<u64>,
}

/// Outcome of a download call: a pre-signed direct-access URL, or a stream
/// the gateway proxies to the client.
pub enum DownloadResult {
  Redirect(String),
  File(FileStream),
}

#[async_trait]
pub trait Provider: Send + Sync + 'static {
  /// Download the resource at `path`. With `accept_url` the provider may
  /// short-circuit by returning a redirect target instead of a body stream.
  async fn download(&self, path: &str, accept_url: bool) -> Result<DownloadResult, ProviderError>;

  /// Consume `stream` and store it at `path`, returning provider-defined
  /// metadata for the created or updated file. The stream ends only when the
  /// producer signals end-of-stream, so implementations must read it to
  /// completion rather than rely on a known length.
  async fn upload(&self, stream: ChunkStream, path: &str)
    -> Result<serde_json::Value, ProviderError>;

  /// Delete the resource at `path`.
  async fn delete(&self, path: &str) -> Result<(), ProviderError>;

  /// Startup connectivity probe.
  async fn check(&self) -> Result<(), ProviderError> {
    Ok(())
  }
}
