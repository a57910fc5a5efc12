//! End-to-end round trip through the gateway against the filesystem provider

use axum::{
  body::Body,
  http::{header, Request, StatusCode},
  Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streamgate::domain::provider::Provider;
use streamgate::infra::fs::FsProvider;
use streamgate::infra::registry::ProviderRegistry;
use streamgate::server::{create_router, AppState};
use tower::util::ServiceExt;

/// Helper to generate unique root directories for tests
fn unique_root(prefix: &str) -> PathBuf {
  use std::time::{SystemTime, UNIX_EPOCH};
  let timestamp = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap()
    .as_nanos();
  std::env::temp_dir().join(format!("{}-{}", prefix, timestamp))
}

fn fs_app(root: &PathBuf) -> Router {
  let mut registry = ProviderRegistry::new();
  registry.register("local", Arc::new(FsProvider::new(root.clone())));
  let state = AppState {
    providers: Arc::new(registry),
    chunk_size: 65536,
    upload_timeout: Duration::from_secs(30),
  };
  create_router().with_state(state)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fs_round_trip() {
  let root = unique_root("streamgate-fs-test");
  std::fs::create_dir_all(&root).unwrap();
  let app = fs_app(&root);

  let content = b"hello streamgate";

  // PUT creates the file (and its parent directories)
  let request = Request::builder()
    .method("PUT")
    .uri("/v1/files/local/docs/note.txt")
    .body(Body::from(content.to_vec()))
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let body = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  let metadata: serde_json::Value = serde_json::from_slice(&body).unwrap();
  assert_eq!(metadata["name"], "note.txt");
  assert_eq!(metadata["size"], content.len());

  // GET streams it back with the known size
  let request = Request::builder()
    .method("GET")
    .uri("/v1/files/local/docs/note.txt")
    .body(Body::empty())
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(
    response.headers().get(header::CONTENT_LENGTH).unwrap(),
    &content.len().to_string()
  );
  assert_eq!(
    response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
    "attachment; filename=\"note.txt\""
  );
  let body = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  assert_eq!(body.as_ref(), content);

  // DELETE removes it
  let request = Request::builder()
    .method("DELETE")
    .uri("/v1/files/local/docs/note.txt")
    .body(Body::empty())
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::NO_CONTENT);

  // A second DELETE surfaces the provider's 404 unchanged
  let request = Request::builder()
    .method("DELETE")
    .uri("/v1/files/local/docs/note.txt")
    .body(Body::empty())
    .unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  // And the file is really gone
  let request = Request::builder()
    .method("GET")
    .uri("/v1/files/local/docs/note.txt")
    .body(Body::empty())
    .unwrap();
  let response = app.oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::NOT_FOUND);

  let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fs_check_rejects_missing_root() {
  let root = unique_root("streamgate-fs-missing");
  let provider = FsProvider::new(root);
  assert!(provider.check().await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fs_check_accepts_existing_root() {
  let root = unique_root("streamgate-fs-ok");
  std::fs::create_dir_all(&root).unwrap();
  let provider = FsProvider::new(root.clone());
  assert!(provider.check().await.is_ok());
  let _ = std::fs::remove_dir_all(&root);
}
