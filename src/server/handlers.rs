use crate::domain::provider::DownloadResult;
use crate::domain::stream::{chunk_channel, StreamProtocolError};
use crate::server::{error::ServerError, AppState};
use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::io;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

/// How many inbound chunks may sit between the transport and a provider's
/// consuming task before feeding suspends.
const CHUNK_CHANNEL_CAPACITY: usize = 16;

/// Download a file: proxy the provider's stream, or redirect if the provider
/// offers a direct-access URL.
pub async fn download_file(
    Path((provider_name, path)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Response, ServerError> {
    let provider = state.providers.resolve(&provider_name)?;

    match provider.download(&path, true).await? {
        DownloadResult::Redirect(url) => Ok(Redirect::temporary(&url).into_response()),
        DownloadResult::File(file) => {
            // Last path segment; a path ending in '/' yields an empty
            // filename on purpose, matching path-split semantics.
            let file_name = path.rsplit('/').next().unwrap_or(&path);

            let mut response = Response::builder()
                .header(header::CONTENT_TYPE, file.content_type)
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                );
            // Some providers cannot report size up front; omit the header
            // and let hyper fall back to chunked transfer.
            if let Some(size) = file.size {
                response = response.header(header::CONTENT_LENGTH, size);
            }

            // One fixed-size chunk in flight at a time keeps memory bounded
            // regardless of file size.
            let body = Body::from_stream(ReaderStream::with_capacity(
                file.reader,
                state.chunk_size,
            ));

            response
                .body(body)
                .map_err(|_| ServerError::InternalError)
        }
    }
}

/// Upload a file: the provider's consuming task is started before any body
/// bytes arrive, then fed one chunk at a time as the transport delivers them.
pub async fn upload_file(
    Path((provider_name, path)): Path<(String, String)>,
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ServerError> {
    let provider = state.providers.resolve(&provider_name)?;

    let (mut sink, stream) = chunk_channel(CHUNK_CHANNEL_CAPACITY);
    let upload_path = path.clone();
    let uploader = tokio::spawn(async move { provider.upload(stream, &upload_path).await });

    let mut body = request.into_body().into_data_stream();
    while let Some(received) = body.next().await {
        match received {
            Ok(chunk) => match sink.feed(chunk).await {
                Ok(()) => {}
                // The provider stopped reading early; its task result
                // carries the reason, so stop feeding and collect it below.
                Err(StreamProtocolError::ConsumerClosed) => break,
                Err(other) => return Err(other.into()),
            },
            Err(err) => {
                // Transport failures are not reported to the client: the
                // peer is gone, so terminate instead of composing a status.
                tracing::debug!("client transport failed mid-upload: {}", err);
                sink.abort();
                return Ok(abort_connection());
            }
        }
    }

    sink.feed_eof()?;

    let result = match tokio::time::timeout(state.upload_timeout, uploader).await {
        Err(_) => {
            tracing::warn!("provider upload for '{}' timed out", path);
            return Err(ServerError::ProviderTimeout);
        }
        Ok(joined) => joined.map_err(|_| ServerError::InternalError)??,
    };

    Ok((StatusCode::OK, Json(result)).into_response())
}

/// Response whose body errors immediately, so hyper drops the connection
/// rather than delivering a clean status and body.
fn abort_connection() -> Response {
    Response::new(Body::from_stream(futures_util::stream::once(async {
        Err::<bytes::Bytes, io::Error>(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "client transport failed",
        ))
    })))
}

/// Delete a file.
pub async fn delete_file(
    Path((provider_name, path)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let provider = state.providers.resolve(&provider_name)?;
    provider.delete(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
