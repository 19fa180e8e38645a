//! Chunk request handlers and the dispatcher in front of them.

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{ChunkDownload, metadata_from_headers, upload_chunk};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use silo_core::ChunkId;
use silo_core::attrs::HEADER_CHECKSUM;
use std::time::Instant;
use tokio_util::io::StreamReader;
use tracing::{debug, error};

/// Verbs the chunk protocol understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkVerb {
    Put,
    Get,
    Head,
    Delete,
}

impl ChunkVerb {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::PUT => Some(Self::Put),
            Method::GET => Some(Self::Get),
            Method::HEAD => Some(Self::Head),
            Method::DELETE => Some(Self::Delete),
            _ => None,
        }
    }

    /// Label used for statistics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Delete => "DELETE",
        }
    }
}

/// Statistics label for verbs outside the protocol.
const OTHER_VERB: &str = "OTHER";

/// Extract the chunk identifier from the last non-empty path segment.
pub fn chunk_id_from_path(path: &str) -> ApiResult<ChunkId> {
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    Ok(ChunkId::parse(segment)?)
}

/// Fallback handler for every chunk path.
///
/// Times the request and records it into the statistics sink, whatever
/// the outcome.
pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let started = Instant::now();
    let verb = ChunkVerb::from_method(req.method());
    let label = verb.map_or(OTHER_VERB, ChunkVerb::as_str);
    let path = req.uri().path().to_string();

    let result = match verb {
        Some(verb) => match chunk_id_from_path(&path) {
            Ok(id) => handle(&state, verb, id, req).await,
            Err(e) => Err(e),
        },
        None => Err(ApiError::MethodNotAllowed(req.method().to_string())),
    };

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            if matches!(err, ApiError::ChecksumMismatch { .. }) {
                state.stats.record_checksum_mismatch();
            }
            if err.status_code().is_server_error() {
                error!(verb = label, path = %path, error = %err, "chunk request failed");
            } else {
                debug!(verb = label, path = %path, error = %err, "chunk request rejected");
            }
            if verb == Some(ChunkVerb::Head) {
                err.status_code().into_response()
            } else {
                err.into_response()
            }
        }
    };

    state
        .stats
        .record_request(label, response.status().as_u16(), started.elapsed());
    response
}

async fn handle(state: &AppState, verb: ChunkVerb, id: ChunkId, req: Request) -> ApiResult<Response> {
    match verb {
        ChunkVerb::Put => put_chunk(state, &id, req).await,
        ChunkVerb::Get => get_chunk(state, &id, req.headers()).await,
        ChunkVerb::Head => head_chunk(state, &id).await,
        ChunkVerb::Delete => delete_chunk(state, &id).await,
    }
}

fn declared_length(headers: &HeaderMap) -> ApiResult<Option<u64>> {
    headers
        .get(CONTENT_LENGTH)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .ok_or_else(|| ApiError::BadRequest("invalid content-length".to_string()))
        })
        .transpose()
}

/// PUT: store a new chunk.
async fn put_chunk(state: &AppState, id: &ChunkId, req: Request) -> ApiResult<Response> {
    let (parts, body) = req.into_parts();
    let metadata = metadata_from_headers(&parts.headers);
    let length = declared_length(&parts.headers)?;

    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
    let outcome = upload_chunk(
        &state.repo,
        id,
        metadata,
        reader,
        length,
        state.compression(),
    )
    .await?;

    state.stats.add_bytes_in(outcome.bytes_in);
    debug!(chunk_id = %id, bytes = outcome.bytes_in, "chunk stored");

    Ok((
        StatusCode::CREATED,
        [(HEADER_CHECKSUM, outcome.checksum.to_hex())],
    )
        .into_response())
}

/// GET: stream a chunk, optionally a range of it.
async fn get_chunk(state: &AppState, id: &ChunkId, headers: &HeaderMap) -> ApiResult<Response> {
    let range = headers
        .get(RANGE)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::InvalidRange("non-ascii range header".to_string()))
        })
        .transpose()?;

    let download = ChunkDownload::open(&state.repo, id, range).await?;
    Ok(download.into_response(state.stats.clone()))
}

/// HEAD: report existence and size.
async fn head_chunk(state: &AppState, id: &ChunkId) -> ApiResult<Response> {
    let size = state.repo.get(id.as_str()).await?.size();
    Ok((
        StatusCode::NO_CONTENT,
        [
            (CONTENT_LENGTH, size.to_string()),
            (ACCEPT_RANGES, "bytes".to_string()),
        ],
    )
        .into_response())
}

/// DELETE: remove a chunk.
async fn delete_chunk(state: &AppState, id: &ChunkId) -> ApiResult<Response> {
    state.repo.del(id.as_str()).await?;
    debug!(chunk_id = %id, "chunk deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}
