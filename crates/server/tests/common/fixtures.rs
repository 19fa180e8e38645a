//! Test fixtures for building chunk requests.

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use silo_core::attrs::{HEADER_CHUNK_METHOD, HEADER_POSITION, HEADER_SIZE, HEADER_STORAGE_POLICY};
use tower::ServiceExt;

/// Generate deterministic test data based on a seed.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Headers every upload must carry.
#[allow(dead_code)]
pub fn mandatory_headers(size: usize) -> Vec<(&'static str, String)> {
    vec![
        (HEADER_STORAGE_POLICY, "SINGLE".to_string()),
        (HEADER_CHUNK_METHOD, "plain/nb_copy=1".to_string()),
        (HEADER_SIZE, size.to_string()),
        (HEADER_POSITION, "0".to_string()),
    ]
}

/// Response parts collected for assertions.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    /// The `code` field of a JSON error body.
    pub fn error_code(&self) -> Option<String> {
        self.json()["code"].as_str().map(str::to_string)
    }
}

/// Send one request through the router and collect the response.
#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// PUT `data` under `path` with the mandatory headers plus `extra`.
#[allow(dead_code)]
pub async fn put_chunk(
    router: &Router,
    path: &str,
    data: Bytes,
    extra: &[(&str, &str)],
) -> TestResponse {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(path)
        .header("content-length", data.len());
    for (name, value) in mandatory_headers(data.len()) {
        builder = builder.header(name, value);
    }
    for (name, value) in extra {
        builder = builder.header(*name, *value);
    }
    send(router, builder.body(Body::from(data)).unwrap()).await
}

/// Issue a bodiless request.
#[allow(dead_code)]
pub async fn request(
    router: &Router,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(router, builder.body(Body::empty()).unwrap()).await
}
