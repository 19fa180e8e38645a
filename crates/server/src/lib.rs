//! HTTP front end of a Silo chunk storage node.
//!
//! This crate provides:
//! - The chunk protocol: PUT, GET (with ranges), HEAD and DELETE
//! - Upload and download pipelines over a [`silo_storage::ChunkRepository`]
//! - Request statistics and the `/metrics` and `/health` endpoints

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use metrics::{NoopStats, PrometheusStats, StatsSink};
pub use routes::create_router;
pub use state::AppState;
