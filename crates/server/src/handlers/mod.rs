//! HTTP request handlers.

pub mod chunk;
pub mod health;

pub use chunk::*;
pub use health::*;
