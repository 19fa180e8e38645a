pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{seeded_bytes, store_chunk};
#[allow(unused_imports)]
pub use mocks::{FailingBackend, InstrumentedBackend};
