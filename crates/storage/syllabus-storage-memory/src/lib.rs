//! Syllabus In-Memory Store
//!
//! A document store kept in process memory, addressed with `memory://`
//! endpoints. It evaluates the same typed filters, sorts, projections and
//! updates as the MongoDB adapter, which makes it the backend for tests and
//! offline demos.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-exports
pub use syllabus_core;

pub mod evaluator;
pub mod store;

pub use store::MemoryStore;
