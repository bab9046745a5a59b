//! Syllabus MongoDB Store
//!
//! Document store adapter backed by the official MongoDB driver. Typed
//! filters, sorts, projections and updates are translated into the
//! driver's query documents.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-exports
pub use syllabus_core;

pub mod mongo;
pub mod query;

// Re-export adapters
pub use mongo::MongoStore;
