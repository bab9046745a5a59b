//! Core type definitions for Syllabus

pub mod course;
pub mod query;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use course::*;
pub use query::*;
pub use schema::*;
pub use store::*;
