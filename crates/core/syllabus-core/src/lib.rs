//! Syllabus Core
//!
//! Types and interfaces for typed access to Course records kept in a
//! document store:
//!
//! - Course schema with write-time coercion, defaults and required fields
//! - Typed filter, projection/sort and partial-update expressions
//! - The `IDocumentStore` adapter trait implemented by storage crates
//! - `Session`, an explicitly closed handle injected into the repository
//! - `CourseRepository` with create, find and update operations
//!
//! # Example
//!
//! ```no_run
//! use syllabus_core::*;
//!
//! async fn publish_all(session: Session) -> Result<()> {
//!     let courses = CourseRepository::new(session);
//!     courses
//!         .update_by_query(
//!             &Filter::pattern_ci("tags", "backend"),
//!             &Update::new().set("isPublished", true),
//!             UpdateOptions::default(),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export the document types used throughout the API
pub use bson;

pub mod config;
pub mod error;
pub mod repository;
pub mod session;
pub mod types;
pub mod utils;

pub use config::{get_env_bool, get_env_or, load_env, load_env_from_path, DatabaseConfig};
pub use error::{Result, SyllabusError};
pub use repository::CourseRepository;
pub use session::{ConnectOptions, Endpoint, Session};
pub use types::*;
pub use utils::{init_logging, Logger};
