//! Syllabus
//!
//! Connects to a document store chosen by URI scheme and hands out
//! [`Session`]s for the [`CourseRepository`]:
//!
//! - `mongodb://` and `mongodb+srv://` use the MongoDB driver
//! - `memory://` keeps everything in process, for tests and demos
//!
//! # Example
//!
//! ```no_run
//! use syllabus::*;
//!
//! # async fn run() -> Result<()> {
//! let course = with_session(
//!     "mongodb://localhost/playground",
//!     ConnectOptions::default(),
//!     |session| async move {
//!         CourseRepository::new(session)
//!             .create(NewCourse::named("React Course").tags(["react", "frontend"]))
//!             .await
//!     },
//! )
//! .await?;
//! println!("created {}", course.id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use syllabus_core;
pub use syllabus_core::*;
pub use syllabus_storage_memory::MemoryStore;
pub use syllabus_storage_mongo::MongoStore;

use std::future::Future;
use std::sync::Arc;
use syllabus_storage_memory::store::MEMORY_SCHEME;
use syllabus_storage_mongo::mongo::MONGO_SCHEMES;
use tracing::{error, info};

/// Open a session to the store named by `uri`
///
/// Fails with a connection error when the URI is malformed, names an
/// unsupported scheme, or the server cannot be reached.
pub async fn connect(uri: &str, options: ConnectOptions) -> Result<Session> {
    let endpoint = Endpoint::parse(uri)?;

    let store: Arc<dyn IDocumentStore> = match endpoint.scheme() {
        scheme if MONGO_SCHEMES.contains(&scheme) => {
            Arc::new(MongoStore::connect(&endpoint, &options).await?)
        }
        MEMORY_SCHEME => Arc::new(MemoryStore::connect(&endpoint, &options).await?),
        other => {
            return Err(SyllabusError::connection(format!(
                "Unsupported endpoint scheme '{}' (expected mongodb, mongodb+srv or memory)",
                other
            )))
        }
    };

    info!("Connected to {} ({})", endpoint, store.backend());
    Ok(Session::new(store, endpoint))
}

/// Open a session from `SYLLABUS_*` environment settings
pub async fn connect_from_env() -> Result<Session> {
    let config = DatabaseConfig::from_env()?;
    connect(&config.url, config.connect_options()).await
}

/// Run `f` with an open session, closing it afterwards on every path
///
/// A failure to close is returned only when `f` succeeded; otherwise it is
/// logged and the error from `f` is returned.
pub async fn with_session<F, Fut, T>(uri: &str, options: ConnectOptions, f: F) -> Result<T>
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = connect(uri, options).await?;
    let result = f(session.clone()).await;

    if let Err(e) = session.close().await {
        if result.is_ok() {
            return Err(e);
        }
        error!("Failed to close session to {}: {}", session.endpoint(), e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory() {
        let session = connect("memory://localhost/playground", ConnectOptions::default())
            .await
            .unwrap();
        assert_eq!(session.database(), "playground");
        assert!(session.is_ready().await.unwrap());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let result = connect("postgres://localhost/playground", ConnectOptions::default()).await;
        assert!(matches!(result, Err(SyllabusError::Connection(_))));
    }

    #[tokio::test]
    async fn test_with_session_closes_on_error() {
        let mut kept = None;
        let result: Result<()> = with_session(
            "memory://localhost/playground",
            ConnectOptions::default(),
            |session| {
                kept = Some(session.clone());
                async move { Err(SyllabusError::validation("name", "Path `name` is required.")) }
            },
        )
        .await;

        assert!(matches!(result, Err(SyllabusError::Validation { .. })));
        assert!(kept.unwrap().is_closed());
    }
}
