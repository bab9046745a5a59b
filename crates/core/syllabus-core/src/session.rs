//! Session handle, endpoint parsing and connection options

use crate::types::IDocumentStore;
use crate::{Result, SyllabusError};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Database used when the endpoint names none
pub const DEFAULT_DATABASE: &str = "test";

/// Options accepted by the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Accepted for driver compatibility, has no effect
    pub use_new_url_parser: bool,
    /// Accepted for driver compatibility, has no effect
    pub use_unified_topology: bool,
    /// Application name reported to the server
    pub app_name: Option<String>,
    /// How long the driver may wait for a suitable server
    pub server_selection_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            use_new_url_parser: true,
            use_unified_topology: true,
            app_name: None,
            server_selection_timeout: None,
        }
    }
}

impl ConnectOptions {
    /// Log the compatibility flags; they are acknowledged and otherwise ignored
    pub fn acknowledge(&self) {
        debug!(
            use_new_url_parser = self.use_new_url_parser,
            use_unified_topology = self.use_unified_topology,
            "Compatibility flags acknowledged"
        );
    }
}

/// Parsed endpoint URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    uri: String,
    scheme: String,
    host: String,
    database: String,
}

impl Endpoint {
    /// Parse `scheme://host[:port][,host...]/database[?options]`
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        let url = Url::parse(&first_host_only(trimmed))
            .map_err(|e| SyllabusError::connection(format!("Invalid endpoint URI '{}': {}", uri, e)))?;

        let host = url.host_str().unwrap_or_default().to_string();
        if host.is_empty() {
            return Err(SyllabusError::connection(format!(
                "Endpoint URI '{}' does not name a host",
                uri
            )));
        }

        let database = url
            .path()
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|db| !db.is_empty())
            .unwrap_or(DEFAULT_DATABASE)
            .to_string();

        Ok(Self {
            uri: trimmed.to_string(),
            scheme: url.scheme().to_string(),
            host,
            database,
        })
    }

    /// Full URI as given
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URI scheme (`mongodb`, `mongodb+srv`, `memory`)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// First host named by the URI
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Database name
    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Seed lists (`h1:27017,h2:27017`) are not valid URL authorities; keep the
/// first host for parsing.
fn first_host_only(uri: &str) -> Cow<'_, str> {
    let Some(start) = uri.find("://").map(|i| i + 3) else {
        return Cow::Borrowed(uri);
    };
    let rest = &uri[start..];
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    let authority = &rest[..end];
    match authority.find(',') {
        Some(comma) => Cow::Owned(format!(
            "{}{}{}",
            &uri[..start],
            &authority[..comma],
            &rest[end..]
        )),
        None => Cow::Borrowed(uri),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.host, self.database)
    }
}

struct SessionInner {
    store: Arc<dyn IDocumentStore>,
    endpoint: Endpoint,
    closed: AtomicBool,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            warn!("Session to {} dropped without close()", self.endpoint);
        }
    }
}

/// An open connection to a document store
///
/// Cheap to clone; all clones share one connection. Release it with
/// [`Session::close`]; afterwards every operation on any clone fails with a
/// connection error.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Wrap a connected store
    pub fn new(store: Arc<dyn IDocumentStore>, endpoint: Endpoint) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                endpoint,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Endpoint this session is connected to
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Database name
    pub fn database(&self) -> &str {
        self.inner.endpoint.database()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The store, or a connection error once closed
    pub fn store(&self) -> Result<&dyn IDocumentStore> {
        if self.is_closed() {
            return Err(SyllabusError::connection(format!(
                "Session to {} is closed",
                self.inner.endpoint
            )));
        }
        Ok(self.inner.store.as_ref())
    }

    /// Ping the backend
    pub async fn is_ready(&self) -> Result<bool> {
        self.store()?.is_ready().await
    }

    /// Release the connection
    ///
    /// Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.store.close().await?;
        info!("Disconnected from {}", self.inner.endpoint);
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.inner.endpoint.to_string())
            .field("backend", &self.inner.store.backend())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MockIDocumentStore;

    #[test]
    fn test_endpoint_parse() {
        let endpoint = Endpoint::parse("mongodb://localhost/db-exercise").unwrap();
        assert_eq!(endpoint.scheme(), "mongodb");
        assert_eq!(endpoint.host(), "localhost");
        assert_eq!(endpoint.database(), "db-exercise");
        assert_eq!(endpoint.to_string(), "mongodb://localhost/db-exercise");
    }

    #[test]
    fn test_endpoint_parse_with_port_and_options() {
        let endpoint =
            Endpoint::parse("mongodb://user:pw@db.example.com:27017/demo?retryWrites=true").unwrap();
        assert_eq!(endpoint.host(), "db.example.com");
        assert_eq!(endpoint.database(), "demo");
    }

    #[test]
    fn test_endpoint_parse_seed_list() {
        let endpoint =
            Endpoint::parse("mongodb://h1.example.com:27017,h2.example.com:27017/demo?replicaSet=rs0")
                .unwrap();
        assert_eq!(endpoint.host(), "h1.example.com");
        assert_eq!(endpoint.database(), "demo");
        assert!(endpoint.uri().contains("h2.example.com"));
    }

    #[test]
    fn test_endpoint_default_database() {
        let endpoint = Endpoint::parse("mongodb://localhost").unwrap();
        assert_eq!(endpoint.database(), DEFAULT_DATABASE);
    }

    #[test]
    fn test_endpoint_parse_errors() {
        assert!(matches!(
            Endpoint::parse("not a uri"),
            Err(SyllabusError::Connection(_))
        ));
        assert!(matches!(
            Endpoint::parse("memory:///demo"),
            Err(SyllabusError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_gates_store() {
        let mut store = MockIDocumentStore::new();
        store.expect_close().times(1).returning(|| Ok(()));
        store.expect_backend().return_const("mock");

        let session = Session::new(
            Arc::new(store),
            Endpoint::parse("memory://local/demo").unwrap(),
        );
        assert!(session.store().is_ok());

        session.close().await.unwrap();
        session.close().await.unwrap();

        assert!(session.is_closed());
        assert!(matches!(session.store(), Err(SyllabusError::Connection(_))));
        assert!(matches!(
            session.is_ready().await,
            Err(SyllabusError::Connection(_))
        ));
    }
}
