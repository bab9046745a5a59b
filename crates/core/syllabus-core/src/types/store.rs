//! Document store adapter trait

use super::query::{Filter, QueryOptions, Update, UpdateSummary};
use crate::Result;
use async_trait::async_trait;
use bson::{Bson, Document};

/// Backend a session talks to
///
/// Implementations translate the typed filters and updates into their own
/// query form. Every method fails with a connection error once `close` has
/// been called.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IDocumentStore: Send + Sync {
    /// Short backend name for logs (`mongodb`, `memory`)
    fn backend(&self) -> &'static str;

    /// Check the backend is reachable
    async fn is_ready(&self) -> Result<bool>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()>;

    /// Insert one document, returning its identifier
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Bson>;

    /// Find matching documents, eagerly materialised
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &QueryOptions,
    ) -> Result<Vec<Document>>;

    /// First matching document in store order
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Count matching documents
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Replace the first matching document wholesale
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<UpdateSummary>;

    /// Apply a partial update to every matching document
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateSummary>;
}
