//! In-memory document store

use crate::evaluator::{apply_update, project, sort_documents, Predicate};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use syllabus_core::bson::{oid::ObjectId, Bson, Document};
use syllabus_core::{
    ConnectOptions, Endpoint, Filter, IDocumentStore, QueryOptions, Result, SyllabusError, Update,
    UpdateSummary,
};
use tracing::{debug, info};

/// Endpoint scheme served by this store
pub const MEMORY_SCHEME: &str = "memory";

/// Document store held in process memory
///
/// Collections keep documents in insertion order, which is the natural
/// order `find` returns when no sort is given. Each document update is
/// applied under the write lock, so it is atomic per document.
pub struct MemoryStore {
    database: String,
    collections: RwLock<HashMap<String, Vec<Document>>>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store for a database name
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a store for a `memory://` endpoint
    pub async fn connect(endpoint: &Endpoint, options: &ConnectOptions) -> Result<Self> {
        if endpoint.scheme() != MEMORY_SCHEME {
            return Err(SyllabusError::connection(format!(
                "In-memory store cannot serve '{}' endpoints",
                endpoint.scheme()
            )));
        }
        options.acknowledge();

        let store = Self::new(endpoint.database());
        info!("Connected to in-memory database: {}", endpoint.database());
        Ok(store)
    }

    /// Database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Whether a collection holds no documents
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyllabusError::connection(format!(
                "In-memory database '{}' is closed",
                self.database
            )));
        }
        Ok(())
    }

    fn matching<'a>(
        docs: &'a [Document],
        predicate: &'a Predicate,
    ) -> impl Iterator<Item = (usize, &'a Document)> + 'a {
        docs.iter()
            .enumerate()
            .filter(move |(_, doc)| predicate.matches(doc))
    }
}

/// Put `_id` first, generating one when missing
fn with_id_first(doc: Document) -> (Bson, Document) {
    let id = doc
        .get("_id")
        .cloned()
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
    let mut out = Document::new();
    out.insert("_id", id.clone());
    for (key, value) in doc {
        if key != "_id" {
            out.insert(key, value);
        }
    }
    (id, out)
}

#[async_trait]
impl IDocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        MEMORY_SCHEME
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(!self.closed.load(Ordering::SeqCst))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Bson> {
        self.ensure_open()?;
        let (id, doc) = with_id_first(doc);

        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|existing| existing.get("_id") == Some(&id)) {
            return Err(SyllabusError::storage(format!(
                "E11000 duplicate key error collection: {}.{} index: _id_ dup key: {}",
                self.database, collection, id
            )));
        }
        docs.push(doc);

        debug!("Inserted {} into {}.{}", id, self.database, collection);
        Ok(id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        self.ensure_open()?;
        let predicate = Predicate::compile(filter)?;

        let mut found: Vec<Document> = {
            let collections = self.collections.read();
            match collections.get(collection) {
                Some(docs) => Self::matching(docs, &predicate)
                    .map(|(_, doc)| doc.clone())
                    .collect(),
                None => Vec::new(),
            }
        };

        sort_documents(&mut found, &options.sort);

        let skip = options.skip.unwrap_or(0) as usize;
        // A limit of zero means no limit, as in the document store.
        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(n) => n as usize,
        };

        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &options.projection {
                Some(fields) => project(&doc, fields),
                None => doc,
            })
            .collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        self.ensure_open()?;
        let predicate = Predicate::compile(filter)?;

        let collections = self.collections.read();
        Ok(collections.get(collection).and_then(|docs| {
            Self::matching(docs, &predicate)
                .next()
                .map(|(_, doc)| doc.clone())
        }))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.ensure_open()?;
        let predicate = Predicate::compile(filter)?;

        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|docs| Self::matching(docs, &predicate).count() as u64)
            .unwrap_or(0))
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<UpdateSummary> {
        self.ensure_open()?;
        let predicate = Predicate::compile(filter)?;

        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(UpdateSummary::default());
        };
        let Some(index) = Self::matching(docs, &predicate).map(|(i, _)| i).next() else {
            return Ok(UpdateSummary::default());
        };

        let current_id = docs[index].get("_id").cloned();
        if let Some(new_id) = doc.get("_id") {
            if Some(new_id) != current_id.as_ref() {
                return Err(SyllabusError::storage(
                    "Performing an update on the path '_id' would modify the immutable field '_id'",
                ));
            }
        }

        let mut replacement = Document::new();
        if let Some(id) = current_id {
            replacement.insert("_id", id);
        }
        for (key, value) in doc {
            if key != "_id" {
                replacement.insert(key, value);
            }
        }

        let modified = docs[index] != replacement;
        docs[index] = replacement;
        Ok(UpdateSummary {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateSummary> {
        self.ensure_open()?;
        let predicate = Predicate::compile(filter)?;
        if update.is_empty() {
            return Err(SyllabusError::storage("Update document requires at least one operator"));
        }
        if let Some(field) = update.repeated_field() {
            return Err(SyllabusError::storage(format!(
                "Updating the path '{}' would create a conflict at '{}'",
                field, field
            )));
        }

        let mut collections = self.collections.write();
        let mut summary = UpdateSummary::default();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(summary);
        };

        for doc in docs.iter_mut().filter(|doc| predicate.matches(doc)) {
            summary.matched += 1;
            if apply_update(doc, update)? {
                summary.modified += 1;
            }
        }

        debug!(
            "Updated {}.{}: matched {}, modified {}",
            self.database, collection, summary.matched, summary.modified
        );
        Ok(summary)
    }
}
