//! MongoDB document store adapter

use crate::query::{filter_document, find_options, update_document};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::ClientOptions,
    Client, Collection, Database,
};
use std::sync::atomic::{AtomicBool, Ordering};
use syllabus_core::{
    ConnectOptions, Endpoint, Filter, IDocumentStore, QueryOptions, Result, SyllabusError, Update,
    UpdateSummary,
};
use tracing::{debug, info};

/// Endpoint schemes served by this adapter
pub const MONGO_SCHEMES: [&str; 2] = ["mongodb", "mongodb+srv"];

/// MongoDB document store
pub struct MongoStore {
    db: Database,
    client: Client,
    closed: AtomicBool,
}

impl MongoStore {
    /// Connect and verify the server answers a ping
    pub async fn connect(endpoint: &Endpoint, options: &ConnectOptions) -> Result<Self> {
        if !MONGO_SCHEMES.contains(&endpoint.scheme()) {
            return Err(SyllabusError::connection(format!(
                "MongoDB adapter cannot serve '{}' endpoints",
                endpoint.scheme()
            )));
        }
        info!("Connecting to MongoDB database: {}", endpoint.database());
        options.acknowledge();

        let mut client_options = ClientOptions::parse(endpoint.uri())
            .await
            .map_err(|e| SyllabusError::connection(format!("Failed to parse MongoDB URI: {}", e)))?;
        if let Some(app_name) = &options.app_name {
            client_options.app_name = Some(app_name.clone());
        }
        if let Some(timeout) = options.server_selection_timeout {
            client_options.server_selection_timeout = Some(timeout);
        }

        let client = Client::with_options(client_options).map_err(|e| {
            SyllabusError::connection(format!("Failed to create MongoDB client: {}", e))
        })?;

        let db = client.database(endpoint.database());

        // Ping the database to verify connection
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| SyllabusError::connection(format!("Failed to connect to MongoDB: {}", e)))?;

        info!("Connected to MongoDB");

        Ok(Self {
            db,
            client,
            closed: AtomicBool::new(false),
        })
    }

    /// Get the database instance
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Get the client instance
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get a collection by name
    fn collection(&self, name: &str) -> Result<Collection<Document>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyllabusError::connection("MongoDB client has been shut down"));
        }
        Ok(self.db.collection(name))
    }
}

#[async_trait]
impl IDocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn is_ready(&self) -> Result<bool> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(false);
        }
        match self.db.run_command(doc! { "ping": 1 }).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.clone().shutdown().await;
        debug!("MongoDB client shut down");
        Ok(())
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Bson> {
        let result = self
            .collection(collection)?
            .insert_one(doc)
            .await
            .map_err(|e| SyllabusError::storage(format!("Failed to insert into {}: {}", collection, e)))?;

        Ok(result.inserted_id)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        let cursor = self
            .collection(collection)?
            .find(filter_document(filter))
            .with_options(find_options(options))
            .await
            .map_err(|e| SyllabusError::storage(format!("Failed to query {}: {}", collection, e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| SyllabusError::storage(format!("Failed to iterate {}: {}", collection, e)))
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        self.collection(collection)?
            .find_one(filter_document(filter))
            .await
            .map_err(|e| SyllabusError::storage(format!("Failed to query {}: {}", collection, e)))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.collection(collection)?
            .count_documents(filter_document(filter))
            .await
            .map_err(|e| SyllabusError::storage(format!("Failed to count {}: {}", collection, e)))
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<UpdateSummary> {
        let result = self
            .collection(collection)?
            .replace_one(filter_document(filter), doc)
            .await
            .map_err(|e| SyllabusError::storage(format!("Failed to save into {}: {}", collection, e)))?;

        Ok(UpdateSummary {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateSummary> {
        if let Some(field) = update.repeated_field() {
            return Err(SyllabusError::storage(format!(
                "Updating the path '{}' would create a conflict at '{}'",
                field, field
            )));
        }
        let update = update_document(update);
        if update.is_empty() {
            return Err(SyllabusError::storage("Update document requires at least one operator"));
        }

        let result = self
            .collection(collection)?
            .update_many(filter_document(filter), update)
            .await
            .map_err(|e| SyllabusError::storage(format!("Failed to update {}: {}", collection, e)))?;

        Ok(UpdateSummary {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }
}
