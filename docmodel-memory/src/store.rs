//! In-memory storage implementation for document stores.
//!
//! This module provides a backend that keeps documents as JSON values in ordered maps behind an
//! async-aware read-write lock. It mimics the store's behavior closely enough for tests: system
//! properties are stamped on every write, ids collide on create, replaces of missing documents
//! fail, and queries run through the SQL subset in [`crate::sql`].

use async_trait::async_trait;
use chrono::Utc;
use mea::rwlock::RwLock;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::debug;
use uuid::Uuid;

use docmodel_core::{
    backend::{CollectionPath, Connector, StoreBackend},
    error::{DocumentStoreError, DocumentStoreResult},
    model::ID_PARTITION_KEY_PATH,
    query::{QueryOptions, QuerySpec},
};

use crate::{evaluator, sql};

#[derive(Debug)]
struct Collection {
    partition_key_paths: Vec<String>,
    /// Documents keyed by id. Ordered, so reads are deterministic.
    documents: BTreeMap<String, Value>,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            partition_key_paths: vec![ID_PARTITION_KEY_PATH.to_string()],
            documents: BTreeMap::new(),
        }
    }
}

type StoreMap = HashMap<CollectionPath, Collection>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share the
/// same data. Collections are created on first write, partitioned on `/id`, unless declared
/// up front with [`InMemoryStore::create_collection`].
///
/// Queries scan every document of the collection; there is no indexing.
///
/// # Example
///
/// ```ignore
/// use docmodel::{backend::{CollectionPath, StoreBackend}, memory::InMemoryStore};
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// let users = CollectionPath::new("app", "users");
///
/// store.create_item(&users, json!({"id": "u1", "name": "Alice"})).await?;
/// let alice = store.read_item(&users, "u1").await?;
/// assert_eq!(alice.unwrap()["name"], "Alice");
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Declares a collection with the given partition key paths, keeping any documents it
    /// already holds.
    pub async fn create_collection(&self, path: &CollectionPath, partition_key_paths: &[&str]) {
        let mut store = self.store.write().await;
        let collection = store.entry(path.clone()).or_default();

        collection.partition_key_paths = partition_key_paths
            .iter()
            .map(|p| p.to_string())
            .collect();
    }

    /// Returns the number of documents stored in a collection.
    pub async fn len(&self, path: &CollectionPath) -> usize {
        self.store
            .read()
            .await
            .get(path)
            .map_or(0, |collection| collection.documents.len())
    }
}

/// Validates a document before a write and returns its id.
fn document_id(operation: &'static str, path: &CollectionPath, document: &Value) -> DocumentStoreResult<String> {
    let Some(object) = document.as_object() else {
        return Err(DocumentStoreError::store(
            operation,
            path.to_string(),
            Some(400),
            "The input content is invalid because it is not a JSON object.",
        ));
    };

    match object.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        _ => Err(DocumentStoreError::store(
            operation,
            path.to_string(),
            Some(400),
            "The input content is invalid because the required property 'id' is missing.",
        )),
    }
}

/// Sets the system properties the store maintains on every write.
fn stamp(mut document: Value) -> Value {
    if let Some(object) = document.as_object_mut() {
        object.insert("_etag".to_string(), Value::String(format!("\"{}\"", Uuid::new_v4())));
        object.insert("_ts".to_string(), Value::from(Utc::now().timestamp()));
    }
    document
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn read_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>> {
        let store = self.store.read().await;

        Ok(store
            .get(path)
            .and_then(|collection| collection.documents.get(id))
            .cloned())
    }

    async fn read_all(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<Value>> {
        let store = self.store.read().await;

        Ok(store
            .get(path)
            .map(|collection| collection.documents.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value> {
        let id = document_id("create", path, &document)?;
        let mut store = self.store.write().await;
        let collection = store.entry(path.clone()).or_default();

        if collection.documents.contains_key(&id) {
            return Err(DocumentStoreError::Conflict {
                id,
                collection: path.collection.clone(),
            });
        }

        let document = stamp(document);
        collection.documents.insert(id.clone(), document.clone());
        debug!(collection = %path, id, "stored new document");

        Ok(document)
    }

    async fn upsert_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value> {
        let id = document_id("upsert", path, &document)?;
        let mut store = self.store.write().await;
        let collection = store.entry(path.clone()).or_default();

        let document = stamp(document);
        collection.documents.insert(id, document.clone());

        Ok(document)
    }

    async fn replace_item(
        &self,
        path: &CollectionPath,
        id: &str,
        document: Value,
    ) -> DocumentStoreResult<Value> {
        if document_id("replace", path, &document)? != id {
            return Err(DocumentStoreError::store(
                "replace",
                path.document_link(id),
                Some(400),
                "The id in the document does not match the id being replaced.",
            ));
        }

        let mut store = self.store.write().await;
        let not_found = || DocumentStoreError::NotFound {
            id: id.to_string(),
            collection: path.collection.clone(),
        };

        let slot = store
            .get_mut(path)
            .and_then(|collection| collection.documents.get_mut(id))
            .ok_or_else(not_found)?;

        *slot = stamp(document);

        Ok(slot.clone())
    }

    async fn delete_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>> {
        let mut store = self.store.write().await;

        Ok(store
            .get_mut(path)
            .and_then(|collection| collection.documents.remove(id)))
    }

    /// Runs the query over a snapshot of the collection. `max_item_count` only sizes pages, and
    /// every page is returned, so it has no effect here.
    async fn query_items(
        &self,
        path: &CollectionPath,
        query: QuerySpec,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Value>> {
        let bad_request =
            |err: sql::SqlError| DocumentStoreError::store("query", path.to_string(), Some(400), err.0);

        let parsed = sql::parse(&query.query).map_err(bad_request)?;
        let store = self.store.read().await;
        let documents = store
            .get(path)
            .map(|collection| collection.documents.values())
            .into_iter()
            .flatten();

        let mut rows = evaluator::execute(&parsed, documents, &query.parameters).map_err(bad_request)?;
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn partition_key_paths(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<String>> {
        let store = self.store.read().await;

        Ok(store
            .get(path)
            .map(|collection| collection.partition_key_paths.clone())
            .unwrap_or_else(|| vec![ID_PARTITION_KEY_PATH.to_string()]))
    }
}

/// Connector handing out clones of one shared [`InMemoryStore`].
///
/// The connection string is accepted as is. The connector counts how often it was asked to
/// connect.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    store: InMemoryStore,
    connections: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    /// Creates a connector over an existing store.
    pub fn new(store: InMemoryStore) -> Self {
        Self {
            store,
            connections: Arc::default(),
        }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Returns how many connections this connector has opened.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Connector for InMemoryConnector {
    type Backend = InMemoryStore;

    fn connect(&self, _connection_string: &str) -> DocumentStoreResult<InMemoryStore> {
        let opened = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(connections = opened, "opened in-memory connection");

        Ok(self.store.clone())
    }
}
