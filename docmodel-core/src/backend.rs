//! Storage backend abstraction.
//!
//! The [`StoreBackend`] trait is the store protocol the models speak: native point reads and
//! writes addressed by id (which doubles as the partition key), a read feed, and parameterized
//! queries in the store's SQL dialect. A [`Connector`] turns a resolved connection string into a
//! backend; the registry calls it exactly once per build.
//!
//! Documents cross this boundary as JSON objects.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{self, Debug, Display};

use crate::{
    error::DocumentStoreResult,
    query::{QueryOptions, QuerySpec},
};

/// Addresses one collection of one database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub database: String,
    pub collection: String,
}

impl CollectionPath {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// The store's resource link for this collection, `dbs/{database}/colls/{collection}`.
    pub fn resource_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.collection)
    }

    /// The resource link of one document in this collection.
    pub fn document_link(&self, id: &str) -> String {
        format!("{}/docs/{}", self.resource_link(), id)
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_link())
    }
}

/// Abstract interface for document stores.
///
/// Every point operation uses the document id as the partition key.
///
/// # Error Handling
///
/// Implementations map the store's responses onto
/// [`DocumentStoreError`](crate::error::DocumentStoreError):
///
/// - a missing document is `Ok(None)` for reads and deletes, and `NotFound` for replaces;
/// - an id collision on create is `Conflict`;
/// - everything else is `Store`, carrying the store's status code when there is one.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Reads one document by id.
    async fn read_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>>;

    /// Reads every document of the collection, following continuations internally.
    async fn read_all(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<Value>>;

    /// Inserts a new document. The document must carry its `id`.
    async fn create_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value>;

    /// Inserts the document or overwrites the existing document with the same id.
    async fn upsert_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value>;

    /// Replaces an existing document as a whole.
    async fn replace_item(
        &self,
        path: &CollectionPath,
        id: &str,
        document: Value,
    ) -> DocumentStoreResult<Value>;

    /// Deletes a document, returning its prior value when it existed.
    async fn delete_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>>;

    /// Runs a query and returns every result row, following continuations internally.
    async fn query_items(
        &self,
        path: &CollectionPath,
        query: QuerySpec,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Value>>;

    /// Returns the partition key paths declared by the collection, e.g. `["/id"]`.
    async fn partition_key_paths(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<String>>;
}

/// Factory that opens a backend from a connection string.
pub trait Connector {
    type Backend: StoreBackend + 'static;

    /// Opens a connection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`](crate::error::DocumentStoreError) when the
    /// connection string is malformed.
    fn connect(&self, connection_string: &str) -> DocumentStoreResult<Self::Backend>;
}

impl<C: Connector + ?Sized> Connector for &C {
    type Backend = C::Backend;

    fn connect(&self, connection_string: &str) -> DocumentStoreResult<Self::Backend> {
        (**self).connect(connection_string)
    }
}
