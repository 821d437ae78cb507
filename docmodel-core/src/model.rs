//! Typed handles bound to one collection.
//!
//! A [`Model`] is produced by the registry's [`ModelBuilder`](crate::registry::ModelBuilder) and
//! shares the registry's single connection with every other model. It exposes the CRUD and
//! query operations, applying its [`AutoFieldPolicy`] to creates and replaces.
//!
//! # Example
//!
//! ```ignore
//! let alice = db.models.users.create(User { name: "Alice".into() }).await?;
//! let found = db.models.users.find(&alice.id).await?;
//! let admins = db.models.users.find_many_by(UserField::Role, "admin").await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, future::Future, marker::PhantomData, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::{
    backend::{CollectionPath, StoreBackend},
    document::{Document, DocumentField, NewDocument, Record, Replacement},
    error::{DocumentStoreError, DocumentStoreResult},
    fields::AutoFieldPolicy,
    query::{QueryOptions, QuerySpec},
};

/// Partition key path every collection must declare.
pub const ID_PARTITION_KEY_PATH: &str = "/id";

/// A typed handle to one collection of a shared connection.
pub struct Model<T: Document> {
    connection: Arc<dyn StoreBackend>,
    path: Arc<CollectionPath>,
    policy: AutoFieldPolicy,
    connection_setting: Arc<str>,
    deadline: Option<Duration>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Model<T> {
    pub(crate) fn new(
        connection: Arc<dyn StoreBackend>,
        path: CollectionPath,
        policy: AutoFieldPolicy,
        connection_setting: Arc<str>,
    ) -> Self {
        Self {
            connection,
            path: Arc::new(path),
            policy,
            connection_setting,
            deadline: None,
            _marker: PhantomData,
        }
    }

    /// Returns the name of the database this model's collection lives in.
    pub fn database(&self) -> &str {
        &self.path.database
    }

    /// Returns the name of this model's collection.
    pub fn collection(&self) -> &str {
        &self.path.collection
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// Returns the effective auto-field policy.
    pub fn policy(&self) -> AutoFieldPolicy {
        self.policy
    }

    /// Returns the name of the connection setting (environment variable) this model was built
    /// from.
    pub fn connection_setting(&self) -> &str {
        &self.connection_setting
    }

    /// Returns the shared connection.
    pub fn connection(&self) -> &Arc<dyn StoreBackend> {
        &self.connection
    }

    /// Returns a copy of this model whose every operation fails with
    /// [`DocumentStoreError::Timeout`] once `deadline` elapses.
    pub fn with_deadline(&self, deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Returns the per-call deadline, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Fetches every document in the collection.
    ///
    /// Order is whatever the store returns.
    pub async fn all(&self) -> DocumentStoreResult<Vec<Record<T>>> {
        debug!(collection = %self.path, "reading all documents");

        let documents = self
            .run("all", self.connection.read_all(&self.path))
            .await?;

        decode_all(documents)
    }

    /// Fetches a document by id. Returns `None` when it does not exist.
    pub async fn find(&self, id: &str) -> DocumentStoreResult<Option<Record<T>>> {
        debug!(collection = %self.path, id, "reading document");

        self.run("find", self.connection.read_item(&self.path, id))
            .await?
            .map(decode)
            .transpose()
    }

    /// Fetches several documents by id with a single query. Missing ids are omitted.
    pub async fn find_many<I, S>(&self, ids: I) -> DocumentStoreResult<Vec<Record<T>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect::<Vec<String>>();
        debug!(collection = %self.path, count = ids.len(), "reading documents by id");

        self.fetch(QuerySpec::find_many(&ids), QueryOptions::default(), "find_many")
            .await
    }

    /// Fetches the first document whose `field` equals `value`.
    pub async fn find_by(
        &self,
        field: T::Field,
        value: impl Serialize,
    ) -> DocumentStoreResult<Option<Record<T>>> {
        let value = serde_json::to_value(value)?;
        debug!(collection = %self.path, field = field.name(), "finding document by field");

        Ok(self
            .fetch(
                QuerySpec::find_by(field.name(), value),
                QueryOptions::new().max_item_count(1).limit(1),
                "find_by",
            )
            .await?
            .into_iter()
            .next())
    }

    /// Fetches every document whose `field` equals `value`.
    pub async fn find_many_by(
        &self,
        field: T::Field,
        value: impl Serialize,
    ) -> DocumentStoreResult<Vec<Record<T>>> {
        let value = serde_json::to_value(value)?;
        debug!(collection = %self.path, field = field.name(), "finding documents by field");

        self.fetch(
            QuerySpec::find_many_by(field.name(), value),
            QueryOptions::default(),
            "find_many_by",
        )
        .await
    }

    /// Creates a document, filling in the reserved fields according to the model's policy.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Conflict`] if a document with the resulting id exists, and
    /// [`DocumentStoreError::InvalidDocument`] if id generation is disabled and no id was given.
    pub async fn create(&self, input: impl Into<NewDocument<T>>) -> DocumentStoreResult<Record<T>> {
        let record = self.policy.apply_create(input.into(), Utc::now())?;
        debug!(collection = %self.path, id = %record.id, "creating document");

        let document = serde_json::to_value(&record)?;
        let created = self
            .run("create", self.connection.create_item(&self.path, document))
            .await?;

        decode(created)
    }

    /// Inserts the record, or overwrites the stored document with the same id.
    ///
    /// The record is written exactly as given: upsert neither generates ids nor touches
    /// timestamps.
    pub async fn upsert(&self, record: Record<T>) -> DocumentStoreResult<Record<T>> {
        debug!(collection = %self.path, id = %record.id, "upserting document");

        let document = serde_json::to_value(&record)?;
        let upserted = self
            .run("upsert", self.connection.upsert_item(&self.path, document))
            .await?;

        decode(upserted)
    }

    /// Replaces the whole document stored under `id`.
    ///
    /// `updatedAt` is regenerated when timestamps are managed. `createdAt` is read from the
    /// stored document and written back unchanged, so a bare payload keeps it too.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] if no document with `id` exists.
    pub async fn replace(
        &self,
        id: &str,
        input: impl Into<Replacement<T>>,
    ) -> DocumentStoreResult<Record<T>> {
        let input = input.into();
        debug!(collection = %self.path, id, "replacing document");

        let replaced = self
            .run("replace", async {
                let prior = self
                    .connection
                    .read_item(&self.path, id)
                    .await?
                    .ok_or_else(|| DocumentStoreError::NotFound {
                        id: id.to_string(),
                        collection: self.path.collection.clone(),
                    })?;
                let StoredTimestamps { created_at } = serde_json::from_value(prior)?;

                let record = self.policy.apply_replace(id, created_at, input, Utc::now());
                let document = serde_json::to_value(&record)?;

                self.connection.replace_item(&self.path, id, document).await
            })
            .await?;

        decode(replaced)
    }

    /// Deletes a document, returning its prior value. Returns `None` when nothing was stored
    /// under `id`.
    pub async fn delete(&self, id: &str) -> DocumentStoreResult<Option<Record<T>>> {
        debug!(collection = %self.path, id, "deleting document");

        self.run("delete", self.connection.delete_item(&self.path, id))
            .await?
            .map(decode)
            .transpose()
    }

    /// Runs a raw or parameterized query and returns every row as `R`.
    ///
    /// ```ignore
    /// let ids = users.query::<IdOnly>("SELECT c.id FROM c").await?;
    /// let count = users.query::<u64>("SELECT VALUE count(c.id) FROM c").await?;
    /// ```
    pub async fn query<R: DeserializeOwned>(
        &self,
        spec: impl Into<QuerySpec>,
    ) -> DocumentStoreResult<Vec<R>> {
        self.query_with(spec, QueryOptions::default()).await
    }

    /// Same as [`Model::query`], passing `options` through to the store.
    pub async fn query_with<R: DeserializeOwned>(
        &self,
        spec: impl Into<QuerySpec>,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<R>> {
        let spec = spec.into();
        debug!(collection = %self.path, query = %spec.query, "running query");

        self.fetch(spec, options, "query").await
    }

    /// Checks that the collection is partitioned on `/id`, the precondition of every point
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] for any other partition key.
    pub async fn ensure_partition_key(&self) -> DocumentStoreResult<()> {
        let paths = self
            .run(
                "partition_key",
                self.connection.partition_key_paths(&self.path),
            )
            .await?;

        if paths.len() == 1 && paths[0] == ID_PARTITION_KEY_PATH {
            return Ok(());
        }

        warn!(collection = %self.path, ?paths, "collection is not partitioned on /id");
        Err(DocumentStoreError::Configuration(format!(
            "collection {} must be partitioned on {ID_PARTITION_KEY_PATH}, found {paths:?}",
            self.path
        )))
    }

    async fn fetch<R: DeserializeOwned>(
        &self,
        spec: QuerySpec,
        options: QueryOptions,
        operation: &'static str,
    ) -> DocumentStoreResult<Vec<R>> {
        let rows = self
            .run(
                operation,
                self.connection.query_items(&self.path, spec, options),
            )
            .await?;

        decode_all(rows)
    }

    async fn run<R>(
        &self,
        operation: &'static str,
        call: impl Future<Output = DocumentStoreResult<R>>,
    ) -> DocumentStoreResult<R> {
        match self.deadline {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .map_err(|_| DocumentStoreError::Timeout {
                    operation,
                    collection: self.path.collection.clone(),
                    after,
                })?,
            None => call.await,
        }
    }
}

/// The reserved field a replace carries over from the stored document.
#[derive(Deserialize)]
struct StoredTimestamps {
    #[serde(rename = "createdAt", default)]
    created_at: Option<DateTime<Utc>>,
}

fn decode<R: DeserializeOwned>(value: Value) -> DocumentStoreResult<R> {
    Ok(serde_json::from_value(value)?)
}

fn decode_all<R: DeserializeOwned>(values: Vec<Value>) -> DocumentStoreResult<Vec<R>> {
    values.into_iter().map(decode).collect()
}

impl<T: Document> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            path: Arc::clone(&self.path),
            policy: self.policy,
            connection_setting: Arc::clone(&self.connection_setting),
            deadline: self.deadline,
            _marker: PhantomData,
        }
    }
}

impl<T: Document> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .field("connection_setting", &self.connection_setting)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
