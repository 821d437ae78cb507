//! Core traits and types for document representation.
//!
//! A stored document is split in two: the reserved fields this crate manages (`id`,
//! `createdAt`, `updatedAt`, plus the store's read-only system properties) and the caller's
//! payload type, which carries everything else. [`Record`] joins the two back together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    fmt::Debug,
    ops::{Deref, DerefMut},
};

/// Field names managed by this crate. A payload type must not declare any of them.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// A named, serialized field of a [`Document`] payload.
///
/// Implemented by the field enum `#[derive(Document)]` generates, so that
/// [`Model::find_by`](crate::model::Model::find_by) only accepts fields the payload declares.
pub trait DocumentField: Copy + Debug + Send + Sync + 'static {
    /// Returns the field's name as it appears in the stored JSON.
    fn name(&self) -> &'static str;
}

/// Core trait that every document payload must implement.
///
/// The payload holds every field of a stored document except the reserved ones listed in
/// [`RESERVED_FIELDS`]. Use `#[derive(Document)]` from the `docmodel` crate to implement it.
///
/// # Example
///
/// ```ignore
/// use docmodel::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Document)]
/// #[serde(rename_all = "camelCase")]
/// pub struct User {
///     pub first_name: String,
///     pub email: String,
/// }
///
/// // Generated: `pub enum UserField { FirstName, Email }`
/// assert_eq!(UserField::FirstName.name(), "firstName");
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// The enum naming this payload's fields.
    type Field: DocumentField;
}

/// A document as stored in a collection: reserved fields plus the flattened payload.
///
/// `etag` and `ts` are the store's system properties (`_etag`, `_ts`). They are read from the
/// store but never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    /// Unique identifier, also used as the partition key.
    pub id: String,
    /// Creation instant, managed when timestamp generation is enabled.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last replacement instant, managed when timestamp generation is enabled.
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "_etag", default, skip_serializing)]
    pub etag: Option<String>,
    #[serde(rename = "_ts", default, skip_serializing)]
    pub ts: Option<i64>,
    /// The caller's payload.
    #[serde(flatten)]
    pub data: T,
}

impl<T> Record<T> {
    /// Creates a record with the given id and no timestamps.
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            updated_at: None,
            etag: None,
            ts: None,
            data,
        }
    }

    /// Consumes the record, returning its payload.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for Record<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

/// Input to [`Model::create`](crate::model::Model::create).
///
/// The reserved fields are optional overrides: they are only honoured when the model's
/// [`AutoFieldPolicy`](crate::fields::AutoFieldPolicy) leaves them to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument<T> {
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub data: T,
}

impl<T> NewDocument<T> {
    pub fn new(data: T) -> Self {
        Self {
            id: None,
            created_at: None,
            updated_at: None,
            data,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

impl<T: Document> From<T> for NewDocument<T> {
    fn from(data: T) -> Self {
        NewDocument::new(data)
    }
}

/// Input to [`Model::replace`](crate::model::Model::replace).
///
/// There is no `created_at`: replace carries the stored creation instant over unchanged.
/// `updated_at` is only honoured when the model leaves timestamps to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement<T> {
    pub updated_at: Option<DateTime<Utc>>,
    pub data: T,
}

impl<T> Replacement<T> {
    pub fn new(data: T) -> Self {
        Self {
            updated_at: None,
            data,
        }
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

impl<T: Document> From<T> for Replacement<T> {
    fn from(data: T) -> Self {
        Replacement::new(data)
    }
}

/// Drops the record's `created_at`; the stored value is kept by the replace itself.
impl<T> From<Record<T>> for Replacement<T> {
    fn from(record: Record<T>) -> Self {
        Self {
            updated_at: record.updated_at,
            data: record.data,
        }
    }
}
