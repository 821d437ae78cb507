//! Automatic field policy.
//!
//! [`AutoFieldPolicy`] decides whether `id` and the `createdAt`/`updatedAt` timestamps are
//! generated by the model or taken from the caller. A registry carries one policy for all of its
//! models; [`ModelOverrides`] adjusts it per model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    document::{NewDocument, Record, Replacement},
    error::{DocumentStoreError, DocumentStoreResult},
    id::generate_id,
};

/// Controls which reserved fields a model fills in on its own.
///
/// Both switches default to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoFieldPolicy {
    /// Generate a time-sortable id on create.
    pub generate_id: bool,
    /// Stamp `createdAt` on create and `updatedAt` on create and replace.
    pub generate_timestamps: bool,
}

impl AutoFieldPolicy {
    /// Both switches enabled.
    pub const fn new() -> Self {
        Self {
            generate_id: true,
            generate_timestamps: true,
        }
    }

    /// Both switches disabled; every reserved field comes from the caller.
    pub const fn manual() -> Self {
        Self {
            generate_id: false,
            generate_timestamps: false,
        }
    }

    pub const fn with_generate_id(mut self, generate_id: bool) -> Self {
        self.generate_id = generate_id;
        self
    }

    pub const fn with_generate_timestamps(mut self, generate_timestamps: bool) -> Self {
        self.generate_timestamps = generate_timestamps;
        self
    }

    /// Applies per-model overrides on top of this policy.
    pub fn merge(self, overrides: &ModelOverrides) -> Self {
        Self {
            generate_id: overrides.generate_id.unwrap_or(self.generate_id),
            generate_timestamps: overrides
                .generate_timestamps
                .unwrap_or(self.generate_timestamps),
        }
    }

    /// Builds the document a create writes.
    ///
    /// With id generation enabled any caller-supplied id is discarded. Otherwise the id must be
    /// supplied. With timestamps enabled both `createdAt` and `updatedAt` are set to `now`.
    pub fn apply_create<T>(
        &self,
        input: NewDocument<T>,
        now: DateTime<Utc>,
    ) -> DocumentStoreResult<Record<T>> {
        let id = if self.generate_id {
            generate_id()?
        } else {
            input.id.ok_or_else(|| {
                DocumentStoreError::InvalidDocument(
                    "an id is required when id generation is disabled".to_string(),
                )
            })?
        };

        let (created_at, updated_at) = if self.generate_timestamps {
            (Some(now), Some(now))
        } else {
            (input.created_at, input.updated_at)
        };

        Ok(Record {
            id,
            created_at,
            updated_at,
            etag: None,
            ts: None,
            data: input.data,
        })
    }

    /// Builds the document a replace writes.
    ///
    /// The id always comes from the replace target. `created_at` is the stored document's
    /// creation instant and is written back unchanged.
    pub fn apply_replace<T>(
        &self,
        id: &str,
        created_at: Option<DateTime<Utc>>,
        input: Replacement<T>,
        now: DateTime<Utc>,
    ) -> Record<T> {
        Record {
            id: id.to_string(),
            created_at,
            updated_at: if self.generate_timestamps {
                Some(now)
            } else {
                input.updated_at
            },
            etag: None,
            ts: None,
            data: input.data,
        }
    }
}

impl Default for AutoFieldPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-model adjustments to the registry's [`AutoFieldPolicy`].
///
/// Unset switches inherit the registry's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOverrides {
    pub generate_id: Option<bool>,
    pub generate_timestamps: Option<bool>,
}

impl ModelOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id(mut self, generate_id: bool) -> Self {
        self.generate_id = Some(generate_id);
        self
    }

    pub fn generate_timestamps(mut self, generate_timestamps: bool) -> Self {
        self.generate_timestamps = Some(generate_timestamps);
        self
    }
}
