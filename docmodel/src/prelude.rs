//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - The registry and model handles
//! - Document traits, the derive macro and record types
//! - Auto-field policy and per-model overrides
//! - Query types
//! - Error types

pub use docmodel_core::{
    backend::{CollectionPath, Connector, StoreBackend},
    binding::InputBinding,
    document::{Document, DocumentField, NewDocument, Record, Replacement},
    error::{DocumentStoreError, DocumentStoreResult},
    fields::{AutoFieldPolicy, ModelOverrides},
    model::Model,
    query::{QueryOptions, QuerySpec},
    registry::{Connected, ModelBuilder, Registry},
};
pub use docmodel_macros::Document;

pub use crate::config::Settings;
