//! Main docmodel crate: typed models over Cosmos DB style document collections.
//!
//! This crate is the primary entry point for users of docmodel. It re-exports the core types,
//! the `Document` derive macro and the storage backends.
//!
//! # Features
//!
//! - **One connection, many models** - A [`Registry`](registry::Registry) opens a single
//!   connection and hands it to every model built from it
//! - **Typed documents** - Payloads are plain serde structs; `id`, `createdAt` and `updatedAt`
//!   are managed for you
//! - **Typed field lookups** - `#[derive(Document)]` generates a field enum for `find_by`
//! - **Parameterized queries** - The store's SQL dialect with bound parameters
//! - **Layered configuration** - [`config::Settings`] from defaults, TOML and environment
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryConnector};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
//! #[serde(rename_all = "camelCase")]
//! pub struct User {
//!     pub display_name: String,
//!     pub role: String,
//! }
//!
//! struct Models {
//!     users: Model<User>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let db = Registry::new("app")
//!         .with_connection_string("memory")
//!         .build(InMemoryConnector::default(), |builder| Models {
//!             users: builder.create_model("users"),
//!         })?;
//!
//!     let alice = db.models.users
//!         .create(User { display_name: "Alice".into(), role: "admin".into() })
//!         .await?;
//!
//!     let admins = db.models.users.find_many_by(UserField::Role, "admin").await?;
//!     assert_eq!(admins, vec![alice.clone()]);
//!
//!     let mut renamed = alice.clone();
//!     renamed.display_name = "Alicia".into();
//!     let renamed = db.models.users.replace(&alice.id, renamed).await?;
//!     assert_eq!(renamed.created_at, alice.created_at);
//!
//!     let count = db.models.users
//!         .query::<u64>("SELECT VALUE COUNT(c.id) FROM c")
//!         .await?;
//!     assert_eq!(count, vec![1]);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `cosmos` - Cosmos DB over its REST API (requires the `cosmos` feature)

#[allow(unused_extern_crates)]
extern crate self as docmodel;

pub mod config;
pub mod prelude;

pub use docmodel_core::{
    backend, binding, connection, document, error, fields, id, model, query, registry,
};
pub use docmodel_macros::Document;

pub mod memory {
    //! In-memory backend.
    pub use docmodel_memory::*;
}

#[cfg(feature = "cosmos")]
pub mod cosmos {
    //! Cosmos DB backend.
    pub use docmodel_cosmos::*;
}
