//! A typed model layer over Cosmos DB style document collections.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Registry** ([`registry`]) - Resolves one connection and builds the models sharing it
//! - **Models** ([`model`]) - Typed CRUD and query handles bound to one collection
//! - **Document types** ([`document`]) - The payload trait and the stored record shape
//! - **Auto fields** ([`fields`]) - Policy for generated ids and timestamps
//! - **Queries** ([`query`]) - Parameterized queries in the store's SQL dialect
//! - **Store backend abstraction** ([`backend`]) - The store protocol backends implement
//! - **Connection resolution** ([`connection`]) - Explicit or environment-provided connection strings
//! - **Bindings** ([`binding`]) - Declarative input-binding descriptors for serverless triggers
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryConnector};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! pub struct User {
//!     pub name: String,
//! }
//!
//! let db = Registry::new("app")
//!     .with_connection_string("memory")
//!     .build(InMemoryConnector::default(), |builder| builder.create_model::<User>("users"))?;
//!
//! let alice = db.models.create(User { name: "Alice".into() }).await?;
//! assert_eq!(db.models.find(&alice.id).await?, Some(alice));
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod binding;
pub mod connection;
pub mod document;
pub mod error;
pub mod fields;
pub mod id;
pub mod model;
pub mod query;
pub mod registry;
