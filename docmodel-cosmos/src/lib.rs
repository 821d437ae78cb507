//! Cosmos DB backend for docmodel.
//!
//! This crate implements `StoreBackend` against the Cosmos DB REST API using `reqwest`. Requests
//! are signed with the account master key from the connection string; no SDK is involved.
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, cosmos::CosmosConnector};
//!
//! // Reads COSMOS_CONNECTION_STRING, e.g.
//! // AccountEndpoint=https://myaccount.documents.azure.com:443/;AccountKey=...;
//! let db = Registry::new("app").build(CosmosConnector::default(), |builder| Models {
//!     users: builder.create_model("users"),
//! })?;
//!
//! db.models.users.ensure_partition_key().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_cosmos;

pub mod auth;
pub mod connection_string;
pub mod store;

pub use connection_string::ConnectionString;
pub use store::{CosmosConnector, CosmosStore};
