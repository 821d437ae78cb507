//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait. It
//! is meant for development and tests, and behaves like the hosted store where the models can
//! observe it.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **System properties** - `_etag` and `_ts` are stamped on every write
//! - **Query support** - A subset of the store's SQL dialect, including parameters, `COUNT`
//!   and `OFFSET`/`LIMIT`
//! - **Shared connections** - [`InMemoryConnector`] hands every registry a handle to the same
//!   data
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryConnector};
//!
//! let connector = InMemoryConnector::default();
//! let db = Registry::new("app")
//!     .with_connection_string("memory")
//!     .build(&connector, |builder| builder.create_model::<User>("users"))?;
//!
//! db.models.create(User { name: "Alice".into() }).await?;
//! assert_eq!(connector.connections(), 1);
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

mod evaluator;
pub mod sql;
pub mod store;

pub use store::{InMemoryConnector, InMemoryStore};
