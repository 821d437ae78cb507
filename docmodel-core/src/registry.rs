//! Registry: one connection, many models.
//!
//! [`Registry::build`] resolves the connection string, opens exactly one connection through the
//! caller's [`Connector`], then hands a [`ModelBuilder`] to the caller's factory function. Every
//! model the factory creates shares that one connection.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! struct Models {
//!     users: Model<User>,
//!     posts: Model<Post>,
//! }
//!
//! let db = Registry::new("blog")
//!     .with_connection_string_env("BLOG_DB")
//!     .build(CosmosConnector::default(), |builder| Models {
//!         users: builder.create_model("users"),
//!         posts: builder.create_model_with("posts", ModelOverrides::new().generate_id(false)),
//!     })?;
//!
//! let user = db.models.users.create(User { name: "Alice".into() }).await?;
//! ```

use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::info;

use crate::{
    backend::{CollectionPath, Connector, StoreBackend},
    connection::{ConnectionConfig, EnvSource, ProcessEnv},
    document::Document,
    error::DocumentStoreResult,
    fields::{AutoFieldPolicy, ModelOverrides},
    model::Model,
};

/// Connection-level configuration shared by every model of a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Name of the database every model's collection lives in.
    pub database: String,
    pub connection: ConnectionConfig,
    pub auto_fields: AutoFieldPolicy,
}

/// Builds a connection and the models bound to it.
pub struct Registry {
    options: RegistryOptions,
    env: Box<dyn EnvSource>,
}

impl Registry {
    /// Creates a registry for `database` reading the connection string from the default variable.
    pub fn new(database: impl Into<String>) -> Self {
        Self::from_options(RegistryOptions {
            database: database.into(),
            ..RegistryOptions::default()
        })
    }

    pub fn from_options(options: RegistryOptions) -> Self {
        Self {
            options,
            env: Box::new(ProcessEnv),
        }
    }

    /// Uses an explicit connection string instead of an environment variable.
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.options.connection.connection_string = Some(connection_string.into());
        self
    }

    /// Reads the connection string from the variable `name`.
    pub fn with_connection_string_env(mut self, name: impl Into<String>) -> Self {
        self.options.connection.connection_string_env = Some(name.into());
        self
    }

    /// Sets the auto-field policy inherited by every model.
    pub fn with_auto_fields(mut self, policy: AutoFieldPolicy) -> Self {
        self.options.auto_fields = policy;
        self
    }

    /// Reads variables from `env` instead of the process environment.
    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Resolves the connection, opens it once and runs `factory` once with a builder bound to it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`](crate::error::DocumentStoreError) when no
    /// connection string can be resolved or the connector rejects it. In that case neither the
    /// connection nor any model is constructed.
    pub fn build<C, F, M>(self, connector: C, factory: F) -> DocumentStoreResult<Connected<C::Backend, M>>
    where
        C: Connector,
        F: FnOnce(&ModelBuilder) -> M,
    {
        let connection_string = self.options.connection.resolve(self.env.as_ref())?;
        let connection = Arc::new(connector.connect(&connection_string)?);

        info!(
            database = %self.options.database,
            setting = self.options.connection.setting(),
            "opened document store connection"
        );

        let shared: Arc<dyn StoreBackend> = connection.clone();
        let builder = ModelBuilder {
            connection: shared,
            database: self.options.database.clone(),
            policy: self.options.auto_fields,
            connection_setting: Arc::from(self.options.connection.setting()),
        };

        let models = factory(&builder);

        Ok(Connected { connection, models })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The result of [`Registry::build`]: the one connection plus whatever the factory returned.
#[derive(Debug)]
pub struct Connected<B, M> {
    pub connection: Arc<B>,
    pub models: M,
}

/// Creates models bound to the registry's connection.
#[derive(Clone)]
pub struct ModelBuilder {
    connection: Arc<dyn StoreBackend>,
    database: String,
    policy: AutoFieldPolicy,
    connection_setting: Arc<str>,
}

impl ModelBuilder {
    /// Creates a model for `collection` using the registry's auto-field policy.
    pub fn create_model<T: Document>(&self, collection: &str) -> Model<T> {
        self.create_model_with(collection, ModelOverrides::default())
    }

    /// Creates a model for `collection`, applying `overrides` on top of the registry's policy.
    pub fn create_model_with<T: Document>(
        &self,
        collection: &str,
        overrides: ModelOverrides,
    ) -> Model<T> {
        Model::new(
            Arc::clone(&self.connection),
            CollectionPath::new(self.database.clone(), collection),
            self.policy.merge(&overrides),
            Arc::clone(&self.connection_setting),
        )
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn policy(&self) -> AutoFieldPolicy {
        self.policy
    }
}

impl fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("database", &self.database)
            .field("policy", &self.policy)
            .field("connection_setting", &self.connection_setting)
            .finish_non_exhaustive()
    }
}
