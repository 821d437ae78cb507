//! Layered registry configuration.
//!
//! [`Settings`] are read with `figment` from, in increasing priority:
//!
//! 1. built-in defaults (both auto-field switches on, connection string from
//!    `COSMOS_CONNECTION_STRING`),
//! 2. an optional TOML file,
//! 3. `DOCMODEL_`-prefixed environment variables, with `__` separating nested keys.
//!
//! ```toml
//! database = "blog"
//!
//! [connection]
//! connection_string_env = "BLOG_DB"
//!
//! [auto_fields]
//! generate_timestamps = false
//! ```
//!
//! The same settings from the environment:
//!
//! ```text
//! DOCMODEL_DATABASE=blog
//! DOCMODEL_CONNECTION__CONNECTION_STRING_ENV=BLOG_DB
//! DOCMODEL_AUTO_FIELDS__GENERATE_TIMESTAMPS=false
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use docmodel_core::{
    connection::ConnectionConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    fields::AutoFieldPolicy,
    registry::{Registry, RegistryOptions},
};

/// Prefix of the environment variables read by [`Settings::figment`].
pub const ENV_PREFIX: &str = "DOCMODEL_";

/// Registry configuration managed by Figment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database every model's collection lives in. Required.
    /// Env: `DOCMODEL_DATABASE`.
    pub database: String,

    /// Where the connection string comes from.
    /// Env: `DOCMODEL_CONNECTION__CONNECTION_STRING`, `DOCMODEL_CONNECTION__CONNECTION_STRING_ENV`.
    pub connection: ConnectionConfig,

    /// Registry-wide auto-field policy.
    /// Env: `DOCMODEL_AUTO_FIELDS__GENERATE_ID`, `DOCMODEL_AUTO_FIELDS__GENERATE_TIMESTAMPS`.
    pub auto_fields: AutoFieldPolicy,
}

impl Settings {
    /// Builds a Figment that merges defaults, the TOML file at `path` (if given and present) and
    /// the environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        let figment = match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        };

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates settings from defaults, the TOML file at `path` and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if a source cannot be parsed or no database
    /// is configured.
    pub fn load(path: Option<&Path>) -> DocumentStoreResult<Self> {
        Self::from_figment(&Self::figment(path))
    }

    /// Extracts and validates settings from any figment.
    pub fn from_figment(figment: &Figment) -> DocumentStoreResult<Self> {
        let settings: Self = figment
            .extract()
            .map_err(|err| DocumentStoreError::Configuration(err.to_string()))?;

        if settings.database.trim().is_empty() {
            return Err(DocumentStoreError::Configuration(
                "database must be set and non-empty".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Creates a registry from these settings.
    pub fn registry(&self) -> Registry {
        Registry::from_options(RegistryOptions {
            database: self.database.clone(),
            connection: self.connection.clone(),
            auto_fields: self.auto_fields,
        })
    }
}
