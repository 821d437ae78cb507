//! Connection string resolution.
//!
//! A connection comes either from an explicit connection string or from a named environment
//! variable (`COSMOS_CONNECTION_STRING` unless configured otherwise). Variables are read through
//! an [`EnvSource`], so callers can inject their own configuration instead of the process
//! environment.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env, fmt};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Environment variable consulted when no other name is configured.
pub const DEFAULT_CONNECTION_STRING_ENV: &str = "COSMOS_CONNECTION_STRING";

/// Source of named configuration values.
pub trait EnvSource: Send + Sync {
    /// Returns the value of `name`, or `None` if it is unset or not valid UTF-8.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Where the connection string comes from.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Explicit connection string, used verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Name of the variable holding the connection string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string_env: Option<String>,
}

impl ConnectionConfig {
    /// The variable name consulted when no explicit connection string is set.
    ///
    /// This is also the connection setting named in trigger bindings.
    pub fn setting(&self) -> &str {
        self.connection_string_env
            .as_deref()
            .unwrap_or(DEFAULT_CONNECTION_STRING_ENV)
    }

    /// Resolves the connection string.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] when the explicit connection string is empty,
    /// or when no explicit string is set and the variable is missing.
    pub fn resolve(&self, env: &dyn EnvSource) -> DocumentStoreResult<String> {
        if let Some(connection_string) = &self.connection_string {
            if connection_string.trim().is_empty() {
                return Err(DocumentStoreError::Configuration(
                    "the connection_string option is set but empty".to_string(),
                ));
            }
            return Ok(connection_string.clone());
        }

        let setting = self.setting();
        env.var(setting).ok_or_else(|| {
            DocumentStoreError::Configuration(format!(
                "missing environment variable {setting} holding the connection string"
            ))
        })
    }
}

// The connection string embeds the account key.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("connection_string_env", &self.connection_string_env)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(name: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(name.to_string(), value.to_string())])
    }

    #[test]
    fn explicit_connection_string_wins() {
        let config = ConnectionConfig {
            connection_string: Some("AccountEndpoint=a;AccountKey=b;".into()),
            connection_string_env: None,
        };
        let env = env_with(DEFAULT_CONNECTION_STRING_ENV, "from-env");

        assert_eq!(config.resolve(&env).unwrap(), "AccountEndpoint=a;AccountKey=b;");
    }

    #[test]
    fn empty_explicit_connection_string_names_the_option() {
        let config = ConnectionConfig {
            connection_string: Some(String::new()),
            connection_string_env: None,
        };

        let err = config.resolve(&HashMap::<String, String>::new()).unwrap_err();
        assert!(matches!(&err, DocumentStoreError::Configuration(msg) if msg.contains("connection_string")));
    }

    #[test]
    fn reads_default_variable() {
        let env = env_with(DEFAULT_CONNECTION_STRING_ENV, "conn");

        assert_eq!(ConnectionConfig::default().resolve(&env).unwrap(), "conn");
    }

    #[test]
    fn reads_custom_variable() {
        let config = ConnectionConfig {
            connection_string: None,
            connection_string_env: Some("ORDERS_DB".into()),
        };
        let env = env_with("ORDERS_DB", "conn");

        assert_eq!(config.setting(), "ORDERS_DB");
        assert_eq!(config.resolve(&env).unwrap(), "conn");
    }

    #[test]
    fn missing_variable_names_the_variable() {
        let err = ConnectionConfig::default()
            .resolve(&HashMap::<String, String>::new())
            .unwrap_err();

        assert!(matches!(&err, DocumentStoreError::Configuration(msg) if msg.contains(DEFAULT_CONNECTION_STRING_ENV)));
    }

    #[test]
    fn debug_redacts_connection_string() {
        let config = ConnectionConfig {
            connection_string: Some("AccountKey=secret".into()),
            connection_string_env: None,
        };

        assert!(!format!("{config:?}").contains("secret"));
    }
}
