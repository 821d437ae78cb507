//! Account connection strings.
//!
//! A connection string is a `;`-separated list of `Name=Value` pairs. The endpoint and master key
//! are required; other pairs are ignored.
//!
//! ```text
//! AccountEndpoint=https://myaccount.documents.azure.com:443/;AccountKey=base64key==;
//! ```

use std::str::FromStr;
use url::Url;

use docmodel_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::auth::MasterKey;

/// A parsed connection string.
#[derive(Debug, Clone)]
pub struct ConnectionString {
    pub endpoint: Url,
    pub key: MasterKey,
}

impl ConnectionString {
    /// Parses a connection string.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if `AccountEndpoint` or `AccountKey` is
    /// missing or malformed.
    pub fn parse(input: &str) -> DocumentStoreResult<Self> {
        let mut endpoint = None;
        let mut key = None;

        for pair in input.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let Some((name, value)) = pair.split_once('=') else {
                return Err(DocumentStoreError::Configuration(format!(
                    "malformed connection string segment {:?}",
                    redact(pair)
                )));
            };

            if name.trim().eq_ignore_ascii_case("AccountEndpoint") {
                endpoint = Some(value.trim());
            } else if name.trim().eq_ignore_ascii_case("AccountKey") {
                key = Some(value.trim());
            }
        }

        let endpoint = endpoint.ok_or_else(|| missing("AccountEndpoint"))?;
        let key = key.ok_or_else(|| missing("AccountKey"))?;

        let endpoint = Url::parse(endpoint).map_err(|err| {
            DocumentStoreError::Configuration(format!("AccountEndpoint is not a valid URL: {err}"))
        })?;
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DocumentStoreError::Configuration(format!(
                "AccountEndpoint must be an http(s) URL, got {endpoint}"
            )));
        }

        Ok(Self {
            endpoint,
            key: MasterKey::from_base64(key)?,
        })
    }
}

impl FromStr for ConnectionString {
    type Err = DocumentStoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

fn missing(name: &str) -> DocumentStoreError {
    DocumentStoreError::Configuration(format!("connection string is missing {name}"))
}

// Segments may hold the key.
fn redact(segment: &str) -> String {
    segment.chars().take(16).collect::<String>() + "..."
}
