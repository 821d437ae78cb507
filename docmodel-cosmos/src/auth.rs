//! Master-key request signing.
//!
//! Every request carries an `authorization` header holding an HMAC-SHA256 signature over the
//! verb, resource type, resource link and request date, keyed with the account's master key.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use docmodel_core::error::{DocumentStoreError, DocumentStoreResult};

/// Formats an instant the way the `x-ms-date` header expects, e.g.
/// `Thu, 27 Apr 2017 00:51:12 GMT`.
pub fn rfc1123(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The account master key, ready to sign requests.
#[derive(Clone)]
pub struct MasterKey {
    mac: Hmac<Sha256>,
}

impl MasterKey {
    /// Decodes a base64 account key.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if the key is not valid base64.
    pub fn from_base64(key: &str) -> DocumentStoreResult<Self> {
        let bytes = STANDARD.decode(key.trim()).map_err(|err| {
            DocumentStoreError::Configuration(format!("AccountKey is not valid base64: {err}"))
        })?;

        let mac = Hmac::<Sha256>::new_from_slice(&bytes).map_err(|err| {
            DocumentStoreError::Configuration(format!("AccountKey cannot be used for signing: {err}"))
        })?;

        Ok(Self { mac })
    }

    /// Builds the URL-encoded `authorization` header value for one request.
    ///
    /// `verb`, `resource_type` and `date` are lower-cased before signing; `resource_link` is
    /// signed as given.
    pub fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase(),
        );

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let token = format!("type=master&ver=1.0&sig={signature}");
        url::form_urlencoded::byte_serialize(token.as_bytes()).collect()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}
