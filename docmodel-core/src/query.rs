//! Parameterized queries in the store's SQL dialect.
//!
//! A [`QuerySpec`] pairs a query template with named parameters. Wherever a query is accepted, a
//! plain string works too and is treated as a spec without parameters.
//!
//! ```ignore
//! use docmodel::query::QuerySpec;
//!
//! let spec = QuerySpec::new("SELECT * FROM c WHERE c.age >= @age").param("@age", 18);
//! let adults = users.query::<Record<User>>(spec).await?;
//! ```
//!
//! Caller values are always bound as parameters and never spliced into the template text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DocumentStoreResult;

/// Template used by [`Model::find_many`](crate::model::Model::find_many).
pub const FIND_MANY_QUERY: &str = "SELECT * FROM C WHERE ARRAY_CONTAINS(@ids, C.id)";
/// Template used by [`Model::find_many_by`](crate::model::Model::find_many_by).
pub const FIND_MANY_BY_QUERY: &str = "SELECT * FROM C WHERE C[@key] = @value";
/// Template used by [`Model::find_by`](crate::model::Model::find_by).
///
/// The one-row cap is a [`QueryOptions::limit`] rather than `OFFSET`/`LIMIT`, which the gateway
/// cannot run across partitions.
pub const FIND_BY_QUERY: &str = FIND_MANY_BY_QUERY;

/// A named value bound into a query template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    /// Parameter name including the leading `@`.
    pub name: String,
    pub value: Value,
}

/// A query template plus its parameters, serialized exactly as the store's query body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
}

impl QuerySpec {
    /// Creates a spec with no parameters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
        }
    }

    /// Binds a parameter. A missing leading `@` is added to the name.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.push(QueryParameter {
            name: normalize_name(name.into()),
            value: value.into(),
        });
        self
    }

    /// Binds any serializable value as a parameter.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be represented as JSON.
    pub fn try_param(
        self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> DocumentStoreResult<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.param(name, value))
    }

    /// Looks up a bound parameter by name, with or without the leading `@`.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        let name = normalize_name(name.to_string());
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub(crate) fn find_many(ids: &[String]) -> Self {
        QuerySpec::new(FIND_MANY_QUERY).param("@ids", ids.to_vec())
    }

    pub(crate) fn find_by(field: &str, value: Value) -> Self {
        QuerySpec::new(FIND_BY_QUERY)
            .param("@key", field)
            .param("@value", value)
    }

    pub(crate) fn find_many_by(field: &str, value: Value) -> Self {
        QuerySpec::new(FIND_MANY_BY_QUERY)
            .param("@key", field)
            .param("@value", value)
    }
}

impl From<&str> for QuerySpec {
    fn from(query: &str) -> Self {
        QuerySpec::new(query)
    }
}

impl From<String> for QuerySpec {
    fn from(query: String) -> Self {
        QuerySpec::new(query)
    }
}

fn normalize_name(name: String) -> String {
    if name.starts_with('@') {
        name
    } else {
        format!("@{name}")
    }
}

/// Options passed through to the store when running a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Maximum number of items per page fetched from the store.
    pub max_item_count: Option<u32>,
    /// Stop reading once this many rows have arrived and return at most that many.
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_item_count(mut self, max_item_count: u32) -> Self {
        self.max_item_count = Some(max_item_count);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `rows` already satisfies the limit.
    pub fn is_satisfied(&self, rows: usize) -> bool {
        self.limit.is_some_and(|limit| rows >= limit)
    }
}
