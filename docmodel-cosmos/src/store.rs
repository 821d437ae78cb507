//! Cosmos DB backend over the REST API.
//!
//! Every request is signed with the account master key. Point operations pass the document id as
//! the partition key; feeds and queries follow `x-ms-continuation` until the last page, or until
//! [`QueryOptions::limit`] rows have arrived.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use docmodel_core::{
    backend::{CollectionPath, Connector, StoreBackend},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{QueryOptions, QuerySpec},
};

use crate::{
    auth::{MasterKey, rfc1123},
    connection_string::ConnectionString,
};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2018-12-31";

const HEADER_DATE: &str = "x-ms-date";
const HEADER_VERSION: &str = "x-ms-version";
const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const HEADER_IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
const HEADER_IS_QUERY: &str = "x-ms-documentdb-isquery";
const HEADER_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
const HEADER_MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
const HEADER_CONTINUATION: &str = "x-ms-continuation";

#[derive(Deserialize)]
struct FeedPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

#[derive(Deserialize)]
struct CollectionResource {
    #[serde(rename = "partitionKey")]
    partition_key: Option<PartitionKeyDefinition>,
}

#[derive(Deserialize)]
struct PartitionKeyDefinition {
    #[serde(default)]
    paths: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// A connection to one Cosmos DB account.
#[derive(Debug, Clone)]
pub struct CosmosStore {
    client: reqwest::Client,
    endpoint: Url,
    key: MasterKey,
}

impl CosmosStore {
    pub fn new(client: reqwest::Client, connection_string: ConnectionString) -> Self {
        Self {
            client,
            endpoint: connection_string.endpoint,
            key: connection_string.key,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> DocumentStoreResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DocumentStoreError::Configuration(format!(
                    "AccountEndpoint {} cannot hold a path",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn docs_url(&self, path: &CollectionPath) -> DocumentStoreResult<Url> {
        self.url(&["dbs", &path.database, "colls", &path.collection, "docs"])
    }

    fn doc_url(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Url> {
        self.url(&["dbs", &path.database, "colls", &path.collection, "docs", id])
    }

    /// Starts a signed request.
    fn request(&self, method: Method, resource_type: &str, resource_link: &str, url: Url) -> RequestBuilder {
        let date = rfc1123(Utc::now());
        let authorization = self
            .key
            .authorization(method.as_str(), resource_type, resource_link, &date);

        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(HEADER_DATE, date)
            .header(HEADER_VERSION, API_VERSION)
    }

    async fn send(
        &self,
        operation: &'static str,
        target: &str,
        request: RequestBuilder,
    ) -> DocumentStoreResult<Response> {
        request.send().await.map_err(|err| {
            warn!(operation, target, error = %err, "request to the store failed");
            DocumentStoreError::store(operation, target, err.status().map(|s| s.as_u16()), err.to_string())
        })
    }

    async fn feed(
        &self,
        operation: &'static str,
        path: &CollectionPath,
        query: Option<&QuerySpec>,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Value>> {
        let url = self.docs_url(path)?;
        let link = path.resource_link();
        let body = query.map(serde_json::to_vec).transpose()?;

        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let method = if body.is_some() { Method::POST } else { Method::GET };
            let mut request = self.request(method, "docs", &link, url.clone());

            if let Some(body) = &body {
                request = request
                    .header(HEADER_IS_QUERY, "True")
                    .header(HEADER_CROSS_PARTITION, "True")
                    .header(CONTENT_TYPE, "application/query+json")
                    .body(body.clone());
            }
            if let Some(max_item_count) = options.max_item_count {
                request = request.header(HEADER_MAX_ITEM_COUNT, max_item_count.to_string());
            }
            if let Some(token) = &continuation {
                request = request.header(HEADER_CONTINUATION, token.as_str());
            }

            let response = self.send(operation, &link, request).await?;
            if !response.status().is_success() {
                return Err(failure(operation, &link, response).await);
            }

            continuation = response
                .headers()
                .get(HEADER_CONTINUATION)
                .and_then(|value| value.to_str().ok())
                .filter(|token| !token.is_empty())
                .map(str::to_string);

            let page = decode::<FeedPage>(response).await?;
            debug!(collection = %path, rows = page.documents.len(), more = continuation.is_some(), "received feed page");
            items.extend(page.documents);

            if options.is_satisfied(items.len()) {
                items.truncate(options.limit.unwrap_or(items.len()));
                return Ok(items);
            }
            if continuation.is_none() {
                return Ok(items);
            }
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> DocumentStoreResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|err| DocumentStoreError::Serialization(err.to_string()))
}

/// Turns an unsuccessful response into a [`DocumentStoreError::Store`], keeping the store's
/// message.
async fn failure(operation: &'static str, target: &str, response: Response) -> DocumentStoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or(text);

    warn!(operation, target, status = status.as_u16(), "store rejected the request");
    DocumentStoreError::store(operation, target, Some(status.as_u16()), message)
}

fn partition_key_header(id: &str) -> DocumentStoreResult<String> {
    Ok(serde_json::to_string(&[id])?)
}

fn document_id(document: &Value) -> DocumentStoreResult<&str> {
    document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| DocumentStoreError::InvalidDocument("document has no string id".to_string()))
}

#[async_trait]
impl StoreBackend for CosmosStore {
    async fn read_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>> {
        let link = path.document_link(id);
        let request = self
            .request(Method::GET, "docs", &link, self.doc_url(path, id)?)
            .header(HEADER_PARTITION_KEY, partition_key_header(id)?);

        let response = self.send("read", &link, request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(decode(response).await?)),
            _ => Err(failure("read", &link, response).await),
        }
    }

    async fn read_all(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<Value>> {
        self.feed("read_all", path, None, QueryOptions::default()).await
    }

    async fn create_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value> {
        let id = document_id(&document)?.to_string();
        let link = path.resource_link();
        let request = self
            .request(Method::POST, "docs", &link, self.docs_url(path)?)
            .header(HEADER_PARTITION_KEY, partition_key_header(&id)?)
            .json(&document);

        let response = self.send("create", &link, request).await?;
        match response.status() {
            StatusCode::CONFLICT => Err(DocumentStoreError::Conflict {
                id,
                collection: path.collection.clone(),
            }),
            status if status.is_success() => decode(response).await,
            _ => Err(failure("create", &link, response).await),
        }
    }

    async fn upsert_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value> {
        let id = document_id(&document)?;
        let link = path.resource_link();
        let request = self
            .request(Method::POST, "docs", &link, self.docs_url(path)?)
            .header(HEADER_PARTITION_KEY, partition_key_header(id)?)
            .header(HEADER_IS_UPSERT, "True")
            .json(&document);

        let response = self.send("upsert", &link, request).await?;
        if response.status().is_success() {
            decode(response).await
        } else {
            Err(failure("upsert", &link, response).await)
        }
    }

    async fn replace_item(
        &self,
        path: &CollectionPath,
        id: &str,
        document: Value,
    ) -> DocumentStoreResult<Value> {
        let link = path.document_link(id);
        let request = self
            .request(Method::PUT, "docs", &link, self.doc_url(path, id)?)
            .header(HEADER_PARTITION_KEY, partition_key_header(id)?)
            .json(&document);

        let response = self.send("replace", &link, request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(DocumentStoreError::NotFound {
                id: id.to_string(),
                collection: path.collection.clone(),
            }),
            status if status.is_success() => decode(response).await,
            _ => Err(failure("replace", &link, response).await),
        }
    }

    /// Reads the document first so the prior value can be returned; the delete itself has no
    /// response body.
    async fn delete_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>> {
        let Some(existing) = self.read_item(path, id).await? else {
            return Ok(None);
        };

        let link = path.document_link(id);
        let request = self
            .request(Method::DELETE, "docs", &link, self.doc_url(path, id)?)
            .header(HEADER_PARTITION_KEY, partition_key_header(id)?);

        let response = self.send("delete", &link, request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(existing)),
            _ => Err(failure("delete", &link, response).await),
        }
    }

    async fn query_items(
        &self,
        path: &CollectionPath,
        query: QuerySpec,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Value>> {
        self.feed("query", path, Some(&query), options).await
    }

    async fn partition_key_paths(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<String>> {
        let link = path.resource_link();
        let url = self.url(&["dbs", &path.database, "colls", &path.collection])?;
        let request = self.request(Method::GET, "colls", &link, url);

        let response = self.send("read_collection", &link, request).await?;
        if !response.status().is_success() {
            return Err(failure("read_collection", &link, response).await);
        }

        Ok(decode::<CollectionResource>(response)
            .await?
            .partition_key
            .map(|definition| definition.paths)
            .unwrap_or_default())
    }
}

/// Opens [`CosmosStore`] connections from connection strings.
///
/// Connecting only parses the connection string; no request is made until the first operation.
#[derive(Debug, Clone, Default)]
pub struct CosmosConnector {
    client: reqwest::Client,
}

impl CosmosConnector {
    /// Uses `client` for every connection, e.g. one configured with timeouts or a proxy.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Connector for CosmosConnector {
    type Backend = CosmosStore;

    fn connect(&self, connection_string: &str) -> DocumentStoreResult<CosmosStore> {
        let parsed = ConnectionString::parse(connection_string)?;
        debug!(endpoint = %parsed.endpoint, "connecting to Cosmos DB");

        Ok(CosmosStore::new(self.client.clone(), parsed))
    }
}
