mod common;

use async_trait::async_trait;
use docmodel::{
    memory::{InMemoryConnector, InMemoryStore},
    prelude::*,
};
use serde_json::{Value, json};
use std::{collections::HashSet, time::Duration};

use common::{Account, AccountField, User, UserField, connect};

#[tokio::test]
async fn generated_ids_are_unique_and_sortable() {
    let db = connect(&InMemoryConnector::default());

    let mut ids = Vec::new();
    for i in 0..25 {
        let user = db.models.users.create(User::new(&format!("user-{i}"), "dev", i)).await.unwrap();
        assert!(!user.id.is_empty());
        ids.push(user.id);
    }

    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(sorted, ids);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
}

#[tokio::test]
async fn create_then_find_is_deep_equal() {
    let db = connect(&InMemoryConnector::default());

    let created = db.models.users.create(User::new("Alice", "admin", 30)).await.unwrap();
    let found = db.models.users.find(&created.id).await.unwrap();

    assert_eq!(found, Some(created.clone()));
    assert!(created.created_at.is_some());
    assert_eq!(created.created_at, created.updated_at);
    assert!(created.etag.is_some());
    assert_eq!(created.display_name, "Alice");
}

#[tokio::test]
async fn create_ignores_caller_id_when_generating() {
    let db = connect(&InMemoryConnector::default());

    let created = db
        .models
        .users
        .create(NewDocument::new(User::new("Alice", "admin", 30)).with_id("mine"))
        .await
        .unwrap();

    assert_ne!(created.id, "mine");
    assert_eq!(db.models.users.find("mine").await.unwrap(), None);
}

#[tokio::test]
async fn find_missing_is_none() {
    let db = connect(&InMemoryConnector::default());

    assert_eq!(db.models.users.find("nope").await.unwrap(), None);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let db = connect(&InMemoryConnector::default());
    let created = db.models.users.create(User::new("Alice", "admin", 30)).await.unwrap();

    let deleted = db.models.users.delete(&created.id).await.unwrap();
    assert_eq!(deleted, Some(created.clone()));
    assert_eq!(db.models.users.find(&created.id).await.unwrap(), None);
    assert_eq!(db.models.users.delete(&created.id).await.unwrap(), None);
}

#[tokio::test]
async fn replace_missing_is_not_found() {
    let db = connect(&InMemoryConnector::default());

    let err = db
        .models
        .users
        .replace("ghost", User::new("Nobody", "dev", 0))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DocumentStoreError::NotFound { ref id, ref collection } if id == "ghost" && collection == "users"
    ));
}

#[tokio::test]
async fn replace_keeps_created_at_and_advances_updated_at() {
    let db = connect(&InMemoryConnector::default());
    let created = db.models.users.create(User::new("Alice", "admin", 30)).await.unwrap();

    let mut previous = created.clone();
    for age in 31..34 {
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut edited = db.models.users.find(&created.id).await.unwrap().unwrap();
        edited.age = age;
        let replaced = db.models.users.replace(&created.id, edited).await.unwrap();

        assert_eq!(replaced.id, created.id);
        assert_eq!(replaced.created_at, created.created_at);
        assert!(replaced.updated_at > previous.updated_at);
        assert_eq!(replaced.age, age);
        previous = replaced;
    }

    assert_eq!(db.models.users.find(&created.id).await.unwrap(), Some(previous));
}

#[tokio::test]
async fn replace_with_bare_payload_keeps_stored_created_at() {
    let db = connect(&InMemoryConnector::default());
    let created = db.models.users.create(User::new("Alice", "admin", 30)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let replaced = db
        .models
        .users
        .replace(&created.id, User::new("Alice", "owner", 30))
        .await
        .unwrap();

    assert!(created.created_at.is_some());
    assert_eq!(replaced.created_at, created.created_at);
    assert!(replaced.updated_at > created.updated_at);
    assert_eq!(replaced.role, "owner");

    let stored = db.models.users.find(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.created_at, created.created_at);
}

#[tokio::test]
async fn replace_ignores_created_at_on_the_input_record() {
    let db = connect(&InMemoryConnector::default());
    let created = db.models.users.create(User::new("Alice", "admin", 30)).await.unwrap();

    let mut edited = created.clone();
    edited.created_at = Some("1999-01-01T00:00:00Z".parse().unwrap());
    let replaced = db.models.users.replace(&created.id, edited).await.unwrap();

    assert_eq!(replaced.created_at, created.created_at);
}

#[tokio::test]
async fn find_many_by_agrees_with_all() {
    let db = connect(&InMemoryConnector::default());
    for (name, role) in [("a", "admin"), ("b", "dev"), ("c", "admin"), ("d", "ops"), ("e", "admin")] {
        db.models.users.create(User::new(name, role, 20)).await.unwrap();
    }

    let by_field = db
        .models
        .users
        .find_many_by(UserField::Role, "admin")
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect::<HashSet<_>>();

    let by_scan = db
        .models
        .users
        .all()
        .await
        .unwrap()
        .into_iter()
        .filter(|user| user.role == "admin")
        .map(|user| user.id)
        .collect::<HashSet<_>>();

    assert_eq!(by_field.len(), 3);
    assert_eq!(by_field, by_scan);
}

#[tokio::test]
async fn find_by_returns_first_match_or_none() {
    let db = connect(&InMemoryConnector::default());
    let alice = db.models.users.create(User::new("Alice", "admin", 30)).await.unwrap();
    db.models.users.create(User::new("Bob", "dev", 25)).await.unwrap();

    let found = db.models.users.find_by(UserField::DisplayName, "Alice").await.unwrap();
    assert_eq!(found, Some(alice));

    let by_number = db.models.users.find_by(UserField::Age, 25).await.unwrap();
    assert_eq!(by_number.map(|user| user.display_name.clone()), Some("Bob".to_string()));

    assert_eq!(db.models.users.find_by(UserField::Role, "ops").await.unwrap(), None);

    db.models.users.create(User::new("Carol", "admin", 41)).await.unwrap();
    let first_admin = db.models.users.find_by(UserField::Role, "admin").await.unwrap();
    assert_eq!(first_admin.map(|user| user.display_name.clone()), Some("Alice".to_string()));
}

#[tokio::test]
async fn find_by_uses_serialized_field_names() {
    let db = connect(&InMemoryConnector::default());
    db.models
        .accounts
        .create(NewDocument::new(Account { name: "Acme".into(), plan: "pro".into() }).with_id("acme"))
        .await
        .unwrap();

    assert_eq!(AccountField::Plan.name(), "tier");

    let found = db.models.accounts.find_by(AccountField::Plan, "pro").await.unwrap();
    assert_eq!(found.map(|account| account.id), Some("acme".to_string()));
}

#[tokio::test]
async fn find_many_omits_missing_ids() {
    let db = connect(&InMemoryConnector::default());
    let a = db.models.users.create(User::new("a", "dev", 1)).await.unwrap();
    let b = db.models.users.create(User::new("b", "dev", 2)).await.unwrap();
    db.models.users.create(User::new("c", "dev", 3)).await.unwrap();

    let found = db
        .models
        .users
        .find_many([a.id.as_str(), "missing", b.id.as_str()])
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect::<HashSet<_>>();

    assert_eq!(found, HashSet::from([a.id, b.id]));
    assert!(db.models.users.find_many(Vec::<String>::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn caller_supplied_id_with_generated_timestamps() {
    let db = connect(&InMemoryConnector::default());

    let created = db
        .models
        .accounts
        .create(NewDocument::new(Account { name: "A".into(), plan: "free".into() }).with_id("u1"))
        .await
        .unwrap();

    assert_eq!(created.id, "u1");
    assert_eq!(created.name, "A");
    assert!(created.created_at.is_some());
    assert_eq!(created.created_at, created.updated_at);

    let stored = db
        .connection
        .read_item(db.models.accounts.path(), "u1")
        .await
        .unwrap()
        .unwrap();
    let created_at = stored["createdAt"].as_str().unwrap();
    assert_eq!(stored["updatedAt"], Value::from(created_at));
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
}

#[tokio::test]
async fn caller_supplied_id_is_required() {
    let db = connect(&InMemoryConnector::default());

    let err = db
        .models
        .accounts
        .create(Account { name: "A".into(), plan: "free".into() })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
}

#[tokio::test]
async fn create_conflicts_on_existing_id() {
    let db = connect(&InMemoryConnector::default());
    let account = || NewDocument::new(Account { name: "A".into(), plan: "free".into() }).with_id("dup");

    db.models.accounts.create(account()).await.unwrap();
    let err = db.models.accounts.create(account()).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::Conflict { ref id, .. } if id == "dup"));
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn manual_timestamps_are_kept() {
    let connector = InMemoryConnector::default();
    let db = Registry::new(common::DATABASE)
        .with_connection_string("memory")
        .with_auto_fields(AutoFieldPolicy::manual())
        .build(&connector, |builder| builder.create_model::<User>("users"))
        .unwrap();

    let created_at = "2020-01-01T00:00:00Z".parse().unwrap();
    let created = db
        .models
        .create(
            NewDocument::new(User::new("Alice", "admin", 30))
                .with_id("alice")
                .with_created_at(created_at),
        )
        .await
        .unwrap();

    assert_eq!(created.created_at, Some(created_at));
    assert_eq!(created.updated_at, None);

    let replaced = db.models.replace("alice", created).await.unwrap();
    assert_eq!(replaced.created_at, Some(created_at));
    assert_eq!(replaced.updated_at, None);
}

#[tokio::test]
async fn upsert_writes_records_as_given() {
    let db = connect(&InMemoryConnector::default());

    let inserted = db
        .models
        .users
        .upsert(Record::new("fresh", User::new("Fresh", "dev", 1)))
        .await
        .unwrap();
    assert_eq!(inserted.id, "fresh");
    assert_eq!(inserted.created_at, None);
    assert_eq!(inserted.updated_at, None);

    let created = db.models.users.create(User::new("Alice", "admin", 30)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut edited = created.clone();
    edited.role = "owner".to_string();
    let upserted = db.models.users.upsert(edited).await.unwrap();

    assert_eq!(upserted.role, "owner");
    assert_eq!(upserted.created_at, created.created_at);
    assert_eq!(upserted.updated_at, created.updated_at);
    assert_ne!(upserted.etag, created.etag);
}

#[tokio::test]
async fn ensure_partition_key_rejects_other_keys() {
    let connector = InMemoryConnector::default();
    let tenants = CollectionPath::new(common::DATABASE, "tenants");
    connector.store().create_collection(&tenants, &["/tenantId"]).await;

    let db = Registry::new(common::DATABASE)
        .with_connection_string("memory")
        .build(&connector, |builder| {
            (builder.create_model::<User>("users"), builder.create_model::<User>("tenants"))
        })
        .unwrap();
    let (users, tenants) = db.models;

    users.ensure_partition_key().await.unwrap();

    let err = tenants.ensure_partition_key().await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Configuration(msg) if msg.contains("/tenantId")));
}

#[tokio::test]
async fn bindings_describe_the_model() {
    let db = connect(&InMemoryConnector::default());

    assert_eq!(
        serde_json::to_value(db.models.users.find_binding("id")).unwrap(),
        json!({
            "type": "cosmosDB",
            "direction": "in",
            "databaseName": "app",
            "containerName": "users",
            "connection": "COSMOS_CONNECTION_STRING",
            "id": "{id}",
            "partitionKey": "{id}",
        })
    );

    assert_eq!(
        serde_json::to_value(db.models.users.all_binding()).unwrap(),
        json!({
            "type": "cosmosDB",
            "direction": "in",
            "databaseName": "app",
            "containerName": "users",
            "connection": "COSMOS_CONNECTION_STRING",
        })
    );

    let binding = db.models.accounts.sql_binding("SELECT * FROM c WHERE c.tier = 'pro'");
    assert_eq!(binding.sql_query.as_deref(), Some("SELECT * FROM c WHERE c.tier = 'pro'"));
    assert_eq!(binding.id, None);
}

/// Delays every call so deadlines can elapse.
#[derive(Debug)]
struct SlowStore {
    inner: InMemoryStore,
    delay: Duration,
}

impl SlowStore {
    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl StoreBackend for SlowStore {
    async fn read_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>> {
        self.pause().await;
        self.inner.read_item(path, id).await
    }

    async fn read_all(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<Value>> {
        self.pause().await;
        self.inner.read_all(path).await
    }

    async fn create_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value> {
        self.pause().await;
        self.inner.create_item(path, document).await
    }

    async fn upsert_item(&self, path: &CollectionPath, document: Value) -> DocumentStoreResult<Value> {
        self.pause().await;
        self.inner.upsert_item(path, document).await
    }

    async fn replace_item(&self, path: &CollectionPath, id: &str, document: Value) -> DocumentStoreResult<Value> {
        self.pause().await;
        self.inner.replace_item(path, id, document).await
    }

    async fn delete_item(&self, path: &CollectionPath, id: &str) -> DocumentStoreResult<Option<Value>> {
        self.pause().await;
        self.inner.delete_item(path, id).await
    }

    async fn query_items(
        &self,
        path: &CollectionPath,
        query: QuerySpec,
        options: QueryOptions,
    ) -> DocumentStoreResult<Vec<Value>> {
        self.pause().await;
        self.inner.query_items(path, query, options).await
    }

    async fn partition_key_paths(&self, path: &CollectionPath) -> DocumentStoreResult<Vec<String>> {
        self.pause().await;
        self.inner.partition_key_paths(path).await
    }
}

struct SlowConnector(Duration);

impl Connector for SlowConnector {
    type Backend = SlowStore;

    fn connect(&self, _connection_string: &str) -> DocumentStoreResult<SlowStore> {
        Ok(SlowStore {
            inner: InMemoryStore::new(),
            delay: self.0,
        })
    }
}

#[tokio::test]
async fn deadline_elapses_into_timeout() {
    let db = Registry::new(common::DATABASE)
        .with_connection_string("slow")
        .build(SlowConnector(Duration::from_millis(200)), |builder| {
            builder.create_model::<User>("users")
        })
        .unwrap();

    let hurried = db.models.with_deadline(Duration::from_millis(10));
    assert_eq!(hurried.deadline(), Some(Duration::from_millis(10)));

    let err = hurried.find("anything").await.unwrap_err();
    assert!(matches!(
        err,
        DocumentStoreError::Timeout { operation: "find", ref collection, .. } if collection == "users"
    ));

    let patient = db.models.with_deadline(Duration::from_secs(5));
    assert_eq!(patient.find("anything").await.unwrap(), None);
    assert_eq!(db.models.all().await.unwrap(), Vec::new());
}
