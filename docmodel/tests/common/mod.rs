#![allow(dead_code)]

use docmodel::{
    memory::{InMemoryConnector, InMemoryStore},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DATABASE: &str = "app";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub display_name: String,
    pub role: String,
    #[serde(default)]
    pub age: u32,
}

impl User {
    pub fn new(display_name: &str, role: &str, age: u32) -> Self {
        Self {
            display_name: display_name.to_string(),
            role: role.to_string(),
            age,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
pub struct Account {
    pub name: String,
    #[serde(rename = "tier")]
    pub plan: String,
}

pub struct Models {
    pub users: Model<User>,
    pub accounts: Model<Account>,
}

pub fn env_with_connection() -> HashMap<String, String> {
    HashMap::from([(
        "COSMOS_CONNECTION_STRING".to_string(),
        "memory".to_string(),
    )])
}

/// Builds the standard models over `connector`: `users` with generated ids, `accounts` with
/// caller-supplied ids.
pub fn connect(connector: &InMemoryConnector) -> Connected<InMemoryStore, Models> {
    Registry::new(DATABASE)
        .with_env(env_with_connection())
        .build(connector, |builder| Models {
            users: builder.create_model("users"),
            accounts: builder.create_model_with("accounts", ModelOverrides::new().generate_id(false)),
        })
        .expect("registry builds against the in-memory store")
}
