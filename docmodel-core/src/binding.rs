//! Declarative input-binding descriptors for serverless triggers.
//!
//! A hosting platform can bind documents of a model's collection to a function's input. These
//! helpers only describe the binding; executing it is the platform's job.

use serde::{Deserialize, Serialize};

use crate::{document::Document, model::Model};

/// Binding type understood by the hosting platform.
pub const BINDING_TYPE: &str = "cosmosDB";

/// A declarative description of a document input binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBinding {
    #[serde(rename = "type")]
    pub binding_type: String,
    pub direction: String,
    pub database_name: String,
    pub container_name: String,
    /// Name of the setting holding the connection string.
    pub connection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
}

impl<T: Document> Model<T> {
    /// Describes a binding that loads the document whose id (and partition key) comes from the
    /// trigger input `variable`, usually `"id"`.
    pub fn find_binding(&self, variable: &str) -> InputBinding {
        let expression = format!("{{{variable}}}");

        InputBinding {
            id: Some(expression.clone()),
            partition_key: Some(expression),
            ..self.base_binding()
        }
    }

    /// Describes a binding that loads every document of the collection.
    pub fn all_binding(&self) -> InputBinding {
        self.base_binding()
    }

    /// Describes a binding that runs a fixed query.
    pub fn sql_binding(&self, query: impl Into<String>) -> InputBinding {
        InputBinding {
            sql_query: Some(query.into()),
            ..self.base_binding()
        }
    }

    fn base_binding(&self) -> InputBinding {
        InputBinding {
            binding_type: BINDING_TYPE.to_string(),
            direction: "in".to_string(),
            database_name: self.database().to_string(),
            container_name: self.collection().to_string(),
            connection: self.connection_setting().to_string(),
            id: None,
            partition_key: None,
            sql_query: None,
        }
    }
}
