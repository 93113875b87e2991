//! Typed post records
//!
//! Clients are generic over the record type; any `DeserializeOwned` value
//! works and the default is [`serde_json::Value`]. [`Post`] is a lenient
//! typed shape for the statuses the default endpoints emit. Every field is
//! optional and unknown fields are kept in [`Post::extra`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A status from the streaming API
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    /// Numeric id
    pub id: Option<u64>,
    /// Id as a string (ids exceed 2^53)
    pub id_str: Option<String>,
    /// Post text
    pub text: Option<String>,
    /// Creation time as sent by the endpoint
    pub created_at: Option<String>,
    /// Author
    pub user: Option<User>,
    /// Every field not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Author of a [`Post`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    /// Numeric id
    pub id: Option<u64>,
    /// Handle without the `@`
    pub screen_name: Option<String>,
    /// Display name
    pub name: Option<String>,
}

impl Post {
    /// Stream control messages (`delete`, `limit`, ...) carry no text or id
    #[must_use]
    pub fn is_status(&self) -> bool {
        self.text.is_some() || self.id.is_some() || self.id_str.is_some()
    }
}
