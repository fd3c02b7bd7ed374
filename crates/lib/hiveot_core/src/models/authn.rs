//! Client profiles and credential entries.
//!
//! These are the records persisted in the password file and returned (as
//! copies) by the credential store. Field names follow the hub's wire
//! convention (`clientID`, camelCase elsewhere).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of client an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Agent,
    Service,
    Consumer,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Agent => "agent",
            ClientType::Service => "service",
            ClientType::Consumer => "consumer",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown client type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid client type '{0}'")]
pub struct InvalidClientType(pub String);

impl FromStr for ClientType {
    type Err = InvalidClientType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(ClientType::Agent),
            "service" => Ok(ClientType::Service),
            "consumer" => Ok(ClientType::Consumer),
            other => Err(InvalidClientType(other.to_string())),
        }
    }
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_type: ClientType,
    #[serde(default)]
    pub display_name: String,
    /// PEM encoded public key. Optional for consumers.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pub_key: String,
    /// Milliseconds since the epoch of the last change.
    #[serde(default)]
    pub updated_millis: i64,
    /// Overrides the client type's default token validity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_validity_sec: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl ClientProfile {
    pub fn new(client_id: impl Into<String>, client_type: ClientType) -> Self {
        let client_id = client_id.into();
        Self {
            display_name: client_id.clone(),
            client_id,
            client_type,
            pub_key: String::new(),
            updated_millis: 0,
            token_validity_sec: None,
            disabled: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_pub_key(mut self, pub_key: impl Into<String>) -> Self {
        self.pub_key = pub_key.into();
        self
    }
}

/// Partial profile. Absent or empty fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_type: Option<ClientType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
}

impl ProfileUpdate {
    pub fn for_client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }
}

/// Stored credential entry: a profile plus password hash and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthnEntry {
    pub client_profile: ClientProfile,
    /// Encoded hash including algorithm, parameters and salt. Empty means
    /// password login is not permitted.
    #[serde(default)]
    pub password_hash: String,
    /// Empty means no role.
    #[serde(default)]
    pub role: String,
}

impl AuthnEntry {
    pub fn new(profile: ClientProfile) -> Self {
        Self {
            client_profile: profile,
            password_hash: String::new(),
            role: String::new(),
        }
    }
}
