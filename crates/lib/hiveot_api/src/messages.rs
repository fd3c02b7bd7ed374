//! Wire payloads of the admin and user services.

use chrono::{DateTime, Utc};
use hiveot_core::models::authn::{ClientProfile, ClientType, ProfileUpdate};
use serde::{Deserialize, Serialize};

/// Thing ID of the admin service.
pub const ADMIN_SERVICE_ID: &str = "admin";
/// Thing ID of the user service.
pub const USER_SERVICE_ID: &str = "user";
/// Client ID of the authentication service itself.
pub const AUTHN_SERVICE_ID: &str = "authn";

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddConsumerArgs {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Input of `addAgent` and `addService`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDeviceArgs {
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub pub_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdArgs {
    #[serde(rename = "clientID")]
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetClientPasswordArgs {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetClientRoleArgs {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClientProfileArgs {
    pub profile: ProfileUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOutput {
    pub profile: ClientProfile,
}

/// A live session joined with its client's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_type: ClientType,
    pub display_name: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub created: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginArgs {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenArgs {
    pub old_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNameArgs {
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordArgs {
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePubKeyArgs {
    pub pub_key_pem: String,
}

/// Output of every operation that mints a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOutput {
    pub token: String,
}
