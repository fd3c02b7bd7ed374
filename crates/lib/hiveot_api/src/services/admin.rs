//! Admin service: client management and startup bootstrap.

use std::sync::Arc;

use hiveot_core::authn::{AuthnError, MIN_PASSWORD_LENGTH};
use hiveot_core::authn::store::validate_client_id;
use hiveot_core::authz::Role;
use hiveot_core::keys::{HubKey, KeyType, load_create_key_pair, read_token_file, write_token_file};
use hiveot_core::models::authn::{ClientProfile, ClientType, ProfileUpdate};
use tracing::info;

use crate::CoreContext;
use crate::error::{AppError, AppResult};
use crate::messages::{AUTHN_SERVICE_ID, SessionInfo};

/// Role given to consumers that were added without one.
pub const DEFAULT_CONSUMER_ROLE: Role = Role::Viewer;

/// Admin operations over the credential store.
#[derive(Debug, Clone)]
pub struct AdminService {
    ctx: Arc<CoreContext>,
}

impl AdminService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    // -----------------------------------------------------------------------
    // Bootstrap
    // -----------------------------------------------------------------------

    /// Make sure the core's own service accounts exist and have a token
    /// file. Missing ones are (re)created.
    pub fn start(&self) -> AppResult<()> {
        let config = &self.ctx.config;
        config.password_hash_algo()?;

        let accounts = [
            (AUTHN_SERVICE_ID, "Authn Service"),
            (config.launcher_account_id.as_str(), "Launcher Service"),
            (config.admin_account_id.as_str(), "Administrator"),
        ];
        for (client_id, display_name) in accounts {
            let exists = self.ctx.store.get_profile(client_id).is_ok();
            let has_token = read_token_file(&config.keys_dir, client_id)?.is_some();
            if exists && has_token {
                continue;
            }
            self.add_service(client_id, display_name, None)?;
            info!(client_id, "bootstrap account created");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Adding clients
    // -----------------------------------------------------------------------

    /// Insert or update a consumer. A given password is set as well.
    pub fn add_consumer(
        &self,
        client_id: &str,
        display_name: &str,
        password: Option<&str>,
    ) -> AppResult<()> {
        let password = password.filter(|p| !p.is_empty());
        if let Some(p) = password
            && p.chars().count() < MIN_PASSWORD_LENGTH
        {
            return Err(AppError::InvalidArgument(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let profile = self.upsert_profile(client_id, display_name, ClientType::Consumer, None)?;
        self.ctx.store.add(client_id, profile)?;
        if let Some(p) = password {
            self.ctx.store.set_password(client_id, p)?;
        }
        if self.ctx.store.get_role(client_id)?.is_empty() {
            self.ctx
                .store
                .set_role(client_id, DEFAULT_CONSUMER_ROLE.as_str())?;
        }
        info!(client_id, "consumer added");
        Ok(())
    }

    /// Insert or update an agent and return a session-less token for it.
    pub fn add_agent(
        &self,
        client_id: &str,
        display_name: &str,
        pub_key: Option<&str>,
    ) -> AppResult<String> {
        self.add_device(client_id, display_name, pub_key, ClientType::Agent, Role::Agent)
    }

    /// Insert or update a service, return a session-less token for it and
    /// write that token to the service's token file.
    pub fn add_service(
        &self,
        client_id: &str,
        display_name: &str,
        pub_key: Option<&str>,
    ) -> AppResult<String> {
        let token =
            self.add_device(client_id, display_name, pub_key, ClientType::Service, Role::Service)?;
        let path = write_token_file(&self.ctx.config.keys_dir, client_id, &token)?;
        info!(client_id, path = %path.display(), "service token written");
        Ok(token)
    }

    fn add_device(
        &self,
        client_id: &str,
        display_name: &str,
        pub_key: Option<&str>,
        client_type: ClientType,
        role: Role,
    ) -> AppResult<String> {
        validate_client_id(client_id)?;
        let pub_key = match pub_key.filter(|k| !k.is_empty()) {
            Some(text) => normalize_pub_key(text)?,
            None => load_create_key_pair(client_id, &self.ctx.config.keys_dir, KeyType::Ed25519)?
                .export_public_pem()?,
        };
        let profile = self.upsert_profile(client_id, display_name, client_type, Some(pub_key))?;
        let validity = self.ctx.authn.token_validity().for_profile(&profile);
        self.ctx.store.add(client_id, profile)?;
        self.ctx.store.set_role(client_id, role.as_str())?;

        let token = self
            .ctx
            .authn
            .create_session_token(client_id, client_id, validity)?;
        info!(client_id, %client_type, "client added");
        Ok(token)
    }

    /// Existing profile updated in place, or a new one. An existing client of
    /// another type is a conflict.
    fn upsert_profile(
        &self,
        client_id: &str,
        display_name: &str,
        client_type: ClientType,
        pub_key: Option<String>,
    ) -> AppResult<ClientProfile> {
        let mut profile = match self.ctx.store.get_profile(client_id) {
            Ok(existing) if existing.client_type != client_type => {
                return Err(AuthnError::ClientTypeConflict {
                    client_id: client_id.to_string(),
                    existing: existing.client_type.to_string(),
                    requested: client_type.to_string(),
                }
                .into());
            }
            Ok(existing) => existing,
            Err(_) => ClientProfile::new(client_id, client_type),
        };
        if !display_name.is_empty() {
            profile.display_name = display_name.to_string();
        } else if profile.display_name.is_empty() {
            profile.display_name = client_id.to_string();
        }
        if let Some(pub_key) = pub_key {
            profile.pub_key = pub_key;
        }
        Ok(profile)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_client_profile(&self, client_id: &str) -> AppResult<ClientProfile> {
        Ok(self.ctx.store.get_profile(client_id)?)
    }

    pub fn get_profiles(&self) -> Vec<ClientProfile> {
        self.ctx.store.get_profiles()
    }

    /// Live sessions joined with their client profiles, ordered by client.
    pub fn get_sessions(&self) -> Vec<SessionInfo> {
        self.ctx.sessions.remove_expired();
        self.ctx
            .sessions
            .get_sessions()
            .into_iter()
            .filter_map(|s| {
                let profile = self.ctx.store.get_profile(&s.client_id).ok()?;
                Some(SessionInfo {
                    client_id: s.client_id,
                    client_type: profile.client_type,
                    display_name: profile.display_name,
                    session_id: s.session_id,
                    created: s.created,
                    expiry: s.expiry,
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Fresh session-less token for an existing client.
    pub fn new_agent_token(&self, client_id: &str) -> AppResult<String> {
        let profile = self.ctx.store.get_profile(client_id)?;
        let validity = self.ctx.authn.token_validity().for_profile(&profile);
        let token = self
            .ctx
            .authn
            .create_session_token(client_id, client_id, validity)?;
        info!(client_id, "new agent token issued");
        Ok(token)
    }

    /// Remove a client and its session. Idempotent.
    pub fn remove_client(&self, client_id: &str) -> AppResult<()> {
        self.ctx.store.remove(client_id)?;
        self.ctx.sessions.remove_by_client_id(client_id);
        info!(client_id, "client removed");
        Ok(())
    }

    pub fn set_client_password(&self, client_id: &str, password: &str) -> AppResult<()> {
        self.ctx.store.set_password(client_id, password)?;
        info!(client_id, "password changed by admin");
        Ok(())
    }

    pub fn set_client_role(&self, client_id: &str, role: &str) -> AppResult<()> {
        let role: Role = role.parse()?;
        self.ctx.store.set_role(client_id, role.as_str())?;
        info!(client_id, %role, "role changed");
        Ok(())
    }

    /// Apply a partial profile update on behalf of `sender_id`. Absent or
    /// empty fields are left unchanged.
    pub fn update_client_profile(&self, sender_id: &str, update: &ProfileUpdate) -> AppResult<()> {
        let mut update = update.clone();
        if let Some(text) = update.pub_key.as_deref().filter(|k| !k.is_empty()) {
            update.pub_key = Some(normalize_pub_key(text)?);
        }
        self.ctx.store.update_profile(sender_id, &update)?;
        info!(client_id = %update.client_id, sender_id, "profile updated");
        Ok(())
    }
}

/// Import a public key in any supported encoding and re-export it as PEM.
pub(crate) fn normalize_pub_key(text: &str) -> AppResult<String> {
    let key = HubKey::import(text)?;
    Ok(key.export_public_pem()?)
}
