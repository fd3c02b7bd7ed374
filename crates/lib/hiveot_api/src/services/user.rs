//! User service. Every operation acts on the caller's own account.

use std::sync::Arc;

use hiveot_core::models::authn::{ClientProfile, ProfileUpdate};
use tracing::info;

use crate::CoreContext;
use crate::config::PubKeyChangePolicy;
use crate::error::{AppError, AppResult};
use crate::services::admin::normalize_pub_key;

#[derive(Debug, Clone)]
pub struct UserService {
    ctx: Arc<CoreContext>,
}

impl UserService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    pub fn get_profile(&self, sender_id: &str) -> AppResult<ClientProfile> {
        Ok(self.ctx.store.get_profile(sender_id)?)
    }

    pub fn login(&self, client_id: &str, password: &str) -> AppResult<String> {
        Ok(self.ctx.authn.login(client_id, password)?)
    }

    pub fn logout(&self, sender_id: &str) {
        self.ctx.authn.logout(sender_id);
    }

    pub fn refresh_token(&self, sender_id: &str, old_token: &str) -> AppResult<String> {
        Ok(self.ctx.authn.refresh_token(sender_id, old_token)?)
    }

    pub fn update_name(&self, sender_id: &str, new_name: &str) -> AppResult<()> {
        if new_name.trim().is_empty() {
            return Err(AppError::InvalidArgument("missing name".into()));
        }
        let update = ProfileUpdate {
            display_name: Some(new_name.to_string()),
            ..ProfileUpdate::for_client(sender_id)
        };
        self.ctx.store.update_profile(sender_id, &update)?;
        info!(client_id = sender_id, "display name updated");
        Ok(())
    }

    pub fn update_password(&self, sender_id: &str, new_password: &str) -> AppResult<()> {
        self.ctx.store.set_password(sender_id, new_password)?;
        info!(client_id = sender_id, "password updated");
        Ok(())
    }

    /// Replace the caller's public key. Whether outstanding session tokens
    /// survive depends on the configured [`PubKeyChangePolicy`].
    pub fn update_pub_key(&self, sender_id: &str, pub_key_pem: &str) -> AppResult<()> {
        if pub_key_pem.trim().is_empty() {
            return Err(AppError::InvalidArgument("missing public key".into()));
        }
        let update = ProfileUpdate {
            pub_key: Some(normalize_pub_key(pub_key_pem)?),
            ..ProfileUpdate::for_client(sender_id)
        };
        self.ctx.store.update_profile(sender_id, &update)?;
        match self.ctx.config.pubkey_change_policy {
            PubKeyChangePolicy::KeepSessions => {}
            PubKeyChangePolicy::RevokeSessions => self.ctx.authn.logout(sender_id),
        }
        info!(client_id = sender_id, policy = ?self.ctx.config.pubkey_change_policy, "public key updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use hiveot_core::keys::{HubKey, KeyType};

    use super::*;
    use crate::config::AuthnConfig;
    use crate::services::admin::AdminService;
    use crate::services::test_support::context;

    fn with_alice() -> (tempfile::TempDir, Arc<CoreContext>, UserService) {
        let (dir, ctx) = context();
        AdminService::new(ctx.clone())
            .add_consumer("alice", "Alice", Some("hunter22"))
            .unwrap();
        let user = UserService::new(ctx.clone());
        (dir, ctx, user)
    }

    fn new_pub_pem() -> String {
        HubKey::generate(KeyType::Ecdsa)
            .unwrap()
            .export_public_pem()
            .unwrap()
    }

    #[test]
    fn update_name_changes_own_profile() {
        let (_dir, _ctx, user) = with_alice();
        user.update_name("alice", "Alice Liddell").unwrap();
        assert_eq!(user.get_profile("alice").unwrap().display_name, "Alice Liddell");
        assert_matches!(
            user.update_name("alice", "  "),
            Err(AppError::InvalidArgument(_))
        );
    }

    #[test]
    fn update_password_then_login() {
        let (_dir, _ctx, user) = with_alice();
        user.update_password("alice", "wonderland").unwrap();
        assert_matches!(
            user.login("alice", "hunter22"),
            Err(AppError::AuthenticationFailed)
        );
        user.login("alice", "wonderland").unwrap();
    }

    #[test]
    fn update_pub_key_keeps_sessions_by_default() {
        let (_dir, ctx, user) = with_alice();
        let token = user.login("alice", "hunter22").unwrap();
        let pem = new_pub_pem();
        user.update_pub_key("alice", &pem).unwrap();
        assert_eq!(user.get_profile("alice").unwrap().pub_key, pem);
        ctx.authn.validate_token(&token).unwrap();
    }

    #[test]
    fn update_pub_key_can_revoke_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AuthnConfig::new(dir.path());
        config.pubkey_change_policy = PubKeyChangePolicy::RevokeSessions;
        let ctx = CoreContext::start(config).unwrap();
        AdminService::new(ctx.clone())
            .add_consumer("alice", "", Some("hunter22"))
            .unwrap();
        let user = UserService::new(ctx.clone());
        let token = user.login("alice", "hunter22").unwrap();
        user.update_pub_key("alice", &new_pub_pem()).unwrap();
        assert_matches!(
            ctx.authn.validate_token(&token),
            Err(hiveot_core::authn::AuthnError::SessionInvalid)
        );
    }

    #[test]
    fn update_pub_key_rejects_garbage() {
        let (_dir, _ctx, user) = with_alice();
        assert_matches!(
            user.update_pub_key("alice", "-----BEGIN NONSENSE-----"),
            Err(AppError::InvalidArgument(_))
        );
    }

    #[test]
    fn refresh_for_other_sender_is_not_authorized() {
        let (_dir, _ctx, user) = with_alice();
        let token = user.login("alice", "hunter22").unwrap();
        assert_matches!(
            user.refresh_token("admin", &token),
            Err(AppError::NotAuthorized(_))
        );
    }
}
