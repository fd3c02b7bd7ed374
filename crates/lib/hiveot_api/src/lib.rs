//! # hiveot_api
//!
//! Services and request dispatch on top of the HiveOT trust core.
//!
//! [`CoreContext`] bundles the core collaborators. The admin and user
//! services take it at construction, and the [`dispatcher::Dispatcher`]
//! admits requests from any transport and routes them to those services.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use hiveot_core::authn::jwt::JwtCodec;
use hiveot_core::authn::paseto::PasetoCodec;
use hiveot_core::authn::{
    Authenticator, AuthnFileStore, JwtAuthenticator, PasetoAuthenticator, SessionManager,
};
use hiveot_core::authz::{Authorizer, Role};
use hiveot_core::clock::{Clock, SystemClock};
use hiveot_core::keys::{KeyType, load_create_key_pair};
use tracing::info;

use crate::config::{AuthnConfig, TokenFormat};
use crate::error::AppResult;
use crate::messages::{AUTHN_SERVICE_ID, USER_SERVICE_ID};
use crate::services::admin::AdminService;

/// Shared collaborators of the trust core.
pub struct CoreContext {
    pub config: AuthnConfig,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<AuthnFileStore>,
    pub sessions: Arc<SessionManager>,
    pub authn: Arc<dyn Authenticator>,
    pub authz: Arc<Authorizer>,
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext")
            .field("store", &self.store)
            .field("sessions", &self.sessions)
            .field("token_format", &self.authn.format())
            .finish()
    }
}

impl CoreContext {
    /// Open the core and run the admin bootstrap.
    pub fn start(config: AuthnConfig) -> AppResult<Arc<Self>> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    pub fn start_with_clock(config: AuthnConfig, clock: Arc<dyn Clock>) -> AppResult<Arc<Self>> {
        let ctx = Self::open_with_clock(config, clock)?;
        AdminService::new(ctx.clone()).start()?;
        Ok(ctx)
    }

    /// Open the core without creating bootstrap accounts.
    pub fn open(config: AuthnConfig) -> AppResult<Arc<Self>> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: AuthnConfig, clock: Arc<dyn Clock>) -> AppResult<Arc<Self>> {
        let hash_algo = config.password_hash_algo()?;
        let token_format = config.token_format()?;

        let store = AuthnFileStore::new(&config.password_file, hash_algo, clock.clone());
        store.open()?;
        let sessions = Arc::new(SessionManager::with_duration(
            clock.clone(),
            config.session_validity,
        ));

        let signing_key = load_create_key_pair(AUTHN_SERVICE_ID, &config.keys_dir, KeyType::Ed25519)?;
        let authn: Arc<dyn Authenticator> = match token_format {
            TokenFormat::Paseto => Arc::new(PasetoAuthenticator::new(
                PasetoCodec::new(&signing_key)?,
                store.clone(),
                sessions.clone(),
                clock.clone(),
                config.token_validity,
            )),
            TokenFormat::Jwt => Arc::new(JwtAuthenticator::new(
                JwtCodec::new(&signing_key)?,
                store.clone(),
                sessions.clone(),
                clock.clone(),
                config.token_validity,
            )),
        };

        let authz = Arc::new(Authorizer::new(store.clone()));
        let user_roles: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|r| *r != Role::None)
            .collect();
        authz.set_service_permissions(USER_SERVICE_ID, &user_roles);

        info!(
            password_file = %config.password_file.display(),
            format = authn.format(),
            clients = store.count(),
            "trust core opened"
        );
        Ok(Arc::new(Self {
            config,
            clock,
            store,
            sessions,
            authn,
            authz,
        }))
    }

    /// Drop all sessions and stop watching the password file.
    pub fn stop(&self) {
        self.sessions.remove_all();
        self.store.close();
        info!("trust core stopped");
    }
}
