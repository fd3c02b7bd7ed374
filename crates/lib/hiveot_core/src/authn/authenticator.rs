//! Session authenticator.
//!
//! Issues, validates, refreshes and revokes tokens. A token is accepted only
//! when its signature and times are valid AND, unless it is session-less,
//! its session is still alive in the [`SessionManager`]. Removing a session
//! therefore revokes every token issued for it.

use std::sync::Arc;

use chrono::Duration;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info, warn};

use super::jwt::JwtCodec;
use super::paseto::PasetoCodec;
use super::sessions::SessionManager;
use super::store::AuthnFileStore;
use super::token::{TokenClaims, TokenCodec, TokenIdentity};
use super::AuthnError;
use crate::clock::Clock;
use crate::models::authn::{ClientProfile, ClientType};

/// Length of generated session IDs.
const SESSION_ID_LENGTH: usize = 12;

/// Default agent token validity: 90 days.
pub const DEFAULT_AGENT_VALIDITY_DAYS: i64 = 90;
/// Default consumer token validity: 30 days.
pub const DEFAULT_CONSUMER_VALIDITY_DAYS: i64 = 30;
/// Default service token validity: 365 days.
pub const DEFAULT_SERVICE_VALIDITY_DAYS: i64 = 365;

/// Token validity per client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenValidity {
    pub agent: Duration,
    pub consumer: Duration,
    pub service: Duration,
}

impl Default for TokenValidity {
    fn default() -> Self {
        Self {
            agent: Duration::days(DEFAULT_AGENT_VALIDITY_DAYS),
            consumer: Duration::days(DEFAULT_CONSUMER_VALIDITY_DAYS),
            service: Duration::days(DEFAULT_SERVICE_VALIDITY_DAYS),
        }
    }
}

impl TokenValidity {
    pub fn for_type(&self, client_type: ClientType) -> Duration {
        match client_type {
            ClientType::Agent => self.agent,
            ClientType::Consumer => self.consumer,
            ClientType::Service => self.service,
        }
    }

    /// The profile's own override wins over the type default.
    pub fn for_profile(&self, profile: &ClientProfile) -> Duration {
        match profile.token_validity_sec {
            Some(secs) if secs > 0 => Duration::seconds(secs),
            _ => self.for_type(profile.client_type),
        }
    }
}

/// Capability set shared by every token format.
pub trait Authenticator: Send + Sync {
    /// Token format name.
    fn format(&self) -> &'static str;

    fn token_validity(&self) -> TokenValidity;

    /// Mint a token. Does not touch sessions.
    fn create_session_token(
        &self,
        client_id: &str,
        session_id: &str,
        validity: Duration,
    ) -> Result<String, AuthnError>;

    /// Verify a token's signature and times and return its identity.
    fn decode_session_token(&self, token: &str) -> Result<TokenIdentity, AuthnError>;

    /// Decode a token and require its session to be alive.
    fn validate_token(&self, token: &str) -> Result<TokenIdentity, AuthnError>;

    /// Password login. Creates or renews the client's session.
    fn login(&self, client_id: &str, password: &str) -> Result<String, AuthnError>;

    /// Drop the client's session. Idempotent.
    fn logout(&self, client_id: &str);

    /// Issue a new token for the same session.
    fn refresh_token(&self, sender_id: &str, old_token: &str) -> Result<String, AuthnError>;

    /// Check a password without creating a session.
    fn validate_password(&self, client_id: &str, password: &str)
    -> Result<ClientProfile, AuthnError>;
}

/// Authenticator over any [`TokenCodec`].
pub struct SessionAuthenticator<C: TokenCodec> {
    codec: C,
    store: Arc<AuthnFileStore>,
    sessions: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    validity: TokenValidity,
}

/// PASETO v4.public flavour. The default.
pub type PasetoAuthenticator = SessionAuthenticator<PasetoCodec>;
/// Legacy JWT flavour.
pub type JwtAuthenticator = SessionAuthenticator<JwtCodec>;

impl<C: TokenCodec> SessionAuthenticator<C> {
    pub fn new(
        codec: C,
        store: Arc<AuthnFileStore>,
        sessions: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
        validity: TokenValidity,
    ) -> Self {
        Self {
            codec,
            store,
            sessions,
            clock,
            validity,
        }
    }

    fn new_session_id(client_id: &str) -> String {
        loop {
            let sid: String = rng()
                .sample_iter(&Alphanumeric)
                .take(SESSION_ID_LENGTH)
                .map(char::from)
                .collect();
            // Equal IDs would turn the token into a session-less one.
            if sid != client_id {
                return sid;
            }
        }
    }
}

impl<C: TokenCodec> Authenticator for SessionAuthenticator<C> {
    fn format(&self) -> &'static str {
        self.codec.format()
    }

    fn token_validity(&self) -> TokenValidity {
        self.validity
    }

    fn create_session_token(
        &self,
        client_id: &str,
        session_id: &str,
        validity: Duration,
    ) -> Result<String, AuthnError> {
        if client_id.is_empty() || session_id.is_empty() {
            return Err(AuthnError::InvalidArgument(
                "clientID and sessionID are required".into(),
            ));
        }
        let claims = TokenClaims::new(client_id, session_id, self.clock.now(), validity);
        self.codec.encode(&claims)
    }

    fn decode_session_token(&self, token: &str) -> Result<TokenIdentity, AuthnError> {
        self.codec.decode(token, self.clock.now())
    }

    fn validate_token(&self, token: &str) -> Result<TokenIdentity, AuthnError> {
        let identity = self.decode_session_token(token)?;
        if identity.is_session_less() {
            return Ok(identity);
        }
        let session = match self.sessions.get_session_by_session_id(&identity.session_id) {
            Some(s) => s,
            None => {
                warn!(client_id = %identity.client_id, "no session for token");
                return Err(AuthnError::SessionInvalid);
            }
        };
        if session.client_id != identity.client_id {
            warn!(client_id = %identity.client_id, "session belongs to another client");
            return Err(AuthnError::SessionInvalid);
        }
        if session.is_expired(self.clock.now()) {
            // Lookup already evicted it; make sure it is gone.
            self.sessions.remove(&identity.session_id);
            warn!(client_id = %identity.client_id, "session expired");
            return Err(AuthnError::SessionExpired);
        }
        Ok(identity)
    }

    fn login(&self, client_id: &str, password: &str) -> Result<String, AuthnError> {
        let profile = self.validate_password(client_id, password)?;
        if profile.disabled {
            info!(client_id, "login rejected: account disabled");
            return Err(AuthnError::AuthenticationFailed);
        }

        let now = self.clock.now();
        let session_id = match self.sessions.get_session_by_client_id(client_id) {
            Some(existing) if !existing.is_expired(now) => existing.session_id,
            _ => Self::new_session_id(client_id),
        };
        self.sessions.new_session(client_id, &session_id)?;

        // Password login always uses consumer validity unless overridden.
        let validity = match profile.token_validity_sec {
            Some(secs) if secs > 0 => Duration::seconds(secs),
            _ => self.validity.consumer,
        };
        let token = self.create_session_token(client_id, &session_id, validity)?;
        info!(client_id, format = self.format(), "login succeeded");
        Ok(token)
    }

    fn logout(&self, client_id: &str) {
        self.sessions.remove_by_client_id(client_id);
        info!(client_id, "logged out");
    }

    fn refresh_token(&self, sender_id: &str, old_token: &str) -> Result<String, AuthnError> {
        let identity = self.validate_token(old_token)?;
        if identity.client_id != sender_id {
            warn!(sender_id, token_client_id = %identity.client_id, "refresh rejected: sender mismatch");
            return Err(AuthnError::SenderMismatch(sender_id.to_string()));
        }
        let profile = match self.store.get_profile(sender_id) {
            Ok(p) if !p.disabled => p,
            _ => return Err(AuthnError::AccountDisabled(sender_id.to_string())),
        };
        let validity = self.validity.for_profile(&profile);
        let token = self.create_session_token(sender_id, &identity.session_id, validity)?;
        debug!(client_id = sender_id, "token refreshed");
        Ok(token)
    }

    fn validate_password(
        &self,
        client_id: &str,
        password: &str,
    ) -> Result<ClientProfile, AuthnError> {
        self.store.verify_password(client_id, password)
    }
}
