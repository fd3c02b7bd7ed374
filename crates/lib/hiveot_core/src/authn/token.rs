//! Token codec abstraction shared by the PASETO and JWT formats.

use chrono::{DateTime, Duration, Utc};

use super::AuthnError;

/// Issuer written into and required from every token.
pub const ISSUER: &str = "hiveot";
/// Audience written into and required from every token.
pub const AUDIENCE: &str = "hiveot";

/// Identity carried by a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub client_id: String,
    pub session_id: String,
}

impl TokenIdentity {
    /// Agent and service tokens carry their clientID as sessionID and are
    /// not bound to a session.
    pub fn is_session_less(&self) -> bool {
        self.client_id == self.session_id
    }
}

/// Claims minted into a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub client_id: String,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    pub fn new(
        client_id: &str,
        session_id: &str,
        issued_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            session_id: session_id.to_string(),
            issued_at,
            expires_at: issued_at + validity,
        }
    }
}

/// A signed token format.
pub trait TokenCodec: Send + Sync {
    /// Short format name, used in logs.
    fn format(&self) -> &'static str;

    /// Sign the claims into a token string.
    fn encode(&self, claims: &TokenClaims) -> Result<String, AuthnError>;

    /// Verify signature, algorithm, issuer, audience and time validity.
    /// Every failure is [`AuthnError::InvalidToken`].
    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<TokenIdentity, AuthnError>;
}

/// Shared time checks. `nbf` and `iat` may not lie in the future and the
/// token must not have reached `exp`.
pub(crate) fn check_times<T: PartialOrd>(
    iat: T,
    nbf: T,
    exp: T,
    now: T,
) -> Result<(), AuthnError> {
    if exp <= now {
        return Err(AuthnError::InvalidToken("token expired".into()));
    }
    if nbf > now {
        return Err(AuthnError::InvalidToken("token not yet valid".into()));
    }
    if iat > now {
        return Err(AuthnError::InvalidToken("token issued in the future".into()));
    }
    Ok(())
}

pub(crate) fn check_identity(
    iss: &str,
    aud: &str,
    sub: &str,
    client_id: &str,
    session_id: &str,
) -> Result<(), AuthnError> {
    if iss != ISSUER {
        return Err(AuthnError::InvalidToken(format!("unexpected issuer '{iss}'")));
    }
    if aud != AUDIENCE {
        return Err(AuthnError::InvalidToken(format!("unexpected audience '{aud}'")));
    }
    if client_id.is_empty() || session_id.is_empty() {
        return Err(AuthnError::InvalidToken("missing clientID or sessionID".into()));
    }
    if sub != client_id {
        return Err(AuthnError::InvalidToken("subject does not match clientID".into()));
    }
    Ok(())
}
