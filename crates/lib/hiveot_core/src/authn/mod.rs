//! Authentication.
//!
//! Credential store, password hashing, session manager and the token
//! authenticators that bind signed tokens to live sessions.

pub mod authenticator;
pub mod jwt;
pub mod paseto;
pub mod password;
pub mod sessions;
pub mod store;
pub mod token;
pub mod watcher;

use thiserror::Error;

use crate::keys::KeyError;

pub use authenticator::{
    Authenticator, JwtAuthenticator, PasetoAuthenticator, SessionAuthenticator, TokenValidity,
};
pub use sessions::{Session, SessionManager};
pub use store::AuthnFileStore;
pub use token::{TokenCodec, TokenIdentity};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 5;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthnError {
    /// Login or password verification failed. The reason is never exposed.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("no session for this token")]
    SessionInvalid,

    #[error("session expired")]
    SessionExpired,

    #[error("token does not belong to '{0}'")]
    SenderMismatch(String),

    #[error("account '{0}' is disabled")]
    AccountDisabled(String),

    #[error("client '{0}' not found")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("client '{client_id}' type is {existing}, requested {requested}")]
    ClientTypeConflict {
        client_id: String,
        existing: String,
        requested: String,
    },

    #[error("credential store is already open")]
    AlreadyOpen,

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed password file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}
