//! Application error types.
//!
//! [`AppError`] is the stable taxonomy callers see. Core errors are mapped
//! onto it at the service boundary; internal causes are logged and replaced
//! by a generic message on the wire.

use hiveot_core::authn::AuthnError;
use hiveot_core::authz::UnknownRole;
use hiveot_core::keys::KeyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Convenience alias for service return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with a stable wire code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("session invalid")]
    SessionInvalid,

    #[error("session expired")]
    SessionExpired,

    #[error("account disabled: {0}")]
    AccountDisabled(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error")]
    Internal(String),
}

impl AppError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationFailed => "authentication-failed",
            AppError::InvalidToken(_) => "invalid-token",
            AppError::SessionInvalid => "session-invalid",
            AppError::SessionExpired => "session-expired",
            AppError::AccountDisabled(_) => "account-disabled",
            AppError::NotAuthorized(_) => "not-authorized",
            AppError::NotFound(_) => "not-found",
            AppError::InvalidArgument(_) => "invalid-argument",
            AppError::Conflict(_) => "conflict",
            AppError::DeadlineExceeded => "deadline-exceeded",
            AppError::Internal(_) => "internal",
        }
    }

    /// Message safe to return to a caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".into(),
            // Token problems are not itemised for callers.
            AppError::InvalidToken(_) => "invalid token".into(),
            // Client IDs and downstream detail stay in the logs.
            AppError::NotFound(_) => "not found".into(),
            AppError::NotAuthorized(_) => "not authorized".into(),
            other => other.to_string(),
        }
    }
}

/// Error body of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(e: &AppError) -> Self {
        if let AppError::Internal(cause) = e {
            error!(cause = %cause, "internal error");
        }
        ErrorResponse {
            error: e.code().to_string(),
            message: e.public_message(),
        }
    }
}

impl From<AuthnError> for AppError {
    fn from(e: AuthnError) -> Self {
        match e {
            AuthnError::AuthenticationFailed => AppError::AuthenticationFailed,
            AuthnError::InvalidToken(msg) => AppError::InvalidToken(msg),
            AuthnError::SessionInvalid => AppError::SessionInvalid,
            AuthnError::SessionExpired => AppError::SessionExpired,
            AuthnError::SenderMismatch(sender) => {
                AppError::NotAuthorized(format!("token does not belong to '{sender}'"))
            }
            AuthnError::AccountDisabled(id) => AppError::AccountDisabled(id),
            AuthnError::NotFound(id) => AppError::NotFound(format!("client '{id}'")),
            AuthnError::InvalidArgument(msg) => AppError::InvalidArgument(msg),
            e @ AuthnError::ClientTypeConflict { .. } => AppError::Conflict(e.to_string()),
            AuthnError::Key(e) => AppError::from(e),
            e @ (AuthnError::AlreadyOpen
            | AuthnError::Io { .. }
            | AuthnError::Parse { .. }
            | AuthnError::Internal(_)) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<KeyError> for AppError {
    fn from(e: KeyError) -> Self {
        match e {
            e @ KeyError::Io { .. } => AppError::Internal(e.to_string()),
            e => AppError::InvalidArgument(e.to_string()),
        }
    }
}

impl From<UnknownRole> for AppError {
    fn from(e: UnknownRole) -> Self {
        AppError::InvalidArgument(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InvalidArgument(format!("malformed input: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_hides_cause() {
        let e = AppError::from(AuthnError::Internal("disk on fire".into()));
        let body = ErrorResponse::from(&e);
        assert_eq!(body.error, "internal");
        assert!(!body.message.contains("disk"));
    }

    #[test]
    fn core_errors_map_to_taxonomy() {
        let cases = [
            (AuthnError::AuthenticationFailed, "authentication-failed"),
            (AuthnError::SessionInvalid, "session-invalid"),
            (AuthnError::SessionExpired, "session-expired"),
            (AuthnError::SenderMismatch("bob".into()), "not-authorized"),
            (AuthnError::AccountDisabled("bob".into()), "account-disabled"),
            (AuthnError::NotFound("bob".into()), "not-found"),
            (AuthnError::InvalidArgument("x".into()), "invalid-argument"),
            (
                AuthnError::ClientTypeConflict {
                    client_id: "bob".into(),
                    existing: "agent".into(),
                    requested: "consumer".into(),
                },
                "conflict",
            ),
            (AuthnError::Key(KeyError::UnknownFormat), "invalid-argument"),
        ];
        for (core, code) in cases {
            assert_eq!(AppError::from(core).code(), code);
        }
    }

    #[test]
    fn not_found_and_not_authorized_use_fixed_messages() {
        let missing = AppError::from(AuthnError::NotFound("alice".into()));
        let body = ErrorResponse::from(&missing);
        assert_eq!(body.error, "not-found");
        assert_eq!(body.message, "not found");

        let denied = AppError::NotAuthorized("publishRpc on 'admin' by bob".into());
        let body = ErrorResponse::from(&denied);
        assert_eq!(body.error, "not-authorized");
        assert!(!body.message.contains("bob"));
    }

    #[test]
    fn client_type_conflict_reads_naturally() {
        let e = AppError::from(AuthnError::ClientTypeConflict {
            client_id: "temp01".into(),
            existing: "agent".into(),
            requested: "consumer".into(),
        });
        assert_eq!(e.code(), "conflict");
        assert_eq!(
            e.public_message(),
            "conflict: client 'temp01' type is agent, requested consumer"
        );
    }

    #[test]
    fn token_reason_is_not_returned() {
        let e = AppError::from(AuthnError::InvalidToken("signature verification failed".into()));
        assert_eq!(ErrorResponse::from(&e).message, "invalid token");
    }
}
