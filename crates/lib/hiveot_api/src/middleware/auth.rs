//! Caller authentication: resolve who is behind a request.

use hiveot_core::authn::Authenticator;
use tracing::{debug, warn};

use crate::dispatcher::Request;
use crate::error::{AppError, AppResult};

/// Identity of the caller of a request.
///
/// With a token, the token's client is the caller and a differing claimed
/// `senderID` is rejected. Without one, the transport-supplied `senderID`
/// is used. A request with neither is rejected.
pub fn resolve_caller(authn: &dyn Authenticator, request: &Request) -> AppResult<String> {
    match request.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            let identity = authn.validate_token(token)?;
            if !request.sender_id.is_empty() && request.sender_id != identity.client_id {
                warn!(
                    sender_id = %request.sender_id,
                    token_client_id = %identity.client_id,
                    "claimed sender does not match token"
                );
                return Err(AppError::NotAuthorized("sender does not match token".into()));
            }
            debug!(client_id = %identity.client_id, "caller resolved from token");
            Ok(identity.client_id)
        }
        None if !request.sender_id.is_empty() => Ok(request.sender_id.clone()),
        None => Err(AppError::NotAuthorized("no caller".into())),
    }
}
