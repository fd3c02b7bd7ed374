//! User service request handler.

use serde_json::Value;

use super::{decode, encode, unknown_operation};
use crate::error::AppResult;
use crate::messages::{
    LoginArgs, ProfileOutput, RefreshTokenArgs, TokenOutput, USER_SERVICE_ID, UpdateNameArgs,
    UpdatePasswordArgs, UpdatePubKeyArgs,
};
use crate::services::user::UserService;

/// Run `user.login`. This is the one operation without a known caller.
pub fn login(service: &UserService, input: Value) -> AppResult<Value> {
    let args: LoginArgs = decode(input)?;
    let token = service.login(&args.client_id, &args.password)?;
    encode(TokenOutput { token })
}

/// Run user operation `name` on behalf of `sender_id`.
pub fn handle(service: &UserService, name: &str, sender_id: &str, input: Value) -> AppResult<Value> {
    match name {
        "login" => login(service, input),
        "logout" => {
            service.logout(sender_id);
            Ok(Value::Null)
        }
        "refreshToken" => {
            let args: RefreshTokenArgs = decode(input)?;
            let token = service.refresh_token(sender_id, &args.old_token)?;
            encode(TokenOutput { token })
        }
        "getProfile" => {
            let profile = service.get_profile(sender_id)?;
            encode(ProfileOutput { profile })
        }
        "updateName" => {
            let args: UpdateNameArgs = decode(input)?;
            service.update_name(sender_id, &args.new_name)?;
            Ok(Value::Null)
        }
        "updatePassword" => {
            let args: UpdatePasswordArgs = decode(input)?;
            service.update_password(sender_id, &args.new_password)?;
            Ok(Value::Null)
        }
        "updatePubKey" => {
            let args: UpdatePubKeyArgs = decode(input)?;
            service.update_pub_key(sender_id, &args.pub_key_pem)?;
            Ok(Value::Null)
        }
        other => Err(unknown_operation(USER_SERVICE_ID, other)),
    }
}
