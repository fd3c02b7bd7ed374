//! Admin service request handler.

use serde_json::Value;

use super::{decode, encode, unknown_operation};
use crate::error::AppResult;
use crate::messages::{
    ADMIN_SERVICE_ID, AddConsumerArgs, AddDeviceArgs, ClientIdArgs, ProfileOutput,
    SetClientPasswordArgs, SetClientRoleArgs, TokenOutput, UpdateClientProfileArgs,
};
use crate::services::admin::AdminService;

/// Run admin operation `name` for `sender_id`.
pub fn handle(service: &AdminService, name: &str, sender_id: &str, input: Value) -> AppResult<Value> {
    match name {
        "addConsumer" => {
            let args: AddConsumerArgs = decode(input)?;
            service.add_consumer(&args.client_id, &args.display_name, args.password.as_deref())?;
            Ok(Value::Null)
        }
        "addAgent" => {
            let args: AddDeviceArgs = decode(input)?;
            let token =
                service.add_agent(&args.client_id, &args.display_name, args.pub_key.as_deref())?;
            encode(TokenOutput { token })
        }
        "addService" => {
            let args: AddDeviceArgs = decode(input)?;
            let token =
                service.add_service(&args.client_id, &args.display_name, args.pub_key.as_deref())?;
            encode(TokenOutput { token })
        }
        "getProfiles" => encode(service.get_profiles()),
        "getClientProfile" => {
            let args: ClientIdArgs = decode(input)?;
            let profile = service.get_client_profile(&args.client_id)?;
            encode(ProfileOutput { profile })
        }
        "getSessions" => encode(service.get_sessions()),
        "newAgentToken" => {
            let args: ClientIdArgs = decode(input)?;
            let token = service.new_agent_token(&args.client_id)?;
            encode(TokenOutput { token })
        }
        "removeClient" => {
            let args: ClientIdArgs = decode(input)?;
            service.remove_client(&args.client_id)?;
            Ok(Value::Null)
        }
        "setClientPassword" => {
            let args: SetClientPasswordArgs = decode(input)?;
            service.set_client_password(&args.client_id, &args.password)?;
            Ok(Value::Null)
        }
        "setClientRole" => {
            let args: SetClientRoleArgs = decode(input)?;
            service.set_client_role(&args.client_id, &args.role)?;
            Ok(Value::Null)
        }
        "updateClientProfile" => {
            let args: UpdateClientProfileArgs = decode(input)?;
            service.update_client_profile(sender_id, &args.profile)?;
            Ok(Value::Null)
        }
        other => Err(unknown_operation(ADMIN_SERVICE_ID, other)),
    }
}
