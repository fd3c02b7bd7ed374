//! Role based authorization.
//!
//! Each role carries a list of [`RolePermission`] rules. A request is
//! admitted when one rule of the caller's role matches the operation's
//! message type, direction and target thing. Clients without a role, or
//! with a role this module does not know, are denied everything.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Placeholder substituted with the caller's clientID at check time.
pub const CLIENT_ID_PLACEHOLDER: &str = "{clientID}";

/// Resolves the role of a client.
pub trait RoleLookup: Send + Sync {
    /// `None` when the client is unknown.
    fn client_role(&self, client_id: &str) -> Option<String>;
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

/// Predefined roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    None,
    Viewer,
    Operator,
    Manager,
    Admin,
    Agent,
    Service,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::None,
        Role::Viewer,
        Role::Operator,
        Role::Manager,
        Role::Admin,
        Role::Agent,
        Role::Service,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Viewer => "viewer",
            Role::Operator => "operator",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::Service => "service",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Role::None),
            "viewer" => Ok(Role::Viewer),
            "operator" => Ok(Role::Operator),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "agent" => Ok(Role::Agent),
            "service" => Ok(Role::Service),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Kind of message an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Event,
    Action,
    Config,
    Rpc,
}

/// Operation on a thing, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    SubscribeEvent,
    PublishEvent,
    PublishAction,
    SubscribeAction,
    WriteProperty,
    SubscribeConfig,
    PublishRpc,
    SubscribeRpc,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::SubscribeEvent,
        Operation::PublishEvent,
        Operation::PublishAction,
        Operation::SubscribeAction,
        Operation::WriteProperty,
        Operation::SubscribeConfig,
        Operation::PublishRpc,
        Operation::SubscribeRpc,
    ];

    pub fn message_type(&self) -> MessageType {
        match self {
            Operation::SubscribeEvent | Operation::PublishEvent => MessageType::Event,
            Operation::PublishAction | Operation::SubscribeAction => MessageType::Action,
            Operation::WriteProperty | Operation::SubscribeConfig => MessageType::Config,
            Operation::PublishRpc | Operation::SubscribeRpc => MessageType::Rpc,
        }
    }

    pub fn is_publish(&self) -> bool {
        matches!(
            self,
            Operation::PublishEvent
                | Operation::PublishAction
                | Operation::WriteProperty
                | Operation::PublishRpc
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SubscribeEvent => "subscribeEvent",
            Operation::PublishEvent => "publishEvent",
            Operation::PublishAction => "publishAction",
            Operation::SubscribeAction => "subscribeAction",
            Operation::WriteProperty => "writeProperty",
            Operation::SubscribeConfig => "subscribeConfig",
            Operation::PublishRpc => "publishRpc",
            Operation::SubscribeRpc => "subscribeRpc",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// One permission rule of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermission {
    pub message_type: MessageType,
    /// Empty matches any thing.
    pub thing_pattern: String,
    pub allow_pub: bool,
    pub allow_sub: bool,
}

impl RolePermission {
    fn new(message_type: MessageType, allow_pub: bool, allow_sub: bool) -> Self {
        Self {
            message_type,
            thing_pattern: String::new(),
            allow_pub,
            allow_sub,
        }
    }

    fn publish(message_type: MessageType) -> Self {
        Self::new(message_type, true, false)
    }

    fn subscribe(message_type: MessageType) -> Self {
        Self::new(message_type, false, true)
    }

    fn on(mut self, thing_pattern: &str) -> Self {
        self.thing_pattern = thing_pattern.to_string();
        self
    }

    pub fn matches(&self, client_id: &str, operation: Operation, thing_id: &str) -> bool {
        if self.message_type != operation.message_type() {
            return false;
        }
        let allowed = if operation.is_publish() {
            self.allow_pub
        } else {
            self.allow_sub
        };
        if !allowed {
            return false;
        }
        self.thing_pattern.is_empty()
            || self.thing_pattern.replace(CLIENT_ID_PLACEHOLDER, client_id) == thing_id
    }
}

/// The built-in role table.
pub fn default_role_permissions() -> HashMap<Role, Vec<RolePermission>> {
    use MessageType::*;

    let viewer = vec![RolePermission::subscribe(Event)];
    let mut operator = viewer.clone();
    operator.push(RolePermission::publish(Action));
    let mut manager = operator.clone();
    manager.push(RolePermission::publish(Config));
    let mut admin = manager.clone();
    admin.push(RolePermission::publish(Rpc));

    let agent = vec![
        RolePermission::publish(Event).on(CLIENT_ID_PLACEHOLDER),
        RolePermission::subscribe(Action).on(CLIENT_ID_PLACEHOLDER),
        RolePermission::subscribe(Config).on(CLIENT_ID_PLACEHOLDER),
    ];
    let mut service = admin.clone();
    service.extend([
        RolePermission::publish(Event).on(CLIENT_ID_PLACEHOLDER),
        RolePermission::subscribe(Action).on(CLIENT_ID_PLACEHOLDER),
        RolePermission::subscribe(Rpc).on(CLIENT_ID_PLACEHOLDER),
    ]);

    HashMap::from([
        (Role::None, Vec::new()),
        (Role::Viewer, viewer),
        (Role::Operator, operator),
        (Role::Manager, manager),
        (Role::Admin, admin),
        (Role::Agent, agent),
        (Role::Service, service),
    ])
}

/// Authorization engine.
pub struct Authorizer {
    permissions: RwLock<HashMap<Role, Vec<RolePermission>>>,
    roles: Arc<dyn RoleLookup>,
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("roles", &self.permissions.read().len())
            .finish()
    }
}

impl Authorizer {
    /// Authorizer with the built-in role table.
    pub fn new(roles: Arc<dyn RoleLookup>) -> Self {
        Self::with_permissions(roles, default_role_permissions())
    }

    pub fn with_permissions(
        roles: Arc<dyn RoleLookup>,
        permissions: HashMap<Role, Vec<RolePermission>>,
    ) -> Self {
        Self {
            permissions: RwLock::new(permissions),
            roles,
        }
    }

    /// Check whether `client_id` may perform `operation` on `thing_id`.
    pub fn has_permission(&self, client_id: &str, operation: Operation, thing_id: &str) -> bool {
        let Some(role_name) = self.roles.client_role(client_id) else {
            debug!(client_id, "denied: unknown client");
            return false;
        };
        let role = match role_name.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                debug!(client_id, error = %e, "denied");
                return false;
            }
        };
        let allowed = self.has_role_permission(role, client_id, operation, thing_id);
        if !allowed {
            debug!(client_id, %role, %operation, thing_id, "denied by role");
        }
        allowed
    }

    /// Pure role check without a client lookup.
    pub fn has_role_permission(
        &self,
        role: Role,
        client_id: &str,
        operation: Operation,
        thing_id: &str,
    ) -> bool {
        self.permissions
            .read()
            .get(&role)
            .is_some_and(|rules| rules.iter().any(|r| r.matches(client_id, operation, thing_id)))
    }

    /// Let `roles` publish RPC requests to the service `thing_id`.
    pub fn set_service_permissions(&self, thing_id: &str, roles: &[Role]) {
        let rule = RolePermission::publish(MessageType::Rpc).on(thing_id);
        let mut permissions = self.permissions.write();
        for role in roles {
            let rules = permissions.entry(*role).or_default();
            if !rules.contains(&rule) {
                rules.push(rule.clone());
            }
        }
        info!(thing_id, ?roles, "service permissions set");
    }
}
