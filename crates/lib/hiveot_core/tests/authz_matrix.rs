//! Full role x operation matrix of the built-in permission table.

use std::collections::HashMap;
use std::sync::Arc;

use hiveot_core::authz::{Authorizer, Operation, Role, RoleLookup};

struct OneClientPerRole;

impl RoleLookup for OneClientPerRole {
    fn client_role(&self, client_id: &str) -> Option<String> {
        // Each client is named after its role.
        Some(client_id.to_string())
    }
}

/// Expected (allowed on any thing, allowed on own thing) per role and operation.
fn expected() -> HashMap<(Role, Operation), (bool, bool)> {
    use Operation::*;
    use Role::{Admin, Agent, Manager, Operator, Service, Viewer};

    let mut table = HashMap::new();
    for role in Role::ALL {
        for op in Operation::ALL {
            table.insert((role, op), (false, false));
        }
    }
    let any = (true, true);
    let own = (false, true);
    for role in [Viewer, Operator, Manager, Admin, Service] {
        table.insert((role, SubscribeEvent), any);
    }
    for role in [Operator, Manager, Admin, Service] {
        table.insert((role, PublishAction), any);
    }
    for role in [Manager, Admin, Service] {
        table.insert((role, WriteProperty), any);
    }
    for role in [Admin, Service] {
        table.insert((role, PublishRpc), any);
    }
    table.insert((Agent, PublishEvent), own);
    table.insert((Agent, SubscribeAction), own);
    table.insert((Agent, SubscribeConfig), own);
    table.insert((Service, PublishEvent), own);
    table.insert((Service, SubscribeAction), own);
    table.insert((Service, SubscribeRpc), own);
    table
}

#[test]
fn every_role_and_operation_matches_the_table() {
    let authz = Authorizer::new(Arc::new(OneClientPerRole));
    for ((role, op), (on_any, on_own)) in expected() {
        let client = role.as_str();
        assert_eq!(
            authz.has_permission(client, op, "some-thing"),
            on_any,
            "{role} {op} on other thing"
        );
        assert_eq!(
            authz.has_permission(client, op, client),
            on_own,
            "{role} {op} on own thing"
        );
    }
}

#[test]
fn unknown_role_is_denied_everything() {
    let authz = Authorizer::new(Arc::new(OneClientPerRole));
    for op in Operation::ALL {
        assert!(!authz.has_permission("superuser", op, "superuser"));
        assert!(!authz.has_permission("", op, "thing"));
    }
}
