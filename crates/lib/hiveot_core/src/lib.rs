//! # hiveot_core
//!
//! Trust core of the HiveOT Hub.
//!
//! Holds everything the hub needs to decide who a caller is and what it may
//! do: the credential store, the key manager, the session manager, the token
//! authenticators and the authorization engine. Transports and services live
//! in `hiveot_api`.

pub mod authn;
pub mod authz;
pub mod clock;
pub mod keys;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
