//! Domain models shared by the trust core and its services.

pub mod authn;
