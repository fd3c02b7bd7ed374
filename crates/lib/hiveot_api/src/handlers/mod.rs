//! Request handlers: decode the wire input, call the service, encode the
//! output. Handlers are synchronous and run on the blocking pool.

pub mod admin;
pub mod user;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Decode an operation's input.
pub(crate) fn decode<T: DeserializeOwned>(input: Value) -> AppResult<T> {
    Ok(serde_json::from_value(input)?)
}

/// Encode an operation's output.
pub(crate) fn encode<T: Serialize>(output: T) -> AppResult<Value> {
    serde_json::to_value(output).map_err(|e| AppError::Internal(format!("encode output: {e}")))
}

pub(crate) fn unknown_operation(service: &str, name: &str) -> AppError {
    AppError::NotFound(format!("unknown operation '{service}.{name}'"))
}
