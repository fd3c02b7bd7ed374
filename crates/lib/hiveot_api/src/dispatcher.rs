//! Request dispatcher.
//!
//! Transports decode their wire format into a [`Request`] and hand it to a
//! [`RequestHandler`]. The [`Dispatcher`] authenticates the caller, checks
//! the caller's role, and routes admin and user RPCs to their services.
//! Anything else is forwarded to an optional downstream handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hiveot_core::authz::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::CoreContext;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::handlers;
use crate::messages::{ADMIN_SERVICE_ID, USER_SERVICE_ID};
use crate::middleware::auth::resolve_caller;
use crate::services::admin::AdminService;
use crate::services::user::UserService;

/// Transport-neutral request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(rename = "requestID", default)]
    pub request_id: String,
    pub operation: Operation,
    #[serde(rename = "thingID")]
    pub thing_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "senderID", default)]
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub input: Value,
}

impl Request {
    /// RPC request for a `thing.name` method, e.g. `admin.addConsumer`.
    pub fn rpc(method: &str, sender_id: &str, input: Value) -> Self {
        let (thing_id, name) = method.split_once('.').unwrap_or((method, ""));
        Self {
            request_id: String::new(),
            operation: Operation::PublishRpc,
            thing_id: thing_id.to_string(),
            name: name.to_string(),
            sender_id: sender_id.to_string(),
            token: None,
            input,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Result of a request: either `output` or `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl Response {
    pub fn ok(request_id: impl Into<String>, output: Value) -> Self {
        Self {
            request_id: request_id.into(),
            output: Some(output),
            error: None,
        }
    }

    pub fn err(request_id: impl Into<String>, error: &AppError) -> Self {
        Self {
            request_id: request_id.into(),
            output: None,
            error: Some(ErrorResponse::from(error)),
        }
    }

    /// Wire code of the error, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.error.as_str())
    }
}

/// Anything that answers requests: the dispatcher itself, or a hub router
/// it forwards to.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, request: Request) -> Response;
}

/// Admits and routes requests.
pub struct Dispatcher {
    ctx: Arc<CoreContext>,
    admin: AdminService,
    user: UserService,
    downstream: Option<Arc<dyn RequestHandler>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self {
            admin: AdminService::new(ctx.clone()),
            user: UserService::new(ctx.clone()),
            timeout: ctx.config.request_timeout,
            downstream: None,
            ctx,
        }
    }

    /// Forward admitted requests for other things to `handler`.
    pub fn with_downstream(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.downstream = Some(handler);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn dispatch(&self, mut request: Request) -> AppResult<Value> {
        let is_rpc = request.operation == Operation::PublishRpc;
        if is_rpc && request.thing_id == USER_SERVICE_ID && request.name == "login" {
            let user = self.user.clone();
            let input = std::mem::take(&mut request.input);
            return run_blocking(move || handlers::user::login(&user, input)).await;
        }

        let caller = resolve_caller(self.ctx.authn.as_ref(), &request)?;
        if !self
            .ctx
            .authz
            .has_permission(&caller, request.operation, &request.thing_id)
        {
            warn!(
                client_id = %caller,
                operation = %request.operation,
                thing_id = %request.thing_id,
                "request denied"
            );
            return Err(AppError::NotAuthorized(format!(
                "{} on '{}'",
                request.operation, request.thing_id
            )));
        }
        debug!(
            client_id = %caller,
            operation = %request.operation,
            thing_id = %request.thing_id,
            name = %request.name,
            "request admitted"
        );

        let thing_id = request.thing_id.clone();
        match (is_rpc, thing_id.as_str()) {
            (true, ADMIN_SERVICE_ID) => {
                let admin = self.admin.clone();
                run_blocking(move || {
                    handlers::admin::handle(&admin, &request.name, &caller, request.input)
                })
                .await
            }
            (true, USER_SERVICE_ID) => {
                let user = self.user.clone();
                run_blocking(move || {
                    handlers::user::handle(&user, &request.name, &caller, request.input)
                })
                .await
            }
            _ => match &self.downstream {
                Some(next) => {
                    request.sender_id = caller;
                    let response = next.handle_request(request).await;
                    match response.error {
                        Some(e) => Err(downstream_error(e)),
                        None => Ok(response.output.unwrap_or(Value::Null)),
                    }
                }
                None => Err(AppError::NotFound(format!(
                    "no handler for thing '{thing_id}'"
                ))),
            },
        }
    }
}

#[async_trait]
impl RequestHandler for Dispatcher {
    async fn handle_request(&self, request: Request) -> Response {
        let request_id = request.request_id.clone();
        match tokio::time::timeout(self.timeout, self.dispatch(request)).await {
            Ok(Ok(output)) => Response::ok(request_id, output),
            Ok(Err(e)) => {
                debug!(request_id = %request_id, code = e.code(), error = %e, "request failed");
                Response::err(request_id, &e)
            }
            Err(_) => {
                warn!(request_id = %request_id, "request deadline exceeded");
                Response::err(request_id, &AppError::DeadlineExceeded)
            }
        }
    }
}

/// Run a service call on the blocking pool.
async fn run_blocking<F>(f: F) -> AppResult<Value>
where
    F: FnOnce() -> AppResult<Value> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("service task failed: {e}")))?
}

/// Carry a downstream error code through unchanged.
fn downstream_error(e: ErrorResponse) -> AppError {
    match e.error.as_str() {
        "not-authorized" => AppError::NotAuthorized(e.message),
        "not-found" => AppError::NotFound(e.message),
        "invalid-argument" => AppError::InvalidArgument(e.message),
        "deadline-exceeded" => AppError::DeadlineExceeded,
        _ => AppError::Internal(format!("downstream {}: {}", e.error, e.message)),
    }
}
