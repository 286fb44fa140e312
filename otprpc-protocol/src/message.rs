//! JSON message envelopes for requests and responses.

use crate::error::ErrorCode;
use crate::term::Term;
use serde::{Deserialize, Serialize};

/// A remote procedure call: module, function and argument terms.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    module: String,
    function: String,
    #[serde(default)]
    args: Vec<Term>,
}

impl RpcRequest {
    pub fn new(module: impl Into<String>, function: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            args,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn args(&self) -> &[Term] {
        &self.args
    }
}

/// Parameters for the HELLO handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloParams {
    pub protocol_version: u16,
    /// Name this client announces itself as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Shared secret expected by the remote node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

/// Operation-specific request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RequestBody {
    Hello(HelloParams),
    Call(RpcRequest),
    Bye,
}

/// Request message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID, echoed by the matching response.
    pub id: String,
    #[serde(flatten)]
    pub body: RequestBody,
}

impl Request {
    pub fn new(id: impl Into<String>, body: RequestBody) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }

    pub fn call(id: impl Into<String>, call: RpcRequest) -> Self {
        Self::new(id, RequestBody::Call(call))
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Refusal details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,
    pub message: String,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Response message envelope.
///
/// A delivered call always answers with `status: ok`, even when the reply term
/// itself reports a failure; `status: error` means the endpoint refused the
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Term>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: Term) -> Self {
        Self {
            id: id.into(),
            status: ResponseStatus::Ok,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, error: ResponseError) -> Self {
        Self {
            id: id.into(),
            status: ResponseStatus::Error,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }
}
