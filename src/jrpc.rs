//! JSON-RPC 2.0 wire types.
//!
//! This module provides the request, response and error shapes used by the router.
//! Only the request/response half of JSON-RPC 2.0 is modelled: there are no
//! notifications and no batches, because every inbound message is answered with
//! exactly one envelope.
//!
//! # Protocol Details
//!
//! JSON-RPC 2.0 messages are JSON objects that contain:
//! - A `jsonrpc` field with the value `"2.0"`
//! - Method information (`method` field) on requests
//! - Optional parameters (`params` field)
//! - An identifier (`id` field), echoed verbatim in the response
//!
//! A response carries either a `result` or an `error`, never both. [`Response`]
//! enforces this through [`Outcome`], which is flattened into the envelope when
//! serialized.
//!
//! # Examples
//!
//! ```
//! use thread_session::jrpc::{Response, Error};
//! use serde_json::json;
//!
//! let ok = Response::new(json!({"tools": []}), json!(1));
//! assert_eq!(
//!     serde_json::to_value(&ok).unwrap(),
//!     json!({"jsonrpc": "2.0", "result": {"tools": []}, "id": 1})
//! );
//!
//! let failed: Response<serde_json::Value> =
//!     Response::err(Error::new(Error::METHOD_NOT_FOUND, "Method not found: foo".to_string(), None), json!(7));
//! assert_eq!(
//!     serde_json::to_value(&failed).unwrap(),
//!     json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found: foo"}, "id": 7})
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The protocol version string carried by every message.
pub const VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request.
///
/// This is the typed form clients build request bodies from. The server side
/// reads bodies as raw JSON instead (see [`crate::dispatch::dispatch`]), since a
/// missing or non-string `method` must still produce a "method not found"
/// envelope rather than a deserialization failure.
///
/// # Examples
///
/// ```
/// use thread_session::jrpc::Request;
/// use serde_json::json;
///
/// let json_str = r#"{"jsonrpc": "2.0", "method": "tools/list", "id": 99}"#;
/// let request: Request = serde_json::from_str(json_str).unwrap();
/// assert_eq!(request.method, "tools/list");
/// assert_eq!(request.id, json!(99));
/// assert!(request.params.is_none());
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Request {
    /// The JSON-RPC protocol version (should be "2.0")
    #[serde(default = "version")]
    pub jsonrpc: String,
    /// The name of the method to invoke
    pub method: String,
    /// Optional parameters for the method call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Caller-supplied correlation token (string, number, or null)
    #[serde(default)]
    pub id: serde_json::Value,
}

fn version() -> String {
    VERSION.to_string()
}

impl Request {
    /// Creates a new JSON-RPC 2.0 request.
    ///
    /// ```
    /// use thread_session::jrpc::Request;
    /// use serde_json::json;
    ///
    /// let params = Some(json!({"name": "echo"}));
    /// let request = Request::new("tools/call".to_string(), params, json!("req-1"));
    /// assert_eq!(request.jsonrpc, "2.0");
    /// ```
    pub fn new(method: String, params: Option<serde_json::Value>, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: version(),
            method,
            params,
            id,
        }
    }
}

/// The payload of a [`Response`]: a result on success, an error otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome<R> {
    /// The method completed and produced this value.
    #[serde(rename = "result")]
    Result(R),
    /// The method failed.
    #[serde(rename = "error")]
    Error(Error),
}

/// A JSON-RPC 2.0 response envelope.
///
/// The generic type parameter `R` is the type of the successful result. Use
/// [`Response::erase`] to convert typed responses into `Response<serde_json::Value>`
/// when several handlers must share one return type.
///
/// # Examples
///
/// ```
/// use thread_session::jrpc::{Response, Error};
/// use serde_json::json;
///
/// let typed: Response<i32> = Response::new(42, json!("req-123"));
/// assert_eq!(typed.result(), Some(&42));
/// assert!(typed.error().is_none());
///
/// let failed: Response<i32> =
///     Response::err(Error::internal_error("boom".to_string()), json!(null));
/// assert_eq!(failed.error().unwrap().code, -32603);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<R> {
    /// The JSON-RPC protocol version ("2.0")
    pub jsonrpc: String,
    /// Either the result or the error
    #[serde(flatten)]
    pub outcome: Outcome<R>,
    /// The same identifier that was in the request, or null if it could not be read
    pub id: serde_json::Value,
}

impl<R> Response<R> {
    /// Creates a successful response with the given result.
    pub fn new(result: R, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: version(),
            outcome: Outcome::Result(result),
            id,
        }
    }

    /// Creates an error response with the given error.
    pub fn err(e: Error, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: version(),
            outcome: Outcome::Error(e),
            id,
        }
    }

    /// The result, if this is a success response.
    pub fn result(&self) -> Option<&R> {
        match &self.outcome {
            Outcome::Result(r) => Some(r),
            Outcome::Error(_) => None,
        }
    }

    /// The error, if this is an error response.
    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }

    /// Converts a typed response into a response with a `serde_json::Value` result.
    ///
    /// Error responses are preserved unchanged. If the result cannot be represented
    /// as JSON, the response becomes an internal error carrying the same id.
    ///
    /// ```
    /// use thread_session::jrpc::Response;
    /// use serde_json::json;
    ///
    /// #[derive(serde::Serialize)]
    /// struct Listing { prompts: Vec<String> }
    ///
    /// let erased = Response::new(Listing { prompts: vec!["summarize".into()] }, json!(1)).erase();
    /// assert_eq!(erased.result().unwrap()["prompts"][0], json!("summarize"));
    /// ```
    pub fn erase(self) -> Response<serde_json::Value>
    where
        R: Serialize,
    {
        let outcome = match self.outcome {
            Outcome::Result(r) => match serde_json::to_value(r) {
                Ok(value) => Outcome::Result(value),
                Err(e) => Outcome::Error(Error::from_error(e)),
            },
            Outcome::Error(e) => Outcome::Error(e),
        };
        Response {
            jsonrpc: self.jsonrpc,
            outcome,
            id: self.id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
///
/// # Standard Error Codes
///
/// * `-32700` - Parse error (Invalid JSON)
/// * `-32600` - Invalid Request
/// * `-32601` - Method not found
/// * `-32602` - Invalid params
/// * `-32603` - Internal error
/// * `-32000` to `-32099` - Server error (reserved for implementation-defined errors)
///
/// ```
/// use thread_session::jrpc::Error;
///
/// let error = Error::new(Error::INVALID_PARAMS, "Tool name not provided".to_string(), None);
/// assert_eq!(error.to_string(), "Error -32602: Tool name not provided");
/// let wire = serde_json::to_string(&error).unwrap();
/// assert!(!wire.contains("data"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    /// Error code as defined in JSON-RPC 2.0 specification
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional information about the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method (or the tool it targets) does not exist.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Implementation-defined server error.
    pub const SERVER_ERROR: i32 = -32000;

    /// Creates a new error with a custom code and message.
    pub fn new(code: i32, message: String, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message,
            data,
        }
    }

    /// Creates an "Internal error" (code -32603) from a standard Rust error.
    ///
    /// ```
    /// use thread_session::jrpc::Error;
    /// use std::io;
    ///
    /// let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    /// let jrpc_error = Error::from_error(io_error);
    /// assert_eq!(jrpc_error.code, -32603);
    /// assert_eq!(jrpc_error.message, "File not found");
    /// ```
    pub fn from_error<E: std::error::Error>(error: E) -> Self {
        Self::internal_error(error.to_string())
    }

    /// Creates an "Internal error" (code -32603) with a custom message.
    pub fn internal_error(message: String) -> Self {
        Self {
            code: Self::INTERNAL_ERROR,
            message,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn success_envelope_has_no_error_key() {
        let response = Response::new(json!("ok"), json!("abc"));
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire, json!({"jsonrpc": "2.0", "result": "ok", "id": "abc"}));
        assert!(wire.get("error").is_none());
    }

    #[test]
    fn error_envelope_keeps_null_id() {
        let response: Response<serde_json::Value> = Response::err(
            Error::new(Error::PARSE_ERROR, "Parse error: eof".to_string(), None),
            serde_json::Value::Null,
        );
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire,
            json!({"jsonrpc": "2.0", "error": {"code": -32700, "message": "Parse error: eof"}, "id": null})
        );
    }

    #[test]
    fn response_reads_back_from_wire() {
        let wire = r#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"Tool execution failed: x"},"id":3}"#;
        let response: Response<serde_json::Value> = serde_json::from_str(wire).unwrap();
        assert!(response.result().is_none());
        assert_eq!(response.error().unwrap().code, Error::SERVER_ERROR);
        assert_eq!(response.id, json!(3));
    }

    #[test]
    fn request_defaults_missing_fields() {
        let request: Request = serde_json::from_str(r#"{"method":"prompts/list"}"#).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.id, serde_json::Value::Null);
    }
}
