//! Request dispatch.
//!
//! [`dispatch`] turns one JSON-RPC body into exactly one [`Reply`]. Checks run in
//! a fixed order and stop at the first failure:
//!
//! 1. a non-empty session identifier is present,
//! 2. the body is JSON,
//! 3. the body is a JSON object,
//! 4. the method is one of [`crate::mcp::Method`].
//!
//! The recognized method then either enumerates the [`ToolHost`] or invokes one
//! of its tools. Every path, including every failure, ends in an envelope; no
//! error or tool panic escapes to the caller.
//!
//! [`Router`] puts admission in front of dispatch: it extracts the identifier
//! from headers, asks the [`AdmissionPolicy`], and only then dispatches.

use crate::admission::{AdmissionPolicy, extract_session_id};
use crate::http::Headers;
use crate::jrpc::{Error, Response};
use crate::mcp::tools::{ToolCallParams, ToolCallResponse, ToolContent, ToolHost, ToolList};
use crate::mcp::{Method, PromptList};
use logwise::privacy::LogIt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Every way a dispatch can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The request carried no session identifier.
    #[error("No session ID provided in headers")]
    MissingSession,
    /// Strict admission refused an identifier that was never registered.
    #[error("Session not found: {0}")]
    UnknownSession(String),
    /// The body is not JSON.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The body is JSON but not a request object.
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    InvalidParams(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    /// The tool's handler reported a failure.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// The JSON-RPC error code reported for this failure.
    pub fn code(&self) -> i32 {
        match self {
            DispatchError::MissingSession
            | DispatchError::UnknownSession(_)
            | DispatchError::ToolExecution(_) => Error::SERVER_ERROR,
            DispatchError::Parse(_) => Error::PARSE_ERROR,
            DispatchError::InvalidRequest(_) => Error::INVALID_REQUEST,
            DispatchError::InvalidParams(_) => Error::INVALID_PARAMS,
            // unknown tools share the "unknown target" code with unknown methods
            DispatchError::MethodNotFound(_) | DispatchError::ToolNotFound(_) => {
                Error::METHOD_NOT_FOUND
            }
            DispatchError::Internal(_) => Error::INTERNAL_ERROR,
        }
    }

    /// The HTTP status a transport should send with this failure.
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::MissingSession
            | DispatchError::Parse(_)
            | DispatchError::InvalidRequest(_)
            | DispatchError::InvalidParams(_) => 400,
            DispatchError::UnknownSession(_)
            | DispatchError::MethodNotFound(_)
            | DispatchError::ToolNotFound(_) => 404,
            DispatchError::ToolExecution(_) | DispatchError::Internal(_) => 500,
        }
    }

    /// True for failures on our side (or the tool's) rather than the caller's.
    pub fn is_server_fault(&self) -> bool {
        self.status() >= 500
    }
}

impl From<DispatchError> for Error {
    fn from(value: DispatchError) -> Self {
        Error::new(value.code(), value.to_string(), None)
    }
}

/// A finished dispatch: the envelope and the transport status to send it with.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub response: Response<Value>,
}

impl Reply {
    fn success<R: Serialize>(result: R, id: Value) -> Self {
        let response = Response::new(result, id).erase();
        // erase() only fails if the result has no JSON form
        let status = if response.error().is_some() { 500 } else { 200 };
        Reply { status, response }
    }

    fn failure(error: DispatchError, id: Value) -> Self {
        if error.is_server_fault() {
            logwise::error_sync!("Dispatch failed: {error}", error = LogIt(&error));
        } else {
            logwise::warn_sync!("Rejected request: {error}", error = LogIt(&error));
        }
        Reply {
            status: error.status(),
            response: Response::err(error.into(), id),
        }
    }
}

/// Dispatches one request body on behalf of `session_id`.
///
/// The dispatcher keeps no state between calls and may be called concurrently.
///
/// ```
/// use thread_session::dispatch::dispatch;
/// use thread_session::mcp::tools::ToolRegistry;
/// use serde_json::json;
///
/// let host = ToolRegistry::new();
/// let reply = dispatch(Some("thread-1"), br#"{"method": "foo/bar", "id": 7}"#, &host);
/// assert_eq!(reply.status, 404);
/// assert_eq!(
///     serde_json::to_value(&reply.response).unwrap(),
///     json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found: foo/bar"}, "id": 7})
/// );
/// ```
pub fn dispatch(session_id: Option<&str>, body: &[u8], host: &dyn ToolHost) -> Reply {
    let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
        return Reply::failure(DispatchError::MissingSession, Value::Null);
    };
    let request: Value = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => return Reply::failure(DispatchError::Parse(e.to_string()), Value::Null),
    };
    let Value::Object(mut request) = request else {
        return Reply::failure(
            DispatchError::InvalidRequest("expected a single request object".to_string()),
            Value::Null,
        );
    };
    let id = request.remove("id").unwrap_or(Value::Null);
    let method = match request.remove("method") {
        Some(Value::String(method)) => method,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let params = match request.remove("params") {
        Some(Value::Null) | None => Value::Object(serde_json::Map::new()),
        Some(params) => params,
    };
    logwise::info_sync!(
        "Thread session {session}: {method}",
        session = LogIt(&session_id),
        method = LogIt(&method)
    );

    match Method::parse(&method) {
        Some(Method::ToolsList) => Reply::success(ToolList::from_host(host), id),
        Some(Method::PromptsList) => Reply::success(PromptList::from_host(host), id),
        Some(Method::ToolsCall) => match call_tool(params, host) {
            Ok(response) => Reply::success(response, id),
            Err(e) => Reply::failure(e, id),
        },
        None => Reply::failure(DispatchError::MethodNotFound(method), id),
    }
}

/// Runs `tools/call`.
///
/// The handler runs with no lock held. A handler error becomes
/// [`DispatchError::ToolExecution`]; a handler panic becomes
/// [`DispatchError::Internal`].
fn call_tool(params: Value, host: &dyn ToolHost) -> Result<ToolCallResponse, DispatchError> {
    let params: ToolCallParams = serde_json::from_value(params)
        .map_err(|e| DispatchError::InvalidParams(format!("Invalid params: {e}")))?;
    let name = params
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DispatchError::InvalidParams("Tool name not provided".to_string()))?;
    let tool = host.get_tool(&name).ok_or(DispatchError::ToolNotFound(name))?;
    let arguments = params.arguments.unwrap_or_default();

    match panic::catch_unwind(AssertUnwindSafe(|| tool.call(arguments))) {
        Ok(Ok(value)) => Ok(ToolCallResponse::new(vec![ToolContent::from_value(value)])),
        Ok(Err(e)) => Err(DispatchError::ToolExecution(e.message().to_string())),
        Err(payload) => Err(DispatchError::Internal(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_string()
    }
}

/// Admission followed by dispatch.
///
/// ```
/// use std::sync::Arc;
/// use thread_session::admission::{AdmissionMode, AdmissionPolicy, ModeSwitch};
/// use thread_session::dispatch::Router;
/// use thread_session::http::Headers;
/// use thread_session::mcp::tools::ToolRegistry;
/// use thread_session::session::SessionRegistry;
///
/// let policy = AdmissionPolicy::new(
///     Arc::new(SessionRegistry::new()),
///     ModeSwitch::Fixed(AdmissionMode::Bypass),
/// );
/// let router = Router::new(policy, Arc::new(ToolRegistry::new()));
///
/// let mut headers = Headers::new();
/// headers.insert("X-Session-ID", "thread-1");
/// let reply = router.handle(&headers, br#"{"method": "tools/list", "id": 1}"#);
/// assert_eq!(reply.status, 200);
/// assert!(router.policy().registry().contains("thread-1"));
/// ```
#[derive(Clone)]
pub struct Router {
    policy: AdmissionPolicy,
    host: Arc<dyn ToolHost>,
}

impl Router {
    pub fn new(policy: AdmissionPolicy, host: Arc<dyn ToolHost>) -> Self {
        Router { policy, host }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn host(&self) -> &Arc<dyn ToolHost> {
        &self.host
    }

    /// Handles one request: headers carry the session identifier, `body` the JSON-RPC request.
    ///
    /// A request without an identifier is rejected before the policy is consulted,
    /// so it never registers anything.
    pub fn handle(&self, headers: &Headers, body: &[u8]) -> Reply {
        let Some(session_id) = extract_session_id(headers) else {
            return Reply::failure(DispatchError::MissingSession, Value::Null);
        };
        if !self.policy.is_valid(Some(session_id)) {
            return Reply::failure(
                DispatchError::UnknownSession(session_id.to_string()),
                Value::Null,
            );
        }
        dispatch(Some(session_id), body, self.host.as_ref())
    }

    /// Forgets every registered session.
    pub fn clear_sessions(&self) {
        self.policy.registry().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tools::{FnTool, ToolCallError, ToolRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn host() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(FnTool::new("echo", |args| {
                Ok(args.get("text").cloned().unwrap_or(Value::Null))
            }))
            .with_tool(FnTool::new("stats", |_| Ok(json!({"rows": 3}))))
            .with_tool(FnTool::new("broken", |_| Err(ToolCallError::new("disk full"))))
            .with_tool(FnTool::new("panics", |_| panic!("handler exploded")))
            .with_prompt("summarize")
    }

    fn wire(reply: &Reply) -> Value {
        serde_json::to_value(&reply.response).unwrap()
    }

    #[test]
    fn missing_session_wins_over_bad_body() {
        for session in [None, Some("")] {
            let reply = dispatch(session, b"not json", &host());
            assert_eq!(reply.status, 400);
            assert_eq!(
                wire(&reply),
                json!({"jsonrpc": "2.0", "error": {"code": -32000, "message": "No session ID provided in headers"}, "id": null})
            );
        }
    }

    #[test]
    fn parse_error_has_null_id() {
        let reply = dispatch(Some("s"), br#"{"method": "tools/list", "id": 4"#, &host());
        assert_eq!(reply.status, 400);
        assert_eq!(reply.response.error().unwrap().code, -32700);
        assert!(reply.response.error().unwrap().message.starts_with("Parse error: "));
        assert_eq!(reply.response.id, Value::Null);
    }

    #[test]
    fn non_object_body_is_invalid_request() {
        let reply = dispatch(Some("s"), br#"[{"method": "tools/list", "id": 1}]"#, &host());
        assert_eq!(reply.status, 400);
        assert_eq!(reply.response.error().unwrap().code, -32600);
        assert_eq!(reply.response.id, Value::Null);
    }

    #[test]
    fn missing_method_is_not_found() {
        let reply = dispatch(Some("s"), br#"{"id": "x"}"#, &host());
        assert_eq!(reply.status, 404);
        assert_eq!(reply.response.error().unwrap().message, "Method not found: ");
        assert_eq!(reply.response.id, json!("x"));
    }

    #[test]
    fn tools_list_reports_every_tool_in_order() {
        let reply = dispatch(Some("s"), br#"{"method": "tools/list", "id": 1}"#, &host());
        assert_eq!(reply.status, 200);
        let names: Vec<Value> = wire(&reply)["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("echo"), json!("stats"), json!("broken"), json!("panics")]);
        assert_eq!(wire(&reply)["result"]["tools"][0]["description"], json!("Tool: echo"));
    }

    #[test]
    fn tool_text_result_is_verbatim() {
        let body = br#"{"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}},"id":1}"#;
        let reply = dispatch(Some("s"), body, &host());
        assert_eq!(
            wire(&reply),
            json!({"jsonrpc": "2.0", "result": {"content": [{"type": "text", "text": "hi"}]}, "id": 1})
        );
    }

    #[test]
    fn tool_structured_result_is_serialized() {
        let body = br#"{"method":"tools/call","params":{"name":"stats"},"id":"r"}"#;
        let reply = dispatch(Some("s"), body, &host());
        assert_eq!(wire(&reply)["result"]["content"][0]["text"], json!(r#"{"rows":3}"#));
        assert_eq!(reply.response.id, json!("r"));
    }

    #[test]
    fn tool_call_without_name_is_invalid_params() {
        for body in [
            &br#"{"method":"tools/call","id":5}"#[..],
            &br#"{"method":"tools/call","params":{"name":""},"id":5}"#[..],
        ] {
            let reply = dispatch(Some("s"), body, &host());
            assert_eq!(reply.status, 400);
            assert_eq!(
                wire(&reply),
                json!({"jsonrpc": "2.0", "error": {"code": -32602, "message": "Tool name not provided"}, "id": 5})
            );
        }
    }

    #[test]
    fn malformed_arguments_are_invalid_params() {
        let body = br#"{"method":"tools/call","params":{"name":"echo","arguments":[1,2]},"id":6}"#;
        let reply = dispatch(Some("s"), body, &host());
        assert_eq!(reply.response.error().unwrap().code, -32602);
        assert_eq!(reply.response.id, json!(6));
    }

    #[test]
    fn unknown_tool_is_not_found() {
        let body = br#"{"method":"tools/call","params":{"name":"ghost"},"id":2}"#;
        let reply = dispatch(Some("s"), body, &host());
        assert_eq!(reply.status, 404);
        let error = reply.response.error().unwrap();
        assert_eq!(error.code, -32601);
        assert!(error.message.contains("ghost"));
    }

    #[test]
    fn tool_failure_is_isolated() {
        let host = host();
        let body = br#"{"method":"tools/call","params":{"name":"broken"},"id":3}"#;
        let reply = dispatch(Some("s"), body, &host);
        assert_eq!(reply.status, 500);
        assert_eq!(
            wire(&reply),
            json!({"jsonrpc": "2.0", "error": {"code": -32000, "message": "Tool execution failed: disk full"}, "id": 3})
        );
        // the dispatcher keeps serving afterwards
        let again = dispatch(Some("s"), br#"{"method":"prompts/list","id":4}"#, &host);
        assert_eq!(wire(&again)["result"], json!({"prompts": [{"name": "summarize"}]}));
    }

    #[test]
    fn tool_panic_becomes_internal_error() {
        let body = br#"{"method":"tools/call","params":{"name":"panics"},"id":8}"#;
        let reply = dispatch(Some("s"), body, &host());
        assert_eq!(reply.status, 500);
        let error = reply.response.error().unwrap();
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, "Internal error: handler exploded");
        assert_eq!(reply.response.id, json!(8));
    }

    #[test]
    fn codes_and_statuses_follow_the_table() {
        let cases = [
            (DispatchError::MissingSession, -32000, 400),
            (DispatchError::UnknownSession("s".into()), -32000, 404),
            (DispatchError::Parse("x".into()), -32700, 400),
            (DispatchError::InvalidRequest("x".into()), -32600, 400),
            (DispatchError::InvalidParams("x".into()), -32602, 400),
            (DispatchError::MethodNotFound("x".into()), -32601, 404),
            (DispatchError::ToolNotFound("x".into()), -32601, 404),
            (DispatchError::ToolExecution("x".into()), -32000, 500),
            (DispatchError::Internal("x".into()), -32603, 500),
        ];
        for (error, code, status) in cases {
            assert_eq!((error.code(), error.status()), (code, status), "{error:?}");
        }
    }
}
