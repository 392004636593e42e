/*!
A JSON-RPC 2.0 router that lets MCP clients use their own thread IDs as session IDs.

MCP tool hosts normally hand out a session token during an initialization
handshake. thread_session skips that handshake: the caller puts an identifier it
already has (for example the id of its conversation thread) in an
`X-Session-ID` or `mcp-session-id` header, and that identifier *is* the session.

# Overview

Three pieces, leaf first:

- [`session::SessionRegistry`] remembers admitted identifiers, in memory only.
- [`admission::AdmissionPolicy`] decides whether an identifier is admissible.
  In strict mode it must already be registered; in bypass mode any non-empty
  identifier is registered on sight. A missing identifier is always rejected.
- [`dispatch::dispatch`] maps `tools/list`, `tools/call` and `prompts/list`
  onto a [`mcp::tools::ToolHost`] and always answers with one JSON-RPC envelope.

[`dispatch::Router`] chains admission and dispatch, and [`http::Server`] serves a
router over plain HTTP/1.1 on threads. No async runtime is required.

# Quick Start

```
use std::sync::Arc;
use thread_session::admission::{AdmissionMode, AdmissionPolicy, ModeSwitch};
use thread_session::dispatch::Router;
use thread_session::http::Headers;
use thread_session::mcp::tools::{FnTool, ToolRegistry};
use thread_session::session::SessionRegistry;
use serde_json::json;

let tools = ToolRegistry::new().with_tool(
    FnTool::new("echo", |args| Ok(args.get("text").cloned().unwrap_or_default()))
        .with_description("Returns its text argument"),
);
let policy = AdmissionPolicy::new(
    Arc::new(SessionRegistry::new()),
    ModeSwitch::Fixed(AdmissionMode::Bypass),
);
let router = Router::new(policy, Arc::new(tools));

let mut headers = Headers::new();
headers.insert("X-Session-ID", "thread_abc123");
let reply = router.handle(
    &headers,
    br#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}},"id":1}"#,
);
assert_eq!(reply.status, 200);
assert_eq!(
    serde_json::to_value(&reply.response).unwrap(),
    json!({"jsonrpc": "2.0", "result": {"content": [{"type": "text", "text": "hi"}]}, "id": 1})
);
```

# Admission modes

The mode is read on every request, so it can be flipped at runtime. With
[`admission::ModeSwitch::environment`] it follows `MCP_SESSION_BYPASS`
(`true`, any case, enables bypass). Bypass mode turns authentication off; only
use it where any caller may legitimately pick its own session.

# Errors

Every failure becomes an error envelope with a JSON-RPC code and a suggested
HTTP status; see [`dispatch::DispatchError`]. Tool failures and tool panics are
contained in the request that caused them.

# Module Organization

- [`jrpc`] - JSON-RPC 2.0 wire types
- [`session`] - session records and registry
- [`admission`] - admission policy and session header extraction
- [`mcp`] - MCP methods, tool contract and tool registry
- [`dispatch`] - dispatcher, failure taxonomy and router
- [`http`] - HTTP/1.1 transport
- [`config`] - environment configuration
*/
pub mod admission;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod jrpc;
pub mod mcp;
pub mod session;
