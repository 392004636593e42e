use logwise::privacy::LogIt;
use serde_json::{Value, json};
use std::sync::Arc;
use thread_session::admission::AdmissionPolicy;
use thread_session::config::Config;
use thread_session::dispatch::Router;
use thread_session::http::Server;
use thread_session::mcp::tools::{Argument, FnTool, InputSchema, ToolRegistry};
use thread_session::session::SessionRegistry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let sessions = Arc::new(SessionRegistry::new());

    let counted = sessions.clone();
    let tools = ToolRegistry::new()
        .with_tool(
            FnTool::new("echo", |args| Ok(args.get("text").cloned().unwrap_or(Value::Null)))
                .with_description("Returns its text argument unchanged")
                .with_input_schema(InputSchema::new(vec![Argument::new(
                    "text",
                    "string",
                    "Text to echo",
                    true,
                )])),
        )
        .with_tool(
            FnTool::new("session_count", move |_| Ok(json!({"sessions": counted.len()})))
                .with_description("Reports how many thread sessions are registered"),
        );

    let router = Router::new(AdmissionPolicy::new(sessions, config.mode_switch()), Arc::new(tools));
    let server = Server::bind(config.bind_address.as_str(), router, config.endpoint_path.clone())?;
    logwise::info_sync!(
        "Serving MCP on http://{addr}{path} (bypass via {variable})",
        addr = LogIt(&server.local_addr()),
        path = LogIt(&config.endpoint_path),
        variable = LogIt(&config.bypass_variable)
    );
    server.join();
    Ok(())
}
