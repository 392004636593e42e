//! Tool contract and the in-memory tool host.
//!
//! The router never defines tools itself. It consumes a [`ToolHost`], which can
//! enumerate tools, look one up by name, and enumerate prompt names. Each tool
//! implements [`Tool`]: a name, an optional description, an optional input
//! schema, and a handler that takes keyword-style arguments.
//!
//! [`ToolRegistry`] is the stock host: tools and prompts are kept in
//! registration order behind a `RwLock`. Lookups clone an `Arc` handle out of
//! the registry, so no lock is held while a handler runs.
//!
//! # Examples
//!
//! ## Implementing a custom tool
//!
//! ```
//! use thread_session::mcp::tools::{
//!     Argument, InputSchema, Tool, ToolCallError, ToolHost, ToolRegistry,
//! };
//! use serde_json::{json, Value};
//! use std::collections::HashMap;
//!
//! struct RowCount;
//!
//! impl Tool for RowCount {
//!     fn name(&self) -> &str {
//!         "row_count"
//!     }
//!
//!     fn description(&self) -> Option<&str> {
//!         Some("Counts rows in a table")
//!     }
//!
//!     fn input_schema(&self) -> Option<InputSchema> {
//!         Some(InputSchema::new(vec![
//!             Argument::new("table", "string", "Table to count", true),
//!         ]))
//!     }
//!
//!     fn call(&self, arguments: HashMap<String, Value>) -> Result<Value, ToolCallError> {
//!         let table = arguments
//!             .get("table")
//!             .and_then(Value::as_str)
//!             .ok_or_else(|| ToolCallError::new("Missing table"))?;
//!         Ok(json!({"table": table, "rows": 0}))
//!     }
//! }
//!
//! let registry = ToolRegistry::new();
//! registry.add_tool(Box::new(RowCount));
//! assert!(registry.get_tool("row_count").is_some());
//! ```
//!
//! ## Closure-backed tools
//!
//! ```
//! use thread_session::mcp::tools::{FnTool, ToolRegistry, ToolHost};
//! use serde_json::Value;
//!
//! let registry = ToolRegistry::new().with_tool(
//!     FnTool::new("echo", |args| Ok(args.get("text").cloned().unwrap_or(Value::Null)))
//!         .with_description("Returns its text argument"),
//! );
//! assert_eq!(registry.list_tools().len(), 1);
//! ```

use logwise::privacy::LogIt;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Trait for implementing tools.
///
/// # Thread Safety
///
/// Tools must be `Send + Sync` as concurrent requests may call the same tool
/// from several threads at once.
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool.
    ///
    /// This name is what `tools/call` requests use to address the tool.
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does, if it has one.
    ///
    /// Tools without a description are listed as `"Tool: <name>"`.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Returns the schema defining the tool's input parameters, if it has one.
    ///
    /// Tools without a schema are listed without an `inputSchema` key.
    fn input_schema(&self) -> Option<InputSchema> {
        None
    }

    /// Executes the tool with the provided arguments.
    ///
    /// # Returns
    ///
    /// * `Ok(value)` - The tool's output. Strings are returned to the caller as-is,
    ///   anything else is serialized to JSON text.
    /// * `Err(ToolCallError)` - The tool failed; the message is reported to the caller.
    fn call(&self, arguments: HashMap<String, Value>) -> Result<Value, ToolCallError>;
}

/// Error raised by a tool handler.
///
/// ```
/// use thread_session::mcp::tools::ToolCallError;
///
/// let error = ToolCallError::new("connection refused");
/// assert_eq!(error.to_string(), "connection refused");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolCallError {
    message: String,
}

impl ToolCallError {
    /// Creates a new tool error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        ToolCallError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ToolCallError {
    fn from(value: String) -> Self {
        ToolCallError::new(value)
    }
}

impl From<&str> for ToolCallError {
    fn from(value: &str) -> Self {
        ToolCallError::new(value)
    }
}

/// Schema defining a tool's input parameters.
///
/// Either built from [`Argument`]s, producing a JSON Schema `object`, or taken
/// verbatim from an existing JSON schema with [`InputSchema::from_value`].
///
/// ```
/// use thread_session::mcp::tools::{InputSchema, Argument};
/// use serde_json::json;
///
/// let schema = InputSchema::new(vec![
///     Argument::new("query", "string", "SQL to run", true),
///     Argument::new("limit", "number", "Maximum rows", false),
/// ]);
/// assert_eq!(
///     serde_json::to_value(&schema).unwrap(),
///     json!({
///         "type": "object",
///         "properties": {
///             "limit": {"type": "number", "description": "Maximum rows"},
///             "query": {"type": "string", "description": "SQL to run"}
///         },
///         "required": ["query"]
///     })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputSchema(Value);

impl InputSchema {
    /// Creates a new input schema from a collection of arguments.
    pub fn new<A: IntoIterator<Item = Argument>>(arguments: A) -> Self {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for argument in arguments {
            let mut inner_map = serde_json::Map::new();
            inner_map.insert("type".to_string(), argument.r#type.into());
            inner_map.insert("description".to_string(), argument.description.into());
            if argument.required {
                required.push(Value::from(argument.name.clone()));
            }
            properties.insert(argument.name, Value::Object(inner_map));
        }
        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), "object".into());
        schema.insert("properties".to_string(), Value::Object(properties.into_iter().collect()));
        schema.insert("required".to_string(), Value::Array(required));
        InputSchema(Value::Object(schema))
    }

    /// Uses an existing JSON schema as-is.
    pub fn from_value(schema: Value) -> Self {
        InputSchema(schema)
    }
}

/// Represents a single parameter for a tool.
///
/// Used to construct input schemas for tools.
#[derive(Debug, Clone)]
pub struct Argument {
    /// The parameter name
    name: String,
    /// The parameter type (e.g., "string", "number", "boolean", "object")
    r#type: String,
    /// Human-readable description of the parameter
    description: String,
    /// Whether this parameter is required
    required: bool,
}

impl Argument {
    /// Creates a new tool argument specification.
    ///
    /// # Arguments
    ///
    /// * `name` - The parameter name
    /// * `type` - The JSON type ("string", "number", "boolean", "object", "array")
    /// * `description` - Human-readable description
    /// * `required` - Whether the parameter is required
    pub fn new(
        name: impl Into<String>,
        r#type: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
            description: description.into(),
            required,
        }
    }
}

/// Metadata about a tool, as reported by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// The unique name of the tool
    pub name: String,
    /// The tool's description, or `"Tool: <name>"` when it has none
    pub description: String,
    /// Schema defining the tool's input parameters; omitted when the tool has none
    #[serde(rename = "inputSchema", default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<InputSchema>,
}

impl ToolInfo {
    /// Creates tool info from a Tool trait object.
    pub fn from_tool(tool: &dyn Tool) -> Self {
        let name = tool.name().to_string();
        let description = match tool.description() {
            Some(description) => description.to_string(),
            None => format!("Tool: {name}"),
        };
        ToolInfo {
            input_schema: tool.input_schema(),
            description,
            name,
        }
    }
}

/// Result of `tools/list`.
///
/// ```
/// use thread_session::mcp::tools::ToolList;
///
/// let json = serde_json::to_string(&ToolList::empty()).unwrap();
/// assert_eq!(json, r#"{"tools":[]}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolList {
    /// The tools, in the host's order
    pub tools: Vec<ToolInfo>,
}

impl ToolList {
    pub fn empty() -> Self {
        ToolList { tools: Vec::new() }
    }

    /// Lists every tool in `host`, in the order the host yields them.
    pub fn from_host(host: &dyn ToolHost) -> Self {
        ToolList {
            tools: host
                .list_tools()
                .iter()
                .map(|tool| ToolInfo::from_tool(tool.as_ref()))
                .collect(),
        }
    }
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to invoke
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments to pass to the tool
    #[serde(default)]
    pub arguments: Option<HashMap<String, Value>>,
}

/// Content returned by a tool.
///
/// Currently supports text content, but marked as `non_exhaustive`
/// to allow for future content types.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ToolContent {
    /// Text content
    Text(String),
}

impl ToolContent {
    /// Wraps a tool's return value as text.
    ///
    /// Strings are used verbatim; any other value becomes its JSON text.
    ///
    /// ```
    /// use thread_session::mcp::tools::ToolContent;
    /// use serde_json::json;
    ///
    /// assert_eq!(ToolContent::from_value(json!("hi")), ToolContent::from("hi"));
    /// assert_eq!(ToolContent::from_value(json!({"rows": 3})), ToolContent::from(r#"{"rows":3}"#));
    /// ```
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => ToolContent::Text(text),
            other => ToolContent::Text(other.to_string()),
        }
    }
}

impl Serialize for ToolContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            ToolContent::Text(text) => {
                let mut s = serializer.serialize_struct("ToolContent", 2)?;
                s.serialize_field("type", "text")?;
                s.serialize_field("text", text)?;
                s.end()
            }
        }
    }
}

impl From<String> for ToolContent {
    fn from(value: String) -> Self {
        ToolContent::Text(value)
    }
}

impl From<&str> for ToolContent {
    fn from(value: &str) -> Self {
        ToolContent::Text(value.to_string())
    }
}

/// Result of a successful `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallResponse {
    /// The content returned by the tool
    pub content: Vec<ToolContent>,
}

impl ToolCallResponse {
    pub fn new(content: Vec<ToolContent>) -> Self {
        ToolCallResponse { content }
    }
}

/// A tool backed by a closure.
///
/// ```
/// use thread_session::mcp::tools::{FnTool, Tool, ToolCallError};
/// use std::collections::HashMap;
///
/// let failing = FnTool::new("always_fails", |_| Err(ToolCallError::new("nope")));
/// assert_eq!(failing.description(), None);
/// assert!(failing.call(HashMap::new()).is_err());
/// ```
pub struct FnTool<F> {
    name: String,
    description: Option<String>,
    input_schema: Option<InputSchema>,
    handler: F,
}

impl<F> FnTool<F>
where
    F: Fn(HashMap<String, Value>) -> Result<Value, ToolCallError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        FnTool {
            name: name.into(),
            description: None,
            input_schema: None,
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, input_schema: InputSchema) -> Self {
        self.input_schema = Some(input_schema);
        self
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(HashMap<String, Value>) -> Result<Value, ToolCallError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn input_schema(&self) -> Option<InputSchema> {
        self.input_schema.clone()
    }

    fn call(&self, arguments: HashMap<String, Value>) -> Result<Value, ToolCallError> {
        (self.handler)(arguments)
    }
}

/// A registry of tools and prompts that requests are served from.
///
/// The router only reads from its host; it never adds or removes entries.
pub trait ToolHost: Send + Sync {
    /// Every tool, in the host's order.
    fn list_tools(&self) -> Vec<Arc<dyn Tool>>;

    /// The tool called `name`, if any.
    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.list_tools().into_iter().find(|tool| tool.name() == name)
    }

    /// Every prompt name, in the host's order.
    fn list_prompt_names(&self) -> Vec<String>;
}

/// In-memory [`ToolHost`].
///
/// Tools can be added at runtime with [`add_tool`](Self::add_tool). Adding a
/// tool whose name is already taken replaces the old tool in place.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn Tool>>>,
    prompts: RwLock<Vec<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool`.
    pub fn add_tool(&self, tool: Box<dyn Tool>) {
        let tool: Arc<dyn Tool> = Arc::from(tool);
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        match tools.iter_mut().find(|existing| existing.name() == tool.name()) {
            Some(existing) => {
                logwise::warn_sync!("Replacing tool {name}", name = LogIt(&tool.name()));
                *existing = tool;
            }
            None => tools.push(tool),
        }
    }

    /// Registers a prompt name. Duplicates are ignored.
    pub fn add_prompt(&self, name: impl Into<String>) {
        let name = name.into();
        let mut prompts = self.prompts.write().unwrap_or_else(PoisonError::into_inner);
        if !prompts.contains(&name) {
            prompts.push(name);
        }
    }

    /// Builder form of [`add_tool`](Self::add_tool).
    pub fn with_tool<T: Tool + 'static>(self, tool: T) -> Self {
        self.add_tool(Box::new(tool));
        self
    }

    /// Builder form of [`add_prompt`](Self::add_prompt).
    pub fn with_prompt(self, name: impl Into<String>) -> Self {
        self.add_prompt(name);
        self
    }
}

impl ToolHost for ToolRegistry {
    fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|tool| tool.name() == name)
            .cloned()
    }

    fn list_prompt_names(&self) -> Vec<String> {
        self.prompts.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn constant(
        name: &str,
        value: Value,
    ) -> FnTool<impl Fn(HashMap<String, Value>) -> Result<Value, ToolCallError> + Send + Sync> {
        FnTool::new(name, move |_| Ok(value.clone()))
    }

    #[test]
    fn listing_fills_in_missing_metadata() {
        let registry = ToolRegistry::new()
            .with_tool(constant("bare", Value::Null))
            .with_tool(
                constant("described", Value::Null)
                    .with_description("Has a description")
                    .with_input_schema(InputSchema::new(vec![Argument::new(
                        "x", "number", "An x", false,
                    )])),
            );
        let listed = serde_json::to_value(ToolList::from_host(&registry)).unwrap();
        assert_eq!(
            listed,
            json!({"tools": [
                {"name": "bare", "description": "Tool: bare"},
                {
                    "name": "described",
                    "description": "Has a description",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"x": {"type": "number", "description": "An x"}},
                        "required": []
                    }
                }
            ]})
        );
    }

    #[test]
    fn registration_order_is_kept_and_names_replace_in_place() {
        let registry = ToolRegistry::new()
            .with_tool(constant("b", json!(1)))
            .with_tool(constant("a", json!(2)))
            .with_tool(constant("b", json!(3)));
        let names: Vec<String> = registry
            .list_tools()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
        let b = registry.get_tool("b").unwrap();
        assert_eq!(b.call(HashMap::new()).unwrap(), json!(3));
        assert!(registry.get_tool("c").is_none());
    }

    #[test]
    fn prompts_keep_order_without_duplicates() {
        let registry = ToolRegistry::new()
            .with_prompt("summarize")
            .with_prompt("explain")
            .with_prompt("summarize");
        assert_eq!(
            registry.list_prompt_names(),
            vec!["summarize".to_string(), "explain".to_string()]
        );
    }

    #[test]
    fn raw_schema_is_passed_through() {
        let raw = json!({"type": "object", "properties": {"sql": {"type": "string"}}});
        let schema = InputSchema::from_value(raw.clone());
        assert_eq!(serde_json::to_value(&schema).unwrap(), raw);
    }

    #[test]
    fn content_serializes_as_text_block() {
        let response = ToolCallResponse::new(vec![ToolContent::from_value(json!([1, 2]))]);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"content": [{"type": "text", "text": "[1,2]"}]})
        );
    }
}
