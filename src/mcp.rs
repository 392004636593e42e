//! Model Context Protocol surface served by the router.
//!
//! Only three methods are understood: [`TOOLS_LIST`], [`TOOLS_CALL`] and
//! [`PROMPTS_LIST`]. Everything else is answered with "Method not found".

use crate::mcp::tools::ToolHost;

pub mod tools;

pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";
pub const PROMPTS_LIST: &str = "prompts/list";

/// The methods the dispatcher recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ToolsList,
    ToolsCall,
    PromptsList,
}

impl Method {
    /// Resolves a method name, or `None` if it is not one of ours.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            TOOLS_LIST => Some(Method::ToolsList),
            TOOLS_CALL => Some(Method::ToolsCall),
            PROMPTS_LIST => Some(Method::PromptsList),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PromptInfo {
    pub name: String,
}

/// Result of `prompts/list`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PromptList {
    pub prompts: Vec<PromptInfo>,
}

impl PromptList {
    pub fn from_host(host: &dyn ToolHost) -> Self {
        PromptList {
            prompts: host
                .list_prompt_names()
                .into_iter()
                .map(|name| PromptInfo { name })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tools::ToolRegistry;

    #[test]
    fn method_names_resolve() {
        assert_eq!(Method::parse("tools/list"), Some(Method::ToolsList));
        assert_eq!(Method::parse("tools/call"), Some(Method::ToolsCall));
        assert_eq!(Method::parse("prompts/list"), Some(Method::PromptsList));
        assert_eq!(Method::parse("initialize"), None);
        assert_eq!(Method::parse(""), None);
    }

    #[test]
    fn prompts_are_listed_by_name() {
        let registry = ToolRegistry::new().with_prompt("summarize");
        let list = serde_json::to_value(PromptList::from_host(&registry)).unwrap();
        assert_eq!(list, serde_json::json!({"prompts": [{"name": "summarize"}]}));
    }
}
