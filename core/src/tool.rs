use async_openai::types::{ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType, FunctionObjectArgs};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;

pub const SEARCH_TOOL_NAME: &str = "exa_search";

/// A capability the model may call, as advertised to the completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    // JSON Schema of the arguments; passed through untouched.
    pub parameters: Value,
}

impl ToolDeclaration {
    /// The web search tool: `query` required, optional result count and mode.
    pub fn search() -> Self {
        Self {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search the web for data and sources.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "numResults": { "type": "number", "minimum": 1, "maximum": 10 },
                    "type": {
                        "type": "string",
                        "enum": ["auto", "neural", "fast", "deep"]
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Converts to the OpenAI function-tool wire type.
    pub fn to_openai(&self) -> Result<ChatCompletionTool> {
        let tool = ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(
                FunctionObjectArgs::default()
                    .name(&self.name)
                    .description(&self.description)
                    .parameters(self.parameters.clone())
                    .build()?,
            )
            .build()?;
        Ok(tool)
    }
}
