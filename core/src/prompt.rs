use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
};

use crate::error::Result;

/// Call id used when the search runs without a structured tool call.
pub const SYNTHETIC_CALL_ID: &str = "functions.exa_search:0";

pub const SYSTEM_PROMPT: &str = r#"You are a data extraction assistant for a text-to-chart app.
Your task: produce JSON that matches this schema:
{
  "title": string,
  "unit": string | null,
  "labels": string[],
  "series": [{ "name": string, "values": number[] }],
  "sources": [{ "title": string, "url": string }]
}
Rules:
- Always return valid JSON only (no markdown).
- Use exa_search to fetch current data from reliable sources.
- For pie or radial charts, output a single series only.
- Use concise labels and align series values to labels by index.
- If data is incomplete, make the best effort and note sources used."#;

pub const FALLBACK_INSTRUCTION: &str =
    "You must return chart JSON with non-empty labels and series.";

pub fn system(content: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestMessage::System(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?,
    ))
}

pub fn user(content: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?,
    ))
}

pub fn tool_result(call_id: &str, content: String) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestMessage::Tool(
        ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(call_id)
            .content(content)
            .build()?,
    ))
}

/// The opening system + user pair for a prompt.
pub fn opening(prompt: &str, chart_type: Option<&str>) -> Result<Vec<ChatCompletionRequestMessage>> {
    let chart_type = chart_type.unwrap_or("unspecified");
    Ok(vec![
        system(SYSTEM_PROMPT)?,
        user(&format!("Prompt: {}\nChart type: {}", prompt, chart_type))?,
    ])
}
