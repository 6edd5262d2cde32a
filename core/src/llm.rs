use std::fmt;
use std::time::Duration;

use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionTool, ChatCompletionToolChoiceOption,
    ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    FunctionCall as WireFunctionCall, ResponseFormat,
};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ChartError, Result};
use crate::parser::truncate_chars;

/// Content previews in logs stop after this many characters.
pub const PREVIEW_CHARS: usize = 500;

/// Whether the model may call the declared tool on this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

impl ToolChoice {
    fn wire(self) -> ChatCompletionToolChoiceOption {
        match self {
            ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
            ToolChoice::None => ChatCompletionToolChoiceOption::None,
        }
    }
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        })
    }
}

/// The assistant message of the first choice, decoded leniently.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssistantMessage {
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    /// JSON-encoded string or a structured object, depending on the upstream.
    #[serde(default)]
    pub arguments: Value,
}

impl AssistantMessage {
    /// Content with surrounding whitespace removed; `None` when there is nothing.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Echoes this message back into a follow-up conversation.
    pub fn to_request_message(&self) -> Result<ChatCompletionRequestMessage> {
        let mut args = ChatCompletionRequestAssistantMessageArgs::default();
        if let Some(content) = &self.content {
            args.content(content.as_str());
        }
        if !self.tool_calls.is_empty() {
            let calls: Vec<ChatCompletionMessageToolCall> = self
                .tool_calls
                .iter()
                .map(|call| ChatCompletionMessageToolCall {
                    id: call.id.clone(),
                    r#type: ChatCompletionToolType::Function,
                    function: WireFunctionCall {
                        name: call.function.name.clone(),
                        arguments: match &call.function.arguments {
                            Value::String(raw) => raw.clone(),
                            Value::Null => "{}".to_string(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect();
            args.tool_calls(calls);
        }
        Ok(ChatCompletionRequestMessage::Assistant(args.build()?))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Content is usually a string; some providers send an array of text parts.
fn lenient_content<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) => Some(text),
        Some(Value::Array(parts)) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            Some(joined)
        }
        _ => None,
    })
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<AssistantMessage>,
}

/// One chat-completion round trip.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
        tool_choice: ToolChoice,
    ) -> Result<AssistantMessage>;
}

/// OpenRouter chat completions, requested as non-streaming JSON objects.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let model = model.into();
        info!("OpenRouter client ready. Model: {}", model);
        Ok(Self {
            http,
            api_key: api_key.into(),
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
        tool_choice: ToolChoice,
    ) -> Result<CreateChatCompletionRequest> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages.to_vec())
            .tools(tools.to_vec())
            .tool_choice(tool_choice.wire())
            .stream(false)
            .response_format(ResponseFormat::JsonObject)
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
        tool_choice: ToolChoice,
    ) -> Result<AssistantMessage> {
        info!(
            target: "openrouter",
            model = %self.model,
            message_count = messages.len(),
            tool_count = tools.len(),
            tool_choice = %tool_choice,
            "Request"
        );
        let request = self.build_request(messages, tools, tool_choice)?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(target: "openrouter", status = status.as_u16(), body = %body, "Completion failed");
            return Err(ChartError::RemoteService {
                service: "OpenRouter",
                status: status.as_u16(),
                body,
            });
        }

        let message = decode_message(&body)?;
        info!(
            target: "openrouter",
            preview = %message
                .content
                .as_deref()
                .map(|c| truncate_chars(c, PREVIEW_CHARS))
                .unwrap_or_else(|| "<no content>".to_string()),
            tool_calls = message.tool_calls.len(),
            "Response"
        );
        Ok(message)
    }
}

/// Decodes a completion body; a missing first choice yields an empty message.
fn decode_message(body: &str) -> Result<AssistantMessage> {
    let payload: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        warn!(target: "openrouter", error = %e, "Undecodable completion body");
        ChartError::MalformedResponse
    })?;
    Ok(payload
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .unwrap_or_default())
}
