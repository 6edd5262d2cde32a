//! Scripted stand-ins for the LLM and search clients.
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionTool};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ChartError, Result};
use crate::llm::{AssistantMessage, FunctionCall, LlmClient, ToolCall, ToolChoice};
use crate::observe::{Observer, OrchestrationEvent};
use crate::orchestrator::Transition;
use crate::search::{SearchArgs, SearchClient, SearchHit, SearchResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What a scripted completion was asked, in wire form.
#[derive(Debug, Clone)]
pub struct RecordedCompletion {
    pub messages: Vec<Value>,
    pub tool_count: usize,
    pub tool_choice: ToolChoice,
}

/// Replays queued replies in order and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<AssistantMessage>>>,
    calls: Mutex<Vec<RecordedCompletion>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Result<AssistantMessage>) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    pub fn reply_content(self, content: &str) -> Self {
        self.reply(Ok(AssistantMessage {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }))
    }

    pub fn reply_tool_calls(self, tool_calls: Vec<ToolCall>) -> Self {
        self.reply(Ok(AssistantMessage {
            content: Some(String::new()),
            tool_calls,
        }))
    }

    pub fn calls(&self) -> Vec<RecordedCompletion> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
        tool_choice: ToolChoice,
    ) -> Result<AssistantMessage> {
        let messages = messages
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        lock(&self.calls).push(RecordedCompletion {
            messages,
            tool_count: tools.len(),
            tool_choice,
        });
        lock(&self.replies).pop_front().unwrap_or_else(|| {
            Err(ChartError::RemoteService {
                service: "ScriptedLlm",
                status: 599,
                body: "no scripted reply left".to_string(),
            })
        })
    }
}

enum SearchBehaviour {
    Return(SearchResult),
    Fail { status: u16, body: String },
}

/// Answers every search the same way and records the arguments.
pub struct ScriptedSearch {
    behaviour: SearchBehaviour,
    queries: Mutex<Vec<SearchArgs>>,
}

impl ScriptedSearch {
    pub fn returning(result: SearchResult) -> Self {
        Self {
            behaviour: SearchBehaviour::Return(result),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            behaviour: SearchBehaviour::Fail {
                status,
                body: body.to_string(),
            },
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<SearchArgs> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, args: &SearchArgs) -> Result<SearchResult> {
        lock(&self.queries).push(args.clone());
        match &self.behaviour {
            SearchBehaviour::Return(result) => Ok(result.clone()),
            SearchBehaviour::Fail { status, body } => Err(ChartError::RemoteService {
                service: "Exa",
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<OrchestrationEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<OrchestrationEvent> {
        lock(&self.events).clone()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OrchestrationEvent::Transition(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn record(&self, event: &OrchestrationEvent) {
        lock(&self.events).push(event.clone());
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    }
}

/// `count` search hits with short text.
pub fn hits(count: usize) -> SearchResult {
    SearchResult {
        results: (1..=count)
            .map(|i| SearchHit {
                title: Some(format!("Source {}", i)),
                url: Some(format!("https://example.com/{}", i)),
                text: Some(format!("Figure {} from the source.", i)),
            })
            .collect(),
    }
}
