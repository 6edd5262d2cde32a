//! Prompt-to-chart orchestration.
//!
//! A run is a small state machine over at most three completion rounds:
//!
//! ```text
//! Start -> FirstCompletion
//!   tool calls      -> ToolExecution -> SecondCompletion -> Done | ContentInvalid
//!   args as content -> ContentIsToolArgs -> ManualSearch -> ThirdCompletion -> Done
//!   chart data      -> ContentIsChartData -> Done
//!   anything else   -> ContentInvalid
//! ContentInvalid -> FallbackSearch -> FinalCompletion -> Done | Failed
//! ```
//!
//! Fallback only kicks in for content that parses but fails the shape check.
//! Upstream failures, empty content and unparseable content end the run.
use std::fmt;
use std::sync::Arc;

use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionTool};
use serde_json::Value;

use crate::config::Config;
use crate::error::{ChartError, Result};
use crate::llm::{AssistantMessage, LlmClient, OpenRouterClient, ToolChoice, PREVIEW_CHARS};
use crate::observe::{Observer, OrchestrationEvent, TracingObserver};
use crate::parser::{
    is_valid_chart_data, looks_like_tool_args, normalize_tool_arguments, parse_json,
    truncate_chars,
};
use crate::prompt;
use crate::search::{ExaClient, SearchArgs, SearchClient, SearchResult, DEFAULT_NUM_RESULTS};
use crate::tool::ToolDeclaration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    FirstCompletion,
    ToolExecution,
    SecondCompletion,
    ContentIsToolArgs,
    ManualSearch,
    ThirdCompletion,
    ContentIsChartData,
    ContentInvalid,
    FallbackSearch,
    FinalCompletion,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    pub reason: String,
}

/// A successful run: the model's chart JSON, untouched, plus the path taken.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub data: Value,
    pub transitions: Vec<Transition>,
}

impl Outcome {
    /// Every stage visited, starting with `Start` and ending with `Done`.
    pub fn path(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self.transitions.iter().map(|t| t.from).collect();
        if let Some(last) = self.transitions.last() {
            stages.push(last.to);
        }
        stages
    }
}

enum State {
    Start,
    FirstCompletion,
    ToolExecution {
        assistant: AssistantMessage,
    },
    SecondCompletion {
        assistant: AssistantMessage,
        results: Vec<ChatCompletionRequestMessage>,
    },
    ContentIsToolArgs {
        args: SearchArgs,
    },
    ManualSearch {
        args: SearchArgs,
    },
    ThirdCompletion {
        results: Vec<ChatCompletionRequestMessage>,
    },
    ContentIsChartData {
        data: Value,
    },
    ContentInvalid,
    FallbackSearch,
    FinalCompletion {
        results: Vec<ChatCompletionRequestMessage>,
    },
}

impl State {
    fn stage(&self) -> Stage {
        match self {
            State::Start => Stage::Start,
            State::FirstCompletion => Stage::FirstCompletion,
            State::ToolExecution { .. } => Stage::ToolExecution,
            State::SecondCompletion { .. } => Stage::SecondCompletion,
            State::ContentIsToolArgs { .. } => Stage::ContentIsToolArgs,
            State::ManualSearch { .. } => Stage::ManualSearch,
            State::ThirdCompletion { .. } => Stage::ThirdCompletion,
            State::ContentIsChartData { .. } => Stage::ContentIsChartData,
            State::ContentInvalid => Stage::ContentInvalid,
            State::FallbackSearch => Stage::FallbackSearch,
            State::FinalCompletion { .. } => Stage::FinalCompletion,
        }
    }
}

enum Step {
    Next(State, String),
    Finish(Value, String),
}

/// Per-run data shared by every step.
struct Run<'a> {
    prompt: &'a str,
    opening: Vec<ChatCompletionRequestMessage>,
    tools: Vec<ChatCompletionTool>,
    transitions: Vec<Transition>,
}

pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    searcher: Arc<dyn SearchClient>,
    observer: Arc<dyn Observer>,
    tool: ToolDeclaration,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, searcher: Arc<dyn SearchClient>) -> Self {
        Self {
            llm,
            searcher,
            observer: Arc::new(TracingObserver),
            tool: ToolDeclaration::search(),
        }
    }

    /// Wires the OpenRouter and Exa clients. Fails before any network call
    /// when a credential is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = config.credentials()?;
        let llm = OpenRouterClient::new(
            credentials.openrouter,
            &config.model,
            &config.completion_base_url,
            config.request_timeout,
        )?;
        let searcher = ExaClient::new(
            credentials.exa,
            &config.search_base_url,
            config.request_timeout,
        )?;
        Ok(Self::new(Arc::new(llm), Arc::new(searcher)))
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Turns a prompt into chart JSON. `chart_type` is only a hint for the model.
    pub async fn run(&self, prompt: &str, chart_type: Option<&str>) -> Result<Outcome> {
        let mut run = Run {
            prompt,
            opening: prompt::opening(prompt, chart_type)?,
            tools: vec![self.tool.to_openai()?],
            transitions: Vec::new(),
        };

        let mut state = State::Start;
        loop {
            let from = state.stage();
            match self.step(&mut run, state).await {
                Ok(Step::Next(next, reason)) => {
                    self.transition(&mut run, from, next.stage(), reason);
                    state = next;
                }
                Ok(Step::Finish(data, reason)) => {
                    self.transition(&mut run, from, Stage::Done, reason);
                    return Ok(Outcome {
                        data,
                        transitions: run.transitions,
                    });
                }
                Err(err) => {
                    self.transition(&mut run, from, Stage::Failed, err.to_string());
                    return Err(err);
                }
            }
        }
    }

    async fn step(&self, run: &mut Run<'_>, state: State) -> Result<Step> {
        match state {
            State::Start => Ok(Step::Next(State::FirstCompletion, "prompt accepted".into())),

            State::FirstCompletion => {
                let message = self
                    .complete(Stage::FirstCompletion, &run.opening, &run.tools, ToolChoice::Auto)
                    .await?;

                if !message.tool_calls.is_empty() {
                    let reason = format!("model requested {} tool call(s)", message.tool_calls.len());
                    return Ok(Step::Next(State::ToolExecution { assistant: message }, reason));
                }

                let parsed = parse_json(message.text().ok_or(ChartError::EmptyResponse)?)?;
                if looks_like_tool_args(&parsed) {
                    let args = normalize_tool_arguments(&parsed)?;
                    Ok(Step::Next(
                        State::ContentIsToolArgs { args },
                        "content holds search arguments instead of a tool call".into(),
                    ))
                } else if is_valid_chart_data(&parsed) {
                    Ok(Step::Next(
                        State::ContentIsChartData { data: parsed },
                        "content is chart data".into(),
                    ))
                } else {
                    Ok(Step::Next(
                        State::ContentInvalid,
                        "content is neither search arguments nor chart data".into(),
                    ))
                }
            }

            State::ToolExecution { assistant } => {
                let mut results = Vec::new();
                for call in &assistant.tool_calls {
                    if call.function.name != self.tool.name {
                        self.observer.record(&OrchestrationEvent::ToolCallSkipped {
                            name: call.function.name.clone(),
                        });
                        continue;
                    }
                    let args = normalize_tool_arguments(&call.function.arguments)?;
                    let result = self.search(Stage::ToolExecution, &args).await?;
                    results.push(prompt::tool_result(&call.id, serde_json::to_string(&result)?)?);
                }
                let reason = format!(
                    "executed {} of {} tool call(s)",
                    results.len(),
                    assistant.tool_calls.len()
                );
                Ok(Step::Next(State::SecondCompletion { assistant, results }, reason))
            }

            State::SecondCompletion { assistant, results } => {
                let mut messages = run.opening.clone();
                messages.push(assistant.to_request_message()?);
                messages.extend(results);

                let parsed = self
                    .complete_json(Stage::SecondCompletion, &messages, &run.tools)
                    .await?;
                if is_valid_chart_data(&parsed) {
                    Ok(Step::Finish(parsed, "tool-assisted answer is chart data".into()))
                } else {
                    Ok(Step::Next(
                        State::ContentInvalid,
                        "tool-assisted answer failed the shape check".into(),
                    ))
                }
            }

            State::ContentIsToolArgs { args } => Ok(Step::Next(
                State::ManualSearch { args },
                "running the search the model described".into(),
            )),

            State::ManualSearch { args } => {
                let result = self.search(Stage::ManualSearch, &args).await?;
                let reason = format!("manual search returned {} result(s)", result.results.len());
                let results = vec![prompt::tool_result(
                    prompt::SYNTHETIC_CALL_ID,
                    serde_json::to_string(&result)?,
                )?];
                Ok(Step::Next(State::ThirdCompletion { results }, reason))
            }

            State::ThirdCompletion { results } => {
                let mut messages = run.opening.clone();
                messages.extend(results);

                // No shape check on this path; whatever parses is the answer.
                let parsed = self
                    .complete_json(Stage::ThirdCompletion, &messages, &run.tools)
                    .await?;
                Ok(Step::Finish(parsed, "answer after manual search".into()))
            }

            State::ContentIsChartData { data } => {
                Ok(Step::Finish(data, "first answer accepted".into()))
            }

            State::ContentInvalid => Ok(Step::Next(
                State::FallbackSearch,
                "falling back to a search on the raw prompt".into(),
            )),

            State::FallbackSearch => {
                let args = SearchArgs::new(run.prompt).with_num_results(DEFAULT_NUM_RESULTS);
                let result = self.search(Stage::FallbackSearch, &args).await?;
                let reason = format!("fallback search returned {} result(s)", result.results.len());
                let results = vec![prompt::tool_result(
                    prompt::SYNTHETIC_CALL_ID,
                    serde_json::to_string(&result)?,
                )?];
                Ok(Step::Next(State::FinalCompletion { results }, reason))
            }

            State::FinalCompletion { results } => {
                let mut messages = run.opening.clone();
                messages.push(prompt::system(prompt::FALLBACK_INSTRUCTION)?);
                messages.extend(results);

                let parsed = self
                    .complete_json(Stage::FinalCompletion, &messages, &run.tools)
                    .await?;
                if is_valid_chart_data(&parsed) {
                    Ok(Step::Finish(parsed, "fallback answer is chart data".into()))
                } else {
                    Err(ChartError::InvalidChartData)
                }
            }
        }
    }

    fn transition(&self, run: &mut Run<'_>, from: Stage, to: Stage, reason: String) {
        let transition = Transition { from, to, reason };
        self.observer
            .record(&OrchestrationEvent::Transition(transition.clone()));
        run.transitions.push(transition);
    }

    async fn complete(
        &self,
        stage: Stage,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
        tool_choice: ToolChoice,
    ) -> Result<AssistantMessage> {
        self.observer.record(&OrchestrationEvent::CompletionRequested {
            stage,
            message_count: messages.len(),
            tool_count: tools.len(),
            tool_choice,
        });
        let message = self.llm.complete(messages, tools, tool_choice).await?;
        self.observer.record(&OrchestrationEvent::CompletionReceived {
            stage,
            preview: message
                .content
                .as_deref()
                .map(|c| truncate_chars(c, PREVIEW_CHARS)),
            tool_calls: message.tool_calls.len(),
        });
        Ok(message)
    }

    /// A follow-up round with tools disabled; the content must be non-empty JSON.
    async fn complete_json(
        &self,
        stage: Stage,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
    ) -> Result<Value> {
        let message = self.complete(stage, messages, tools, ToolChoice::None).await?;
        parse_json(message.text().ok_or(ChartError::EmptyResponse)?)
    }

    async fn search(&self, stage: Stage, args: &SearchArgs) -> Result<SearchResult> {
        self.observer.record(&OrchestrationEvent::SearchRequested {
            stage,
            query: args.query.clone(),
            num_results: args.num_results(),
            search_type: args.search_type(),
        });
        let result = self.searcher.search(args).await?;
        self.observer.record(&OrchestrationEvent::SearchCompleted {
            stage,
            results: result.results.len(),
        });
        Ok(result)
    }
}
