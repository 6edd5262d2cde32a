//! Observability hooks for orchestration runs.
use tracing::{info, warn};

use crate::llm::ToolChoice;
use crate::orchestrator::{Stage, Transition};
use crate::search::SearchType;

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationEvent {
    CompletionRequested {
        stage: Stage,
        message_count: usize,
        tool_count: usize,
        tool_choice: ToolChoice,
    },
    CompletionReceived {
        stage: Stage,
        /// Content cut to a bounded preview.
        preview: Option<String>,
        tool_calls: usize,
    },
    SearchRequested {
        stage: Stage,
        query: String,
        num_results: u32,
        search_type: SearchType,
    },
    SearchCompleted {
        stage: Stage,
        results: usize,
    },
    ToolCallSkipped {
        name: String,
    },
    Transition(Transition),
}

/// Sink for orchestration events.
pub trait Observer: Send + Sync {
    fn record(&self, event: &OrchestrationEvent);
}

/// Default sink: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record(&self, event: &OrchestrationEvent) {
        match event {
            OrchestrationEvent::CompletionRequested {
                stage,
                message_count,
                tool_count,
                tool_choice,
            } => info!(
                target: "orchestrator",
                stage = %stage,
                message_count,
                tool_count,
                tool_choice = %tool_choice,
                "Completion requested"
            ),
            OrchestrationEvent::CompletionReceived {
                stage,
                preview,
                tool_calls,
            } => info!(
                target: "orchestrator",
                stage = %stage,
                preview = preview.as_deref().unwrap_or("<no content>"),
                tool_calls,
                "Completion received"
            ),
            OrchestrationEvent::SearchRequested {
                stage,
                query,
                num_results,
                search_type,
            } => info!(
                target: "orchestrator",
                stage = %stage,
                query = %query,
                num_results,
                search_type = %search_type,
                "Search requested"
            ),
            OrchestrationEvent::SearchCompleted { stage, results } => info!(
                target: "orchestrator",
                stage = %stage,
                results,
                "Search completed"
            ),
            OrchestrationEvent::ToolCallSkipped { name } => {
                warn!(target: "orchestrator", name = %name, "Skipping undeclared tool call")
            }
            OrchestrationEvent::Transition(t) if t.to == Stage::Failed => warn!(
                target: "orchestrator",
                from = %t.from,
                reason = %t.reason,
                "Orchestration failed"
            ),
            OrchestrationEvent::Transition(t) => info!(
                target: "orchestrator",
                from = %t.from,
                to = %t.to,
                reason = %t.reason,
                "Transition"
            ),
        }
    }
}
