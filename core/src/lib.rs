//! Prompt-to-chart core: completion and search clients, response parsing and
//! the orchestration that ties them together.

pub mod chart;
pub mod config;
pub mod edit;
pub mod error;
pub mod llm;
pub mod mock;
pub mod observe;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod search;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chart::{ChartData, ChartType, Series, Source};
pub use config::Config;
pub use error::{ChartError, Result};
pub use orchestrator::{Orchestrator, Outcome, Stage, Transition};
