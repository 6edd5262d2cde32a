use thiserror::Error;

/// Everything that can go wrong between an inbound prompt and a chart payload.
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Missing OPENROUTER_API_KEY or EXA_API_KEY. Add them to your environment.")]
    Configuration,

    #[error("{0}")]
    Validation(String),

    /// Upstream answered with a non-success status.
    #[error("{service} error: {status} {body}")]
    RemoteService {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse JSON from model response.")]
    MalformedResponse,

    #[error("Model returned empty content.")]
    EmptyResponse,

    #[error("Model returned invalid chart data.")]
    InvalidChartData,

    #[error("Invalid search tool arguments: {0}")]
    ToolArguments(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to build completion request: {0}")]
    Request(#[from] async_openai::error::OpenAIError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChartError {
    /// Errors caused by the caller or the deployment rather than an upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ChartError::Configuration | ChartError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;
