use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use textchart_core::edit::{CellState, Edit};
use textchart_core::{ChartData, ChartError};

// Input: what the UI sends to /api/parse
#[derive(Debug, Default, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default, rename = "chartType")]
    pub chart_type: Option<Value>,
}

impl ParseRequest {
    /// The prompt, if it is a non-blank string.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt
            .as_ref()
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
    }

    pub fn chart_type(&self) -> Option<&str> {
        self.chart_type.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
pub struct MockRequest {
    #[serde(default)]
    pub prompt: String,
}

// Input/Output: one data-editor action against the current dataset
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub data: ChartData,
    pub edit: Edit,
}

#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub data: ChartData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<CellState>,
}

// Output: every failure is reported as { "error": "..." }
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub struct ApiError(pub ChartError);

impl From<ChartError> for ApiError {
    fn from(err: ChartError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
