use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::api::{ApiError, EditRequest, EditResponse, MockRequest, ParseRequest};
use textchart_core::chart::ChartView;
use textchart_core::{mock, ChartData, ChartError, ChartType, Orchestrator};

/// Largest accepted request body.
const BODY_LIMIT: usize = 1024 * 1024;

// `None` when credentials are missing; /api/parse then answers 400.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Option<Arc<Orchestrator>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/parse", post(parse_chart))
        .route("/api/export/csv", post(export_csv))
        .route("/api/mock", post(mock_chart))
        .route("/api/chart/view", post(chart_view))
        .route("/api/chart/edit", post(edit_chart))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "textchart gateway: operational"
}

async fn parse_chart(
    State(state): State<AppState>,
    body: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let orchestrator = state
        .orchestrator
        .as_ref()
        .ok_or(ChartError::Configuration)?;

    let request = body.map(|Json(r)| r).unwrap_or_else(|rejection| {
        warn!("Unreadable /api/parse body: {}", rejection.body_text());
        ParseRequest::default()
    });
    info!(chart_type = ?request.chart_type(), "/api/parse");

    let prompt = request
        .prompt()
        .ok_or_else(|| ChartError::Validation("Prompt is required.".to_string()))?;

    if let Some(kind) = request.chart_type() {
        if kind.parse::<ChartType>().is_err() {
            warn!("Unknown chart type '{}' passed through as a hint", kind);
        }
    }

    match orchestrator.run(prompt, request.chart_type()).await {
        Ok(outcome) => {
            info!("Chart ready after {} transition(s)", outcome.transitions.len());
            Ok(Json(outcome.data))
        }
        Err(e) => {
            error!("Orchestration failed: {}", e);
            Err(e.into())
        }
    }
}

async fn export_csv(
    body: Result<Json<ChartData>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(data) = body.map_err(rejected)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"chart-data.csv\"",
            ),
        ],
        data.to_csv(),
    ))
}

fn rejected(rejection: JsonRejection) -> ApiError {
    ChartError::Validation(rejection.body_text()).into()
}

async fn mock_chart(
    body: Result<Json<MockRequest>, JsonRejection>,
) -> Result<Json<ChartData>, ApiError> {
    let Json(request) = body.map_err(rejected)?;
    info!("Serving offline dataset");
    Ok(Json(mock::parse_prompt(&request.prompt)))
}

async fn chart_view(
    body: Result<Json<ChartData>, JsonRejection>,
) -> Result<Json<ChartView>, ApiError> {
    let Json(data) = body.map_err(rejected)?;
    Ok(Json(data.view()))
}

async fn edit_chart(
    body: Result<Json<EditRequest>, JsonRejection>,
) -> Result<Json<EditResponse>, ApiError> {
    let Json(EditRequest { mut data, edit }) = body.map_err(rejected)?;
    let cell = data.apply(edit);
    if let Some(state) = cell.as_ref().filter(|s| s.invalid) {
        warn!("Rejected cell value {:?}", state.draft);
    }
    Ok(Json(EditResponse { data, cell }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use textchart_core::testing::{hits, tool_call, ScriptedLlm, ScriptedSearch};
    use tower::ServiceExt;

    const VALID_CHART: &str = r#"{"labels":["A","B"],"series":[{"name":"X","values":[1,2]}]}"#;

    struct Fixture {
        app: Router,
        llm: Arc<ScriptedLlm>,
        search: Arc<ScriptedSearch>,
    }

    fn fixture(llm: ScriptedLlm, search: ScriptedSearch) -> Fixture {
        let llm = Arc::new(llm);
        let search = Arc::new(search);
        let orchestrator = Orchestrator::new(llm.clone(), search.clone());
        Fixture {
            app: router(AppState {
                orchestrator: Some(Arc::new(orchestrator)),
            }),
            llm,
            search,
        }
    }

    async fn send_json(app: Router, uri: &str, body: &str) -> (StatusCode, String, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json_body(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn missing_prompt_is_rejected_without_upstream_calls() {
        let f = fixture(
            ScriptedLlm::new().reply_content(VALID_CHART),
            ScriptedSearch::returning(hits(1)),
        );

        let (status, _, body) = send_json(f.app, "/api/parse", r#"{"chartType":"bar"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body), json!({"error": "Prompt is required."}));
        assert!(f.llm.calls().is_empty());
        assert!(f.search.queries().is_empty());
    }

    #[tokio::test]
    async fn non_string_or_unreadable_prompt_is_rejected() {
        for payload in [r#"{"prompt": 42}"#, r#"{"prompt": ""}"#, r#"{"prompt": "   "}"#, "not json"] {
            let f = fixture(ScriptedLlm::new(), ScriptedSearch::returning(hits(1)));
            let (status, _, body) = send_json(f.app, "/api/parse", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload:?}");
            assert_eq!(json_body(&body)["error"], "Prompt is required.");
        }
    }

    #[tokio::test]
    async fn non_string_chart_type_is_sent_as_unspecified() {
        let f = fixture(
            ScriptedLlm::new().reply_content(VALID_CHART),
            ScriptedSearch::returning(hits(1)),
        );

        let (status, _, _) =
            send_json(f.app, "/api/parse", r#"{"prompt":"letters","chartType":42}"#).await;

        assert_eq!(status, StatusCode::OK);
        let calls = f.llm.calls();
        assert_eq!(
            calls[0].messages[1]["content"],
            "Prompt: letters\nChart type: unspecified"
        );
    }

    #[tokio::test]
    async fn missing_credentials_short_circuit() {
        let app = router(AppState { orchestrator: None });

        let (status, _, body) = send_json(app, "/api/parse", r#"{"prompt":"gold price"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(&body)["error"],
            "Missing OPENROUTER_API_KEY or EXA_API_KEY. Add them to your environment."
        );
    }

    #[tokio::test]
    async fn tool_call_flow_returns_model_chart_unchanged() {
        let chart = json!({
            "title": "Average Bitcoin Price",
            "unit": "USD",
            "labels": ["2021", "2022", "2023", "2024", "2025"],
            "series": [{"name": "BTC", "values": [47000, 28000, 30000, 52000, 61000]}],
            "sources": [{"title": "CoinDesk", "url": "https://www.coindesk.com"}]
        });
        let f = fixture(
            ScriptedLlm::new()
                .reply_tool_calls(vec![tool_call(
                    "call_1",
                    "exa_search",
                    json!({"query": "bitcoin price 2021-2025"}),
                )])
                .reply_content(&chart.to_string()),
            ScriptedSearch::returning(hits(3)),
        );

        let (status, content_type, body) = send_json(
            f.app,
            "/api/parse",
            r#"{"prompt":"bitcoin price last 5 years","chartType":"line"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("application/json"));
        assert_eq!(json_body(&body), chart);
        assert_eq!(f.search.queries()[0].query, "bitcoin price 2021-2025");
    }

    #[tokio::test]
    async fn inferred_tool_arguments_flow() {
        let f = fixture(
            ScriptedLlm::new()
                .reply_content(r#"{"query":"market share cloud providers"}"#)
                .reply_content(VALID_CHART),
            ScriptedSearch::returning(hits(2)),
        );

        let (status, _, body) =
            send_json(f.app, "/api/parse", r#"{"prompt":"cloud market share","chartType":"pie"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json_body(VALID_CHART));
        assert_eq!(f.search.queries()[0].query, "market share cloud providers");
    }

    #[tokio::test]
    async fn fallback_search_flow() {
        let f = fixture(
            ScriptedLlm::new()
                .reply_content(r#"{"foo":"bar"}"#)
                .reply_content(VALID_CHART),
            ScriptedSearch::returning(hits(6)),
        );

        let (status, _, body) =
            send_json(f.app, "/api/parse", r#"{"prompt":"letters","chartType":"bar"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json_body(&body),
            json!({"labels":["A","B"],"series":[{"name":"X","values":[1,2]}]})
        );
        assert_eq!(f.search.queries()[0].query, "letters");
    }

    #[tokio::test]
    async fn invalid_fallback_answer_is_a_server_error() {
        let f = fixture(
            ScriptedLlm::new()
                .reply_content(r#"{"foo":"bar"}"#)
                .reply_content(r#"{"still":"wrong"}"#),
            ScriptedSearch::returning(hits(1)),
        );

        let (status, _, body) = send_json(f.app, "/api/parse", r#"{"prompt":"letters"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(&body), json!({"error": "Model returned invalid chart data."}));
    }

    #[tokio::test]
    async fn upstream_failure_is_a_server_error() {
        let f = fixture(
            ScriptedLlm::new().reply(Err(ChartError::RemoteService {
                service: "OpenRouter",
                status: 502,
                body: "bad gateway".into(),
            })),
            ScriptedSearch::returning(hits(1)),
        );

        let (status, _, body) = send_json(f.app, "/api/parse", r#"{"prompt":"letters"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(&body)["error"], "OpenRouter error: 502 bad gateway");
    }

    #[tokio::test]
    async fn csv_export() {
        let app = router(AppState { orchestrator: None });
        let payload = json!({
            "title": "Devices",
            "unit": "users",
            "labels": ["Jan", "Feb"],
            "series": [
                {"name": "Desktop", "values": [186, 305]},
                {"name": "Mobile", "values": [80]}
            ]
        });

        let (status, content_type, body) =
            send_json(app, "/api/export/csv", &payload.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/csv"));
        assert_eq!(
            body,
            "Label,Desktop (users),Mobile (users)\nJan,186,80\nFeb,305,"
        );
    }

    #[tokio::test]
    async fn csv_export_rejects_non_chart_bodies() {
        let app = router(AppState { orchestrator: None });

        let (status, _, body) = send_json(app, "/api/export/csv", r#"{"labels":"nope"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_body(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn mock_dataset_matches_keywords() {
        let app = router(AppState { orchestrator: None });

        let (status, _, body) = send_json(app, "/api/mock", r#"{"prompt":"BTC history"}"#).await;

        assert_eq!(status, StatusCode::OK);
        let data: ChartData = serde_json::from_str(&body).unwrap();
        assert_eq!(data.labels, vec!["2021", "2022", "2023", "2024", "2025"]);
        assert_eq!(data.series[0].name, "BTC");
    }

    #[tokio::test]
    async fn mock_rejects_unreadable_bodies_as_json_errors() {
        let app = router(AppState { orchestrator: None });

        let (status, content_type, body) = send_json(app, "/api/mock", "not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("application/json"));
        assert!(json_body(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn chart_view_reports_summary_rows_and_slices() {
        let app = router(AppState { orchestrator: None });
        let payload = json!({
            "labels": ["Jan", "Feb"],
            "series": [
                {"name": "Desktop", "values": [186, 305]},
                {"name": "Mobile", "values": [80]}
            ]
        });

        let (status, _, body) = send_json(app, "/api/chart/view", &payload.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        let view = json_body(&body);
        assert_eq!(view["summary"]["title"], "Untitled Chart");
        assert_eq!(view["summary"]["unit"], "N/A");
        assert_eq!(view["summary"]["series_count"], 2);
        assert_eq!(view["rows"][1], json!({"label": "Feb", "values": [305.0, 0.0]}));
        assert_eq!(view["slices"][0], json!({"name": "Jan", "value": 186.0}));
    }

    #[tokio::test]
    async fn chart_edit_applies_valid_values_and_flags_invalid_ones() {
        let data = json!({"labels": ["A", "B"], "series": [{"name": "X", "values": [1, 2]}]});

        let app = router(AppState { orchestrator: None });
        let payload = json!({
            "data": data,
            "edit": {"op": "value", "seriesIndex": 0, "labelIndex": 1, "raw": "7.5"}
        });
        let (status, _, body) = send_json(app, "/api/chart/edit", &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        let edited = json_body(&body);
        assert_eq!(edited["data"]["series"][0]["values"], json!([1.0, 7.5]));
        assert_eq!(edited["cell"], json!({"draft": "7.5", "invalid": false}));

        let app = router(AppState { orchestrator: None });
        let payload = json!({
            "data": data,
            "edit": {"op": "value", "seriesIndex": 0, "labelIndex": 1, "raw": "abc"}
        });
        let (status, _, body) = send_json(app, "/api/chart/edit", &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        let edited = json_body(&body);
        assert_eq!(edited["data"]["series"][0]["values"], json!([1.0, 2.0]));
        assert_eq!(edited["cell"]["invalid"], true);

        let app = router(AppState { orchestrator: None });
        let payload = json!({"data": data, "edit": {"op": "unit", "value": "kg"}});
        let (_, _, body) = send_json(app, "/api/chart/edit", &payload.to_string()).await;
        let edited = json_body(&body);
        assert_eq!(edited["data"]["unit"], "kg");
        assert!(edited.get("cell").is_none());
    }

    #[tokio::test]
    async fn chart_edit_rejects_unknown_operations() {
        let app = router(AppState { orchestrator: None });
        let payload = json!({
            "data": {"labels": ["A"], "series": [{"name": "X", "values": [1]}]},
            "edit": {"op": "explode"}
        });

        let (status, _, body) = send_json(app, "/api/chart/edit", &payload.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_body(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn health() {
        let app = router(AppState { orchestrator: None });
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
