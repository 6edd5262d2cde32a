use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ChartError, Result};
use crate::parser::truncate_chars;

/// Hit text is cut to this many characters before it goes back to the model.
pub const MAX_TEXT_CHARS: usize = 1200;
pub const DEFAULT_NUM_RESULTS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Auto,
    Neural,
    Fast,
    Deep,
}

impl SearchType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto" => Some(SearchType::Auto),
            "neural" => Some(SearchType::Neural),
            "fast" => Some(SearchType::Fast),
            "deep" => Some(SearchType::Deep),
            _ => None,
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchType::Auto => "auto",
            SearchType::Neural => "neural",
            SearchType::Fast => "fast",
            SearchType::Deep => "deep",
        };
        f.write_str(name)
    }
}

/// Arguments of one `exa_search` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(
        rename = "numResults",
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub num_results: Option<u32>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub search_type: Option<SearchType>,
}

impl SearchArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_results: None,
            search_type: None,
        }
    }

    pub fn with_num_results(mut self, n: u32) -> Self {
        self.num_results = Some(n.clamp(1, 10));
        self
    }

    pub fn num_results(&self) -> u32 {
        self.num_results.unwrap_or(DEFAULT_NUM_RESULTS)
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type.unwrap_or_default()
    }
}

// Models send counts as 5, 5.0 or "5"; anything else means "use the default".
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let number = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(1.0, 10.0) as u32))
}

fn lenient_type<'de, D>(deserializer: D) -> std::result::Result<Option<SearchType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(SearchType::parse))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub results: Vec<SearchHit>,
}

impl SearchResult {
    /// Applies the boundary policy: text is cut to `MAX_TEXT_CHARS` characters.
    pub fn normalized(self) -> Self {
        let results = self
            .results
            .into_iter()
            .map(|hit| SearchHit {
                text: hit.text.map(|t| truncate_chars(&t, MAX_TEXT_CHARS)),
                ..hit
            })
            .collect();
        Self { results }
    }
}

/// The single search capability the orchestrator can call.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, args: &SearchArgs) -> Result<SearchResult>;
}

/// Exa `/search` client.
pub struct ExaClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl ExaClient {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
        })
    }
}

#[derive(Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Option<Vec<SearchHit>>,
}

#[async_trait]
impl SearchClient for ExaClient {
    async fn search(&self, args: &SearchArgs) -> Result<SearchResult> {
        let num_results = args.num_results();
        let search_type = args.search_type();
        info!(target: "exa", query = %args.query, num_results, search_type = %search_type, "Search");

        let body = json!({
            "query": args.query,
            "numResults": num_results,
            "type": search_type,
            "contents": { "text": true },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(target: "exa", status = status.as_u16(), body = %text, "Search failed");
            return Err(ChartError::RemoteService {
                service: "Exa",
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: ExaResponse = serde_json::from_str(&text).map_err(|e| {
            warn!(target: "exa", error = %e, "Undecodable search body");
            ChartError::MalformedResponse
        })?;
        let result = SearchResult {
            results: payload.results.unwrap_or_default(),
        }
        .normalized();
        debug!(target: "exa", count = result.results.len(), "Results");
        Ok(result)
    }
}
