use serde::{Deserialize, Deserializer, Serialize};

use crate::chart::ChartSpec;

#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    pub query: String,
    pub context_product_id: Option<i64>,
}

/// Answer from `POST /chat/ask`.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub tool_used: Option<String>,
    #[serde(default, deserialize_with = "lenient_chart")]
    pub chart_data: Option<ChartSpec>,
}

/// A chart the client can't read shouldn't cost the user the answer text.
fn lenient_chart<'de, D>(deserializer: D) -> Result<Option<ChartSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(spec) => Some(spec),
        Err(e) => {
            tracing::warn!("Dropping unreadable chart_data: {}", e);
            None
        }
    }))
}

/// Body of `POST /chat/save`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveRequest {
    pub query: String,
    pub answer: String,
    pub tool_used: Option<String>,
    pub product_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveAck {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: String,
}

/// One logged turn from `GET /chat/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    #[serde(default)]
    pub tool_used: Option<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub has_chart: bool,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
}
