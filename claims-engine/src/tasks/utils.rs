use chrono::{DateTime, Utc};
use claim_graph::{Context, GraphError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::types::session_keys;

/// Reads a value a prerequisite task must have stored
pub async fn require<T: DeserializeOwned>(context: &Context, key: &str) -> Result<T> {
    context
        .get(key)
        .await
        .ok_or_else(|| GraphError::ContextError(format!("{key} not found")))
}

pub async fn session_id(context: &Context) -> String {
    context
        .get::<String>(session_keys::SESSION_ID)
        .await
        .unwrap_or_else(|| "unknown".to_string())
}

/// Trace snapshot of any serializable value
pub fn snapshot(value: &impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Wall time since the claim entered the pipeline
pub async fn elapsed(context: &Context) -> Duration {
    context
        .get::<DateTime<Utc>>(session_keys::STARTED_AT)
        .await
        .and_then(|started| (Utc::now() - started).to_std().ok())
        .unwrap_or_default()
}
