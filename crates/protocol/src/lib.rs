//! Wire shapes returned by the query layer.
//!
//! Field names are camelCase on the wire (`originPc4`, `timeMin`, ...) because the map
//! frontend and shop plugins consume them directly.

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowEntry {
    pub dest_pc4: String,
    pub time_min: u32,
    pub distance_km: f64,
}

/// Full or threshold-filtered row for one origin.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowResponse {
    pub origin_pc4: String,
    pub count: usize,
    pub results: Vec<RowEntry>,
}

impl RowResponse {
    pub fn new(origin_pc4: String, results: Vec<RowEntry>) -> Self {
        Self {
            origin_pc4,
            count: results.len(),
            results,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    pub origin_pc4: String,
    pub dest_pc4: String,
    pub time_min: u32,
    pub distance_km: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct OriginsResponse {
    pub origins: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub plan: String,
    pub display_title: String,
    pub row_cap: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
