//! Wire DTOs for the `POST /execute` request body.
//!
//! The orchestrator sends blob keys, not inline text; the worker resolves
//! them through the blob-store collaborator before evaluation. Field names
//! follow the orchestrator's camelCase JSON.

use serde::{Deserialize, Serialize};

use crate::types::Language;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub language: Language,
    pub submission_id: i64,
    pub code_file_path: String,
    pub test_cases: Vec<ExecuteTestCase>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTestCase {
    #[serde(default)]
    pub test_case_id: Option<String>,
    pub input_file_path: String,
    pub expected_output_file_path: String,
    pub time_limit_ms: u64,
    #[serde(rename = "maxRamMB")]
    pub max_ram_mb: u64,
}
