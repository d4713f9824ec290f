use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub email_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SampleEntry {
    pub name: String,
    pub content: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SamplesResponse {
    pub success: bool,
    pub samples: IndexMap<&'static str, SampleEntry>,
}

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub success: bool,
    pub sample: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_enabled: bool,
    pub analyzer: &'static str,
}
