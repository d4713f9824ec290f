use axum::{extract::Path, Json};

use crate::{
    email::samples::{sample_display_name, SAMPLE_EMAILS},
    error::{AppError, AppJsonResult},
    model::response::{SampleEntry, SampleResponse, SamplesResponse},
};

/// # GET /api/samples
pub async fn handler_list_samples() -> Json<SamplesResponse> {
    let samples = SAMPLE_EMAILS
        .iter()
        .map(|(key, content)| {
            (
                *key,
                SampleEntry {
                    name: sample_display_name(key),
                    content: *content,
                },
            )
        })
        .collect();

    Json(SamplesResponse {
        success: true,
        samples,
    })
}

/// # GET /api/sample/:key
pub async fn handler_get_sample(Path(key): Path<String>) -> AppJsonResult<SampleResponse> {
    let sample = SAMPLE_EMAILS
        .get(key.as_str())
        .copied()
        .ok_or_else(|| AppError::NotFound("Sample not found".to_string()))?;

    Ok(Json(SampleResponse {
        success: true,
        sample,
    }))
}
