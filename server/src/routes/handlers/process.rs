use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::{
    email::processor::EmailProcessor,
    error::{AppError, AppJsonResult},
    model::{
        analysis::AnalysisResult,
        response::{ApiResponse, ProcessRequest},
    },
};

/// # POST /api/process
pub async fn handler_process_email(
    State(processor): State<EmailProcessor>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> AppJsonResult<ApiResponse<AnalysisResult>> {
    let Json(ProcessRequest { email_text }) = payload?;
    let email_text =
        email_text.ok_or_else(|| AppError::BadRequest("No email text provided".to_string()))?;

    let result = processor.process(&email_text).await?;

    Ok(Json(ApiResponse::ok(result)))
}
