use std::sync::Arc;

use axum::{
    extract::{Json, Query, State, rejection::JsonRejection},
    response::IntoResponse,
};

use super::model::{AnalyzeQuery, BatchAnalysisRequest};
use crate::{
    AppState,
    adstxt::validate_domain,
    analyzer::{self, BatchOptions},
    error::AppError,
};

#[axum::debug_handler]
pub async fn analyze_single(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<impl IntoResponse, AppError> {
    state.metrics.record_request();

    // 与批量接口一致，域名原样校验，不做 trim
    let domain = query
        .domain
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::BadRequest("domain parameter is required".to_string()))?;

    validate_domain(&domain)?;

    let result = state.analyzer.analyze(&domain).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn analyze_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchAnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    state.metrics.record_request();

    let Json(req) = payload.map_err(|e| {
        tracing::debug!("Rejected batch payload: {}", e);
        AppError::BadRequest("invalid JSON payload".to_string())
    })?;

    let options = BatchOptions {
        max_domains: state.config.batch_max_domains,
        timeout: state.config.batch_timeout,
    };
    let result = analyzer::analyze_batch(Arc::clone(&state.analyzer), req.domains, &options).await?;

    Ok(Json(result))
}
