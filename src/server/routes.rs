use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::AppState;
use crate::errors::{ErrorClass, GenError};
use crate::provider::Readiness;
use crate::wire::{CssRequest, EnhanceRequest, FixRequest, HtmlRequest, ModelStatus, ReactRequest, WebsiteRequest};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

pub struct ApiError(pub GenError);

impl From<GenError> for ApiError {
    fn from(e: GenError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError(GenError::InvalidRequest(e.body_text()))
    }
}

pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.class());
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        } else {
            tracing::warn!("request rejected: {}", self.0);
        }
        let body = ApiResponse::<()> { success: false, data: None, error: Some(self.0.to_string()) };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<ApiResponse<Value>>, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub ollama_url: String,
    pub readiness: Readiness,
    pub default_model: String,
    pub supported_models: Vec<String>,
    pub models: Vec<ModelStatus>,
    /// Why the model listing could not be fetched, when it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_error: Option<String>,
    pub mock: bool,
    pub checked_at: DateTime<Utc>,
}

pub async fn liveness() -> Json<Value> {
    Json(json!({"status": "healthy", "service": env!("CARGO_PKG_NAME")}))
}

/// Readiness plus a fresh model listing; never answered from a cache. A
/// failed listing is reported in `models_error`, not as a failed request.
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthReport>> {
    let provider = state.generator.provider();
    let (models, models_error) = if state.config.mock {
        (Vec::new(), None)
    } else {
        match provider.model_statuses().await {
            Ok(models) => (models, None),
            Err(e) => {
                tracing::warn!("health check could not list models: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        }
    };
    let readiness = provider.readiness();
    let all_present = models_error.is_none() && models.iter().all(|m| m.available);
    let status = match (&readiness, all_present) {
        _ if state.config.mock => "healthy",
        (Readiness::Ready, true) => "healthy",
        _ => "degraded",
    };
    Json(ApiResponse::ok(HealthReport {
        status,
        ollama_url: provider.base_url().to_string(),
        readiness,
        default_model: state.config.default_model.clone(),
        supported_models: state.config.required_models.clone(),
        models,
        models_error,
        mock: state.config.mock,
        checked_at: Utc::now(),
    }))
}

pub async fn generate_html(State(state): State<AppState>, body: Result<Json<HtmlRequest>, JsonRejection>) -> ApiResult {
    let Json(req) = body?;
    let artifacts = state.generator.generate_html(req).await?;
    Ok(Json(ApiResponse::ok(json!(artifacts))))
}

pub async fn generate_css(State(state): State<AppState>, body: Result<Json<CssRequest>, JsonRejection>) -> ApiResult {
    let Json(req) = body?;
    let css = state.generator.generate_css(req).await?;
    Ok(Json(ApiResponse::ok(json!({ "css": css }))))
}

pub async fn generate_react(
    State(state): State<AppState>,
    body: Result<Json<ReactRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let react = state.generator.generate_react(req).await?;
    Ok(Json(ApiResponse::ok(json!({ "react": react }))))
}

pub async fn enhance(State(state): State<AppState>, body: Result<Json<EnhanceRequest>, JsonRejection>) -> ApiResult {
    let Json(req) = body?;
    let code = state.generator.enhance(req).await?;
    Ok(Json(ApiResponse::ok(json!({ "enhanced_code": code }))))
}

pub async fn fix(State(state): State<AppState>, body: Result<Json<FixRequest>, JsonRejection>) -> ApiResult {
    let Json(req) = body?;
    let code = state.generator.fix(req).await?;
    Ok(Json(ApiResponse::ok(json!({ "fixed_code": code }))))
}

pub async fn create_website(
    State(state): State<AppState>,
    body: Result<Json<WebsiteRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let files = state.generator.create_website(req).await?;
    Ok(Json(ApiResponse::ok(json!({ "website_files": files }))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRequest {
    pub prompt: String,
    pub model_name: Option<String>,
}

pub async fn generate_raw(State(state): State<AppState>, body: Result<Json<RawRequest>, JsonRejection>) -> ApiResult {
    let Json(req) = body?;
    let model = req.model_name.as_deref().filter(|m| !m.trim().is_empty());
    let response = state.generator.generate_raw(&req.prompt, model).await?;
    Ok(Json(ApiResponse::ok(json!({ "response": response }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConnectionKind;

    #[test]
    fn error_classes_map_to_statuses() {
        let unreachable = GenError::connection(ConnectionKind::Unreachable, "http://localhost:11434", "refused");
        assert_eq!(status_for(unreachable.class()), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(GenError::NotInitialized.class()), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(GenError::InvalidRequest("x".into()).class()), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(GenError::Internal("x".into()).class()), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn failure_body_has_no_data() {
        let body = ApiResponse::<()> { success: false, data: None, error: Some("boom".into()) };
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"success": false, "error": "boom"}));
    }
}
