//! HTTP Handlers

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use agent_core::{AgentResponse, IntermediateStep, ModelInfo, WorkflowOptions};

use crate::middleware::ConversationId;
use crate::state::AppState;
use crate::workflow::TOOL_AGENT_CHAIN;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub llm_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub conversation_id: String,
    pub intermediate_steps: Vec<IntermediateStep>,
    pub final_response: String,
    pub error: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let llm_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        llm_connected,
    })
}

/// List available models
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    state.provider.list_models().await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "Failed to list models");
        api_error(StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_ERROR", e.user_message())
    })
}

/// Run the tool agent workflow on one message.
///
/// The conversation id is the body's, else the ambient one from the
/// middleware. Workflow and agent failures are reported in the body
/// (`error: true`), not as an HTTP error status.
pub async fn tool_agent(
    State(state): State<AppState>,
    Extension(ambient): Extension<ConversationId>,
    Json(payload): Json<WorkflowRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "message must not be empty",
        ));
    }

    let conversation_id = payload
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(ambient.0);

    let mut options = WorkflowOptions::default().conversation_id(conversation_id.clone());
    if let Some(model) = payload.model.filter(|m| !m.trim().is_empty()) {
        options = options.model(model);
    }

    let response = match state
        .orchestrator
        .execute_workflow(TOOL_AGENT_CHAIN, payload.message, &options, None)
        .await
    {
        Ok(mut output) => output.responses.pop().unwrap_or_else(|| {
            AgentResponse::failed(&conversation_id, "workflow produced no agent response")
        }),
        Err(e) => AgentResponse::failed(&conversation_id, e),
    };

    tracing::info!(
        conversation_id = %response.conversation_id,
        steps = response.intermediate_steps.len(),
        error = response.is_error(),
        "Tool agent workflow finished"
    );

    Ok(Json(WorkflowResponse::from(response)))
}

impl From<AgentResponse> for WorkflowResponse {
    fn from(response: AgentResponse) -> Self {
        Self {
            error: response.is_error(),
            conversation_id: response.conversation_id,
            intermediate_steps: response.intermediate_steps,
            final_response: response.output,
            error_message: response.error,
        }
    }
}
