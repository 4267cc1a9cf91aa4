//! HTTP surface: `/chat`, `/call`, `/tools`, `/health`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tether_core::{ChatMessage, ToolCallResult};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::catalog::ToolCatalog;
use crate::error::ServiceError;
use crate::llm::LlmClient;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};

/// Shared, read-only state behind every request.
pub struct AppState {
    pub catalog: Arc<ToolCatalog>,
    pub llm: Arc<dyn LlmClient>,
    pub settings: OrchestratorSettings,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/call", post(call_tool))
        .route("/tools", get(list_tools))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct CallBody {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListing {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub source: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatMessage>, ApiError> {
    let mut transcript = Vec::with_capacity(body.messages.len() + 1);
    if !state.settings.system_prompt.is_empty() {
        transcript.push(ChatMessage::system(state.settings.system_prompt.clone()));
    }
    transcript.extend(body.messages);

    let outcome = Orchestrator::new(state.llm.as_ref(), &state.catalog)
        .with_settings(&state.settings)
        .run(transcript)
        .await?;

    tracing::info!(rounds = outcome.rounds(), "Chat request served");
    Ok(Json(outcome.into_message()))
}

/// Run one tool directly, bypassing the model.
async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CallBody>,
) -> Result<Json<ToolCallResult>, ApiError> {
    let entry = state
        .catalog
        .get(&body.name)
        .ok_or_else(|| ApiError::ToolNotFound(body.name.clone()))?;

    tracing::info!(tool = %body.name, source = %entry.session.source_name(), "Direct tool call");

    let timeout = state.settings.tool_timeout;
    let result = tokio::time::timeout(timeout, entry.session.call_tool(&body.name, &body.arguments))
        .await
        .map_err(|_| ServiceError::Timeout {
            operation: format!("tool {}", body.name),
            after: timeout,
        })??;
    Ok(Json(result))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolListing>> {
    Json(
        state
            .catalog
            .entries()
            .map(|entry| ToolListing {
                name: entry.spec.name.clone(),
                description: entry.spec.description.clone(),
                input_schema: entry.spec.input_schema.clone(),
                source: entry.session.source_name().to_string(),
            })
            .collect(),
    )
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "tools": state.catalog.len(),
    }))
}

#[derive(Debug)]
pub enum ApiError {
    ToolNotFound(String),
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::Service(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Service(e) => match e {
                ServiceError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
                ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                ServiceError::Llm(_)
                | ServiceError::Session(_)
                | ServiceError::SessionConnect { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::ToolNotFound(name) => format!("Tool {name} not found or not connected."),
            ApiError::Service(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %message, "Request rejected");
        }
        (status, Json(json!({ "detail": message }))).into_response()
    }
}
