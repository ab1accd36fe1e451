use super::server::ServerState;
use crate::control::ControlRequest;
use crate::error::{ControlError, SmartDoorError, StorageError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

/// Component states plus runtime counters
pub async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    let components = state.component_states.lock().await.clone();

    let health_info = json!({
        "status": "healthy",
        "components": components,
        "stats": state.stats.snapshot(),
        "server_info": {
            "subscribers": state.event_bus.subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}

pub async fn latest_open_door_logs(State(state): State<ServerState>) -> Response {
    let limit = state.latest_logs_limit;
    match state
        .store
        .run_blocking(move |store| store.latest_audit(limit))
        .await
    {
        Ok(records) => {
            let output: Vec<_> = records
                .into_iter()
                .map(|record| {
                    json!({
                        "id": record.id,
                        "name": record.name,
                        "timestamp": record.timestamp.to_rfc3339(),
                    })
                })
                .collect();
            (StatusCode::OK, Json(output)).into_response()
        }
        Err(e) => error_response(&SmartDoorError::from(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateControlBody {
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub request: ControlRequest,
}

pub async fn create_control(
    State(state): State<ServerState>,
    Json(body): Json<CreateControlBody>,
) -> Response {
    let Some(user_id) = body.user_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "user_id is required"})),
        )
            .into_response();
    };

    match state.control.send(user_id, body.request).await {
        Ok(control) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Control command sent",
                "control": {
                    "id": control.id,
                    "action": control.action,
                    "device_type": control.device_type,
                    "device_id": control.device_id,
                    "status": control.status,
                }
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ControlsQuery {
    pub user_id: i64,
}

pub async fn list_controls(
    State(state): State<ServerState>,
    Query(query): Query<ControlsQuery>,
) -> Response {
    match state.control.list(query.user_id).await {
        Ok(controls) => (StatusCode::OK, Json(controls)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &SmartDoorError) -> Response {
    let (status, body) = match e {
        SmartDoorError::Control(ControlError::SendFailed(source)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"message": "Failed to send command", "error": source.to_string()}),
        ),
        SmartDoorError::Control(control) => {
            (StatusCode::BAD_REQUEST, json!({"message": control.to_string()}))
        }
        SmartDoorError::Storage(StorageError::UserNotFound { .. }) => {
            (StatusCode::NOT_FOUND, json!({"message": "User not found"}))
        }
        other => {
            error!("Request failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "Internal error", "error": other.to_string()}),
            )
        }
    };

    (status, Json(body)).into_response()
}
