//! REST API handlers.
//!
//! Each handler turns its request into an `AdminCommand`, runs it on the
//! coordinator, and wraps the reply in the JSON envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use fleet_core::ServerKind;
use fleetgrid_scheduler::{AdminCommand, SchedulerError};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn status_for(err: &SchedulerError) -> StatusCode {
    match err {
        SchedulerError::UnknownInstance(_) => StatusCode::NOT_FOUND,
        SchedulerError::UnknownKind(_) | SchedulerError::MissingIdentity => StatusCode::BAD_REQUEST,
        SchedulerError::KindExpired(_)
        | SchedulerError::KindAtCapacity { .. }
        | SchedulerError::RamBudgetExceeded { .. } => StatusCode::CONFLICT,
        SchedulerError::State(_) | SchedulerError::Launch(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn run(state: &ApiState, command: AdminCommand, success: StatusCode) -> Response {
    match state.coordinator.execute(command) {
        Ok(reply) => (success, ApiResponse::ok(reply)).into_response(),
        Err(e) => error_response(&e.to_string(), status_for(&e)).into_response(),
    }
}

fn parse_kind(kind: &str) -> Result<ServerKind, Response> {
    kind.parse::<ServerKind>().map_err(|e| {
        let err = SchedulerError::from(e);
        error_response(&err.to_string(), status_for(&err)).into_response()
    })
}

// ── Instances ──────────────────────────────────────────────────

/// GET /api/v1/instances
pub async fn list_instances(State(state): State<ApiState>) -> impl IntoResponse {
    run(&state, AdminCommand::List, StatusCode::OK)
}

/// DELETE /api/v1/instances/:id
pub async fn stop_instance(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    run(&state, AdminCommand::StopInstance { instance: id }, StatusCode::ACCEPTED)
}

/// POST /api/v1/instances/:id/restart
pub async fn restart_instance(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    run(&state, AdminCommand::RestartInstance { instance: id }, StatusCode::ACCEPTED)
}

// ── Kinds ──────────────────────────────────────────────────────

/// POST /api/v1/kinds/:kind/instances
pub async fn create_instance(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    match parse_kind(&kind) {
        Ok(kind) => run(&state, AdminCommand::CreateByKind { kind }, StatusCode::CREATED),
        Err(resp) => resp,
    }
}

/// DELETE /api/v1/kinds/:kind/instances
pub async fn stop_kind(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    match parse_kind(&kind) {
        Ok(kind) => run(&state, AdminCommand::StopAllOfKind { kind }, StatusCode::ACCEPTED),
        Err(resp) => resp,
    }
}

/// POST /api/v1/kinds/:kind/restart
pub async fn restart_kind(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    match parse_kind(&kind) {
        Ok(kind) => run(&state, AdminCommand::RestartAllOfKind { kind }, StatusCode::ACCEPTED),
        Err(resp) => resp,
    }
}

/// PUT /api/v1/kinds/:kind/expire
pub async fn set_expire(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    match parse_kind(&kind) {
        Ok(kind) => run(&state, AdminCommand::SetExpire { kind }, StatusCode::OK),
        Err(resp) => resp,
    }
}

/// DELETE /api/v1/kinds/:kind/expire
pub async fn clear_expire(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    match parse_kind(&kind) {
        Ok(kind) => run(&state, AdminCommand::ClearExpire { kind }, StatusCode::OK),
        Err(resp) => resp,
    }
}

// ── Fleet ──────────────────────────────────────────────────────

/// POST /api/v1/fleet/default-set
pub async fn start_default_set(State(state): State<ApiState>) -> impl IntoResponse {
    run(&state, AdminCommand::StartDefaultSet, StatusCode::CREATED)
}

/// DELETE /api/v1/fleet
pub async fn stop_all(State(state): State<ApiState>) -> impl IntoResponse {
    run(&state, AdminCommand::StopAll, StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use fleet_core::FleetConfig;
    use fleetgrid_scheduler::{
        Coordinator, LaunchSpec, Launcher, OutboundEvent, Reclaim, Recipient, Transport,
    };
    use fleetgrid_state::InstanceId;

    struct NullLauncher;

    #[async_trait]
    impl Launcher for NullLauncher {
        async fn launch(&self, _spec: &LaunchSpec) -> anyhow::Result<()> {
            Ok(())
        }
        async fn is_alive(&self, _id: &InstanceId) -> bool {
            true
        }
        async fn terminate(&self, _id: &InstanceId) -> anyhow::Result<()> {
            Ok(())
        }
        async fn reclaim(&self, _id: &InstanceId, _disposition: &Reclaim) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NullTransport;

    impl Transport for NullTransport {
        fn send(&self, _to: Recipient, _event: OutboundEvent) {}
    }

    fn test_state() -> ApiState {
        ApiState {
            coordinator: Coordinator::new(
                FleetConfig::default(),
                Arc::new(NullLauncher),
                Arc::new(NullTransport),
            ),
        }
    }

    #[tokio::test]
    async fn list_instances_empty() {
        let state = test_state();
        let resp = list_instances(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_instance_by_kind() {
        let state = test_state();
        let resp = create_instance(State(state.clone()), Path("lobby".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(state.coordinator.registry().contains("Lobby-01"));
    }

    #[tokio::test]
    async fn unknown_kind_is_bad_request() {
        let state = test_state();
        let resp = create_instance(State(state), Path("minecraft".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn expired_kind_is_conflict() {
        let state = test_state();
        let resp = set_expire(State(state.clone()), Path("skywars".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = create_instance(State(state), Path("skywars".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn stop_unknown_instance_is_not_found() {
        let state = test_state();
        let resp = stop_instance(State(state), Path("Lobby-09".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stop_all_marks_fleet_draining() {
        let state = test_state();
        let resp = stop_all(State(state.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(state.coordinator.is_draining());
    }
}
