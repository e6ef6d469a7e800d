//! fleetgrid-api: admin REST API for the fleet.
//!
//! Every route maps onto one coordinator operation. Responses use the
//! `{success, data, error}` envelope.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/instances` | List instances and queues |
//! | POST | `/api/v1/kinds/{kind}/instances` | Create one instance of a kind |
//! | DELETE | `/api/v1/kinds/{kind}/instances` | Stop every instance of a kind |
//! | POST | `/api/v1/kinds/{kind}/restart` | Restart every instance of a kind |
//! | PUT | `/api/v1/kinds/{kind}/expire` | Turn expire mode on |
//! | DELETE | `/api/v1/kinds/{kind}/expire` | Turn expire mode off |
//! | DELETE | `/api/v1/instances/{id}` | Stop one instance |
//! | POST | `/api/v1/instances/{id}/restart` | Restart one instance |
//! | POST | `/api/v1/fleet/default-set` | Start the default set |
//! | DELETE | `/api/v1/fleet` | Stop the whole fleet |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use fleetgrid_scheduler::Coordinator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
}

/// Build the complete API router.
pub fn build_router(coordinator: Arc<Coordinator>) -> Router {
    let api_state = ApiState { coordinator };

    let api_routes = Router::new()
        .route("/instances", get(handlers::list_instances))
        .route("/instances/{id}", delete(handlers::stop_instance))
        .route("/instances/{id}/restart", post(handlers::restart_instance))
        .route(
            "/kinds/{kind}/instances",
            post(handlers::create_instance).delete(handlers::stop_kind),
        )
        .route("/kinds/{kind}/restart", post(handlers::restart_kind))
        .route(
            "/kinds/{kind}/expire",
            put(handlers::set_expire).delete(handlers::clear_expire),
        )
        .route("/fleet/default-set", post(handlers::start_default_set))
        .route("/fleet", delete(handlers::stop_all))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
