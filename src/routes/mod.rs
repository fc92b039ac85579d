use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::event::{
    create_event, create_event_from_form, delete_event, event_participants, list_events,
    update_event, view_event,
};
use crate::handlers::health_check;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
}

pub fn create_routes(pool: SqlitePool) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(list_events))
        .route("/event", post(create_event))
        .route("/event/edit", post(create_event_from_form))
        .route(
            "/event/:event_id",
            get(view_event).patch(update_event).delete(delete_event),
        )
        .route("/event/:event_id/participants", get(event_participants))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(AppState { pool })
}
