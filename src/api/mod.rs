pub mod dto;
pub mod errors;
pub mod handlers;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{auth::token::JwtKeys, blynk::BlynkClient};
use handlers::{auth, blynk, irrigation, iot, pump, readings, system, users, ApiDoc};

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub keys: JwtKeys,
    pub blynk: BlynkClient,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl FromRef<AppState> for BlynkClient {
    fn from_ref(state: &AppState) -> Self {
        state.blynk.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/health", get(system::health))
        // accounts
        .route("/api/users", get(users::list_users).post(users::register_user))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::replace_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        )
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/login/refresh", post(auth::refresh))
        .route("/api/auth/me", get(auth::me))
        // web tier
        .route(
            "/api/devices/irrigation-events",
            get(irrigation::list_events).post(irrigation::create_event),
        )
        .route(
            "/api/devices/irrigation-events/{id}",
            get(irrigation::get_event)
                .put(irrigation::replace_event)
                .patch(irrigation::patch_event)
                .delete(irrigation::delete_event),
        )
        .route(
            "/api/devices/readings",
            get(readings::list_readings).post(readings::create_reading),
        )
        .route(
            "/api/devices/readings/{id}",
            get(readings::get_reading)
                .put(readings::replace_reading)
                .patch(readings::patch_reading)
                .delete(readings::delete_reading),
        )
        .route(
            "/api/devices/pump-control",
            get(pump::list_commands).post(pump::create_command),
        )
        .route(
            "/api/devices/pump-control/{id}",
            get(pump::get_command)
                .put(pump::replace_command)
                .patch(pump::patch_command)
                .delete(pump::delete_command),
        )
        // device tier
        .route(
            "/api/iot/readings",
            get(iot::list_readings).post(iot::create_reading),
        )
        .route(
            "/api/iot/pump-control",
            get(iot::list_commands).post(iot::create_command),
        )
        .route("/api/iot/pump-control/latest", get(iot::latest_command))
        .route(
            "/api/iot/pump-control/{id}",
            get(iot::get_command)
                .put(iot::replace_command)
                .patch(iot::patch_command)
                .delete(iot::delete_command),
        )
        // relay
        .route("/api/blynk/temperature", get(blynk::temperature))
        .route("/api/blynk/soil-moisture", get(blynk::soil_moisture))
        .route(
            "/api/blynk/pump-status",
            get(blynk::pump_status).post(blynk::set_pump_status),
        )
        .route("/api/blynk/dashboard-data", get(blynk::dashboard))
        .with_state(state)
        .split_for_parts();

    router
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(TraceLayer::new_for_http())
}
