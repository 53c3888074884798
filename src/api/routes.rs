use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::api::{error_response, json_error};
use crate::reservation::service::ReservationService;
use crate::reservation::types::{LifecycleRequest, ReservationRequest};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReservationService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/availability", get(list_availability))
        .route("/warehouses", get(list_warehouses))
        .route("/reservations", post(create_reservation))
        .route("/reservations/confirm", post(confirm_reservation))
        .route("/reservations/cancel", post(cancel_reservation))
        .with_state(state)
}

async fn create_reservation(
    State(state): State<AppState>,
    Json(body): Json<ReservationRequest>,
) -> Response {
    match state.service.reserve(body).await {
        Ok(reservation) => (
            StatusCode::CREATED,
            Json(json!({
                "reservation_id": reservation.id,
                "created_at": reservation.created_at,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn confirm_reservation(
    State(state): State<AppState>,
    Json(body): Json<LifecycleRequest>,
) -> Response {
    match state.service.confirm(body).await {
        Ok(changed) => Json(json!({ "lines_updated": changed })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Json(body): Json<LifecycleRequest>,
) -> Response {
    match state.service.cancel(body).await {
        Ok(changed) => Json(json!({ "lines_updated": changed })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_products(State(state): State<AppState>) -> Response {
    match state.service.products().await {
        Ok(products) => Json(products).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_warehouses(State(state): State<AppState>) -> Response {
    match state.service.warehouses().await {
        Ok(warehouses) => Json(warehouses).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct AvailabilityQuery {
    warehouse_id: Option<i64>,
}

async fn list_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    let Some(warehouse_id) = query.warehouse_id else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "warehouse_id query parameter is required",
        );
    };
    match state.service.availability(warehouse_id).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => error_response(e),
    }
}
