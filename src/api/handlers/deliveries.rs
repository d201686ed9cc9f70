//! Delivery API handlers.
//!
//! Send notifications, inspect attempts, and cancel dispatches.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use uuid::Uuid;

use crate::api::doc::DELIVERY_TAG;
use crate::api::dto::{
    DeliveryResponse, DispatchMode, ListDeliveriesParams, PagedResponse, SendDeliveryRequest,
    SendOptions, StatsResponse,
};
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

/// Creates delivery routes.
///
/// Routes:
/// - POST /deliveries             - Send (sync) or submit (`?mode=async`)
/// - GET  /deliveries             - List attempts
/// - GET  /deliveries/stats       - Counts per state
/// - GET  /deliveries/{id}        - Get attempt
/// - POST /deliveries/{id}/cancel - Cancel a dispatch
pub fn delivery_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(send_delivery, list_deliveries))
        .routes(routes!(delivery_stats))
        .routes(routes!(get_delivery))
        .routes(routes!(cancel_delivery))
}

/// POST /api/deliveries - Send a notification
///
/// Synchronous mode waits for the provider and answers `201` with the `Sent`
/// attempt. Asynchronous mode answers `202` with the `Pending` attempt.
#[utoipa::path(
    post,
    path = "/deliveries",
    tag = DELIVERY_TAG,
    params(SendOptions),
    request_body = SendDeliveryRequest,
    responses(
        (status = 201, description = "Notification accepted by the provider", body = DeliveryResponse),
        (status = 202, description = "Dispatch started in the background", body = DeliveryResponse),
        (status = 400, description = "Invalid token or payload", body = crate::api::dto::ErrorResponse),
        (status = 502, description = "Credential or provider failure; the attempt is Failed", body = crate::api::dto::ErrorResponse)
    )
)]
async fn send_delivery(
    State(state): State<AppState>,
    ValidatedQuery(options): ValidatedQuery<SendOptions>,
    ValidatedJson(request): ValidatedJson<SendDeliveryRequest>,
) -> AppResult<(StatusCode, Json<DeliveryResponse>)> {
    let deliveries = &state.services.deliveries;
    match options.mode {
        DispatchMode::Sync => {
            let attempt = deliveries
                .send(&request.target_token, request.payload)
                .await?;
            Ok((StatusCode::CREATED, Json(attempt.into())))
        }
        DispatchMode::Async => {
            let attempt = deliveries.submit(&request.target_token, request.payload)?;
            Ok((StatusCode::ACCEPTED, Json(attempt.into())))
        }
    }
}

/// GET /api/deliveries - List attempts, newest first
#[utoipa::path(
    get,
    path = "/deliveries",
    tag = DELIVERY_TAG,
    params(ListDeliveriesParams),
    responses(
        (status = 200, description = "Paginated list of attempts", body = PagedResponse<DeliveryResponse>),
        (status = 400, description = "Invalid query parameters", body = crate::api::dto::ErrorResponse)
    )
)]
async fn list_deliveries(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<ListDeliveriesParams>,
) -> AppResult<Json<PagedResponse<DeliveryResponse>>> {
    let (attempts, total) =
        state
            .services
            .deliveries
            .list(params.state, params.offset(), params.limit());

    let data = attempts.into_iter().map(DeliveryResponse::from).collect();
    Ok(Json(PagedResponse::new(
        data,
        params.page,
        params.page_size,
        total as u64,
    )))
}

/// GET /api/deliveries/stats - Attempt counts per state
#[utoipa::path(
    get,
    path = "/deliveries/stats",
    tag = DELIVERY_TAG,
    responses(
        (status = 200, description = "Counts per state", body = StatsResponse)
    )
)]
async fn delivery_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.services.deliveries.stats().into())
}

/// GET /api/deliveries/{id} - Get one attempt
#[utoipa::path(
    get,
    path = "/deliveries/{id}",
    tag = DELIVERY_TAG,
    params(
        ("id" = Uuid, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Attempt found", body = DeliveryResponse),
        (status = 404, description = "Attempt not found", body = crate::api::dto::ErrorResponse)
    )
)]
async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeliveryResponse>> {
    let attempt = state.services.deliveries.get(id)?;
    Ok(Json(attempt.into()))
}

/// POST /api/deliveries/{id}/cancel - Cancel a dispatch
///
/// Only honoured before the provider call begins; the `Pending` attempt is
/// discarded and returned.
#[utoipa::path(
    post,
    path = "/deliveries/{id}/cancel",
    tag = DELIVERY_TAG,
    params(
        ("id" = Uuid, Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Dispatch cancelled, attempt discarded", body = DeliveryResponse),
        (status = 404, description = "Attempt not found", body = crate::api::dto::ErrorResponse),
        (status = 409, description = "Provider call already started or attempt settled", body = crate::api::dto::ErrorResponse)
    )
)]
async fn cancel_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeliveryResponse>> {
    let attempt = state.services.deliveries.cancel(id)?;
    Ok(Json(attempt.into()))
}
