//! Acknowledgment webhook handler.

use axum::{Json, extract::State, middleware};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::ACKNOWLEDGMENT_TAG;
use crate::api::dto::{AcknowledgmentRequest, DeliveryResponse};
use crate::api::middleware::webhook_auth_middleware;
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::ValidatedJson;

/// Creates the webhook route, guarded by the optional shared secret
pub fn acknowledgment_routes(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(report_acknowledgment))
        .route_layer(middleware::from_fn_with_state(state, webhook_auth_middleware))
}

/// POST /api/acknowledgments - Report a delivery outcome
///
/// Reports for attempts that already reached a final state are accepted and
/// leave the attempt unchanged.
#[utoipa::path(
    post,
    path = "/acknowledgments",
    tag = ACKNOWLEDGMENT_TAG,
    request_body = AcknowledgmentRequest,
    responses(
        (status = 200, description = "Outcome recorded", body = DeliveryResponse),
        (status = 400, description = "Invalid outcome", body = crate::api::dto::ErrorResponse),
        (status = 401, description = "Missing or invalid webhook secret", body = crate::api::dto::ErrorResponse),
        (status = 404, description = "No attempt for this provider message id", body = crate::api::dto::ErrorResponse)
    ),
    security(("webhookSecret" = []))
)]
async fn report_acknowledgment(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<AcknowledgmentRequest>,
) -> AppResult<Json<DeliveryResponse>> {
    let outcome = request.outcome()?;
    let attempt = state
        .services
        .deliveries
        .report_acknowledgment(&request.provider_message_id, outcome)?;
    Ok(Json(attempt.into()))
}
