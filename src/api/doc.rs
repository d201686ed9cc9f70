use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub const DELIVERY_TAG: &str = "Deliveries";
pub const ACKNOWLEDGMENT_TAG: &str = "Acknowledgments";
pub const HEALTH_TAG: &str = "Health";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "herald-rs",
        description = "Push notification delivery tracking: send, retry, and confirm delivery",
    ),
    modifiers(&SecurityAddon),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
            crate::models::AttemptState,
            crate::models::ErrorKind,
        )
    ),
    tags(
        (name = DELIVERY_TAG, description = "Send notifications and inspect delivery attempts"),
        (name = ACKNOWLEDGMENT_TAG, description = "Delivery report webhook"),
        (name = HEALTH_TAG, description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "webhookSecret",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Shared secret configured in acknowledgments.secret",
                        ))
                        .build(),
                ),
            )
        }
    }
}
