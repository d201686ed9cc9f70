//! Data Transfer Objects for API requests and responses.
//!
//! DTOs are organized by domain:
//! - `delivery` - Send, list, and statistics DTOs
//! - `acknowledgment` - Delivery report webhook DTOs
//! - `health` - Health probe DTOs
//! - `error` - Common error response DTOs
//! - `pagination` - Pagination-related DTOs

mod acknowledgment;
mod delivery;
mod error;
mod health;
mod pagination;

pub use acknowledgment::AcknowledgmentRequest;
pub use delivery::{
    AttemptErrorResponse, DeliveryResponse, DispatchMode, ListDeliveriesParams,
    SendDeliveryRequest, SendOptions, StatsResponse,
};
pub use error::ErrorResponse;
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use pagination::{PagedResponse, PaginationMeta};
