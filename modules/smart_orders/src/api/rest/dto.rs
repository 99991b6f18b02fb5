//! REST DTOs with serde derives for HTTP API

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ===== Catalog DTOs =====

/// Device response DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceDto {
    pub id: i32,
    #[schema(example = "Smart Hub X1")]
    pub name: String,
    pub model: String,
    /// Average data rate, kbit/s
    pub avg_data_rate: f64,
    /// Data volume per hour, MB
    #[schema(example = 56.25)]
    pub data_per_hour: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub description: String,
    pub description_all: String,
    #[schema(example = "Zigbee")]
    pub protocol: String,
    #[schema(example = "hub")]
    pub category: String,
}

/// Device create/update request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeviceRequest {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub avg_data_rate: f64,
    #[serde(default)]
    pub data_per_hour: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub description_all: String,
    #[serde(default)]
    pub protocol: String,
    /// hub, motion_sensor, bulb, socket, switch or other; inferred from the
    /// name when omitted on create
    pub category: Option<String>,
}

/// Catalog listing query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceListQuery {
    /// Case-insensitive match on name or description
    pub search: Option<String>,
    pub protocol: Option<String>,
}

/// Image upload query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUploadQuery {
    /// Original file name, used for the extension
    pub filename: Option<String>,
}

// ===== Cart DTOs =====

/// Add a device to the cart
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub device_id: i32,
    /// Defaults to 1; non-positive values count as 1
    pub quantity: Option<i32>,
}

/// Set the quantity of a cart line
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// Cart line after a change
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemDto {
    pub order_id: i32,
    pub device_id: i32,
    pub quantity: i32,
    /// `true` when the line was newly inserted
    pub created: bool,
}

/// Cart badge
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartSummaryDto {
    /// Draft id, 0 without a draft
    pub order_id: i32,
    /// Total quantity of the draft's lines
    pub count: i64,
}

// ===== Order DTOs =====

/// Order response DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDto {
    pub id: i32,
    #[schema(example = "formed")]
    pub status: String,
    pub client_id: i32,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completion_requested_at: Option<DateTime<Utc>>,
    pub moderator_id: Option<i32>,
    pub total_traffic: f64,
    pub traffic_calculated: bool,
}

/// Order line with its device
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineDto {
    pub device_id: i32,
    pub device_name: String,
    pub quantity: i32,
    pub data_per_hour: f64,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
}

/// Order with lines and participants
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailsDto {
    #[serde(flatten)]
    pub order: OrderDto,
    pub client_name: String,
    pub moderator_name: Option<String>,
    pub items: Vec<OrderLineDto>,
}

/// Order listing query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    /// Inclusive, formation date (YYYY-MM-DD)
    pub date_from: Option<NaiveDate>,
    /// Inclusive, formation date (YYYY-MM-DD)
    pub date_to: Option<NaiveDate>,
}

/// Order listing response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub items: Vec<OrderDto>,
    pub total: usize,
}

/// Editable order fields; blank values are ignored
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub address: Option<String>,
}

/// Callback body of the external traffic calculator
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrafficResultRequest {
    /// Shared secret
    pub token: String,
    pub order_id: i32,
    pub total_traffic: f64,
}

// ===== Account DTOs =====

/// Registration or login credentials
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Account response DTO; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountDto {
    pub id: i32,
    pub username: String,
    pub is_moderator: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

/// Login result; the token is also set as the `session_id` cookie
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub account: AccountDto,
}

/// Current principal
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrincipalDto {
    pub account_id: i32,
    pub username: String,
    #[schema(example = "client")]
    pub role: String,
}

/// Profile change; `current_password` is required to change the password
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileUpdateRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}
