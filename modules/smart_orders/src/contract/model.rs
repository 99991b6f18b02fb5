//! Contract models for the smart orders service
//!
//! These models are transport-agnostic and used for inter-module communication.
//! NO serde derives - these are pure domain models.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

// ===== Catalog =====

/// Device category, drives the traffic coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    Hub,
    MotionSensor,
    Bulb,
    Socket,
    Switch,
    Other,
}

impl DeviceCategory {
    pub const ALL: [DeviceCategory; 6] = [
        DeviceCategory::Hub,
        DeviceCategory::MotionSensor,
        DeviceCategory::Bulb,
        DeviceCategory::Socket,
        DeviceCategory::Switch,
        DeviceCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceCategory::Hub => "hub",
            DeviceCategory::MotionSensor => "motion_sensor",
            DeviceCategory::Bulb => "bulb",
            DeviceCategory::Socket => "socket",
            DeviceCategory::Switch => "switch",
            DeviceCategory::Other => "other",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown device category '{}'", s))
    }
}

/// Smart device in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub model: String,
    /// Average data rate, kbit/s
    pub avg_data_rate: f64,
    /// Data volume per hour, MB
    pub data_per_hour: f64,
    /// Object-store key of the current image
    pub image_key: Option<String>,
    /// Public URL of the current image
    pub image_url: Option<String>,
    pub description: String,
    pub description_all: String,
    /// Wi-Fi, Zigbee, Bluetooth, ...
    pub protocol: String,
    pub category: DeviceCategory,
    /// `false` once the device was deleted from the catalog
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields a moderator provides when creating or replacing a device
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInput {
    pub name: String,
    pub model: String,
    pub avg_data_rate: f64,
    pub data_per_hour: f64,
    pub description: String,
    pub description_all: String,
    pub protocol: String,
    /// Inferred from the name when absent
    pub category: Option<DeviceCategory>,
}

/// Catalog listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Case-insensitive match on name or description
    pub search: Option<String>,
    pub protocol: Option<String>,
}

// ===== Accounts =====

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Moderator,
}

/// Client or moderator account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i32,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub is_moderator: bool,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    pub fn role(&self) -> Role {
        if self.is_moderator {
            Role::Moderator
        } else {
            Role::Client
        }
    }
}

/// Account to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub is_moderator: bool,
}

/// Profile change request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}

/// Value kept in the session store under an opaque token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub account_id: i32,
    pub username: String,
    pub is_moderator: bool,
}

/// Authenticated caller, threaded explicitly through every operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: i32,
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn client(account_id: i32, username: impl Into<String>) -> Self {
        Self {
            account_id,
            username: username.into(),
            role: Role::Client,
        }
    }

    pub fn moderator(account_id: i32, username: impl Into<String>) -> Self {
        Self {
            account_id,
            username: username.into(),
            role: Role::Moderator,
        }
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }

    /// Owner of the resource or a moderator
    pub fn can_manage(&self, owner_id: i32) -> bool {
        self.is_moderator() || self.account_id == owner_id
    }
}

impl From<SessionData> for Principal {
    fn from(session: SessionData) -> Self {
        Self {
            account_id: session.account_id,
            username: session.username,
            role: if session.is_moderator {
                Role::Moderator
            } else {
                Role::Client
            },
        }
    }
}

// ===== Orders =====

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Cart being filled by its owner
    Draft,
    /// Submitted, awaiting a moderator
    Formed,
    /// Formed, traffic calculation dispatched, awaiting the callback
    PendingCompletion,
    Completed,
    Rejected,
    /// Soft-deleted
    Deleted,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Draft,
        OrderStatus::Formed,
        OrderStatus::PendingCompletion,
        OrderStatus::Completed,
        OrderStatus::Rejected,
        OrderStatus::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Formed => "formed",
            OrderStatus::PendingCompletion => "pending_completion",
            OrderStatus::Completed => "completed",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown order status '{}'", s))
    }
}

/// Order header
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i32,
    pub status: OrderStatus,
    /// Owner, never changes
    pub client_id: i32,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set while the order waits for the traffic callback
    pub completion_requested_at: Option<DateTime<Utc>>,
    pub moderator_id: Option<i32>,
    pub total_traffic: f64,
    pub traffic_calculated: bool,
}

/// Line item joined with its device
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub device_id: i32,
    pub device_name: String,
    pub quantity: i32,
    pub data_per_hour: f64,
    pub category: DeviceCategory,
    pub image_url: Option<String>,
}

/// Order read model
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub client_name: String,
    pub moderator_name: Option<String>,
    pub lines: Vec<OrderLine>,
}

/// Cart badge: draft id and total quantity, zeros without a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartSummary {
    pub order_id: i32,
    pub count: i64,
}

/// Result of adding a device to the cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItemChange {
    pub order_id: i32,
    pub device_id: i32,
    /// Quantity after the change
    pub quantity: i32,
    /// `true` when a new line was inserted
    pub created: bool,
}

/// Storage outcome of the add-item sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddItemOutcome {
    Added(CartItemChange),
    /// A draft could neither be found nor created
    DraftContended,
    /// The line would exceed the per-line quantity limit; nothing was written
    QuantityLimit { current: i32 },
}

/// Editable order fields; blank values are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    pub address: Option<String>,
}

/// Listing filter as requested by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Inclusive, compared against the formation date
    pub date_from: Option<NaiveDate>,
    /// Inclusive, compared against the formation date
    pub date_to: Option<NaiveDate>,
}

/// Storage-level listing query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderQuery {
    pub client_id: Option<i32>,
    pub exclude: Vec<OrderStatus>,
    pub status: Option<OrderStatus>,
    /// `formed_at >= formed_from`
    pub formed_from: Option<DateTime<Utc>>,
    /// `formed_at < formed_before`
    pub formed_before: Option<DateTime<Utc>>,
    /// `completion_requested_at < requested_before`
    pub requested_before: Option<DateTime<Utc>>,
}

/// Callback payload of the external traffic calculator
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficResult {
    pub token: String,
    pub order_id: i32,
    pub total_traffic: f64,
}

/// How `complete` obtains the traffic total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionPolicy {
    /// Compute inline and complete immediately
    #[default]
    Sync,
    /// Dispatch to the external calculator and wait for its callback
    Async,
}
