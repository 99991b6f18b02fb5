//! Repository traits for data access
//!
//! These traits define the interface for data access operations.
//! Implementations are in infra/storage/repositories.rs

use super::lifecycle::Transition;
use crate::contract::{
    Account, AddItemOutcome, Device, DeviceFilter, DeviceInput, NewAccount, Order, OrderLine,
    OrderQuery, OrderStatus,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository for the device catalog
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert a device; `input.category` is already resolved
    async fn create(&self, input: &DeviceInput) -> Result<Device>;

    /// Find a device, active or not
    async fn find_by_id(&self, device_id: i32) -> Result<Option<Device>>;

    /// List active devices matching the filter
    async fn list_active(&self, filter: &DeviceFilter) -> Result<Vec<Device>>;

    /// Replace the editable fields of an active device
    async fn update(&self, device_id: i32, input: &DeviceInput) -> Result<Option<Device>>;

    /// Soft delete; returns `false` if the device is absent or already inactive
    async fn deactivate(&self, device_id: i32) -> Result<bool>;

    /// Point the device at a new image (or none)
    async fn set_image(
        &self,
        device_id: i32,
        image_key: Option<String>,
        image_url: Option<String>,
    ) -> Result<bool>;
}

/// Repository for client and moderator accounts
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert an account; `None` when the username is taken
    async fn create(&self, account: &NewAccount) -> Result<Option<Account>>;

    async fn find_by_id(&self, account_id: i32) -> Result<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Change username and/or password hash; `None` when the username is taken
    async fn update_profile(
        &self,
        account_id: i32,
        username: Option<String>,
        password_hash: Option<String>,
    ) -> Result<Option<Account>>;

    async fn record_login(&self, account_id: i32, at: DateTime<Utc>) -> Result<()>;
}

/// Repository for orders and their line items
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, order_id: i32) -> Result<Option<Order>>;

    /// The client's current draft, if any
    async fn find_draft(&self, client_id: i32) -> Result<Option<Order>>;

    /// Atomically find-or-create the client's draft and add `quantity` of the
    /// device to it, incrementing an existing line
    async fn add_item(&self, client_id: i32, device_id: i32, quantity: i32)
        -> Result<AddItemOutcome>;

    /// Overwrite a line's quantity; `false` if the line does not exist
    async fn set_item_quantity(&self, order_id: i32, device_id: i32, quantity: i32)
        -> Result<bool>;

    /// Delete a line; `false` if the line does not exist
    async fn remove_item(&self, order_id: i32, device_id: i32) -> Result<bool>;

    /// Lines of an order joined with their devices
    async fn lines(&self, order_id: i32) -> Result<Vec<OrderLine>>;

    /// Sum of quantities of an order's lines
    async fn item_count(&self, order_id: i32) -> Result<i64>;

    async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>>;

    /// Set the address if the order is in one of `allowed`
    async fn update_address(
        &self,
        order_id: i32,
        allowed: &[OrderStatus],
        address: &str,
    ) -> Result<bool>;

    /// Apply a transition if the order's current status allows it;
    /// `false` when the order is absent or the guard failed
    async fn transition(&self, order_id: i32, transition: &Transition) -> Result<bool>;
}
