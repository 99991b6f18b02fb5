//! Native client trait for inter-module communication
//!
//! Read-side API other modules use to look at the catalog and orders.
//! NO HTTP - direct function calls.

use super::{
    error::OrderError,
    model::{CartSummary, Device, DeviceFilter, Order, OrderDetails, OrderFilter, Principal},
};
use async_trait::async_trait;

/// Smart orders API for inter-module communication
#[async_trait]
pub trait SmartOrdersApi: Send + Sync {
    // ===== Catalog =====

    /// List active devices
    async fn list_devices(&self, filter: DeviceFilter) -> Result<Vec<Device>, OrderError>;

    /// Get an active device
    async fn get_device(&self, device_id: i32) -> Result<Device, OrderError>;

    // ===== Sessions =====

    /// Resolve a session token into the caller
    async fn authenticate(&self, token: &str) -> Result<Principal, OrderError>;

    // ===== Orders =====

    /// Draft id and item count of the caller's cart
    async fn cart_summary(&self, principal: &Principal) -> Result<CartSummary, OrderError>;

    /// Get an order visible to the caller
    async fn get_order(
        &self,
        principal: &Principal,
        order_id: i32,
    ) -> Result<OrderDetails, OrderError>;

    /// List orders visible to the caller
    async fn list_orders(
        &self,
        principal: &Principal,
        filter: OrderFilter,
    ) -> Result<Vec<Order>, OrderError>;
}
