//! Native client implementation - wraps domain service for in-process calls

use crate::contract::{
    CartSummary, Device, DeviceFilter, Order, OrderDetails, OrderError, OrderFilter, Principal,
    SmartOrdersApi,
};
use crate::domain::Service;
use async_trait::async_trait;
use std::sync::Arc;

/// Native client implementation that directly calls the domain service
///
/// This client is used for in-process communication without HTTP overhead.
#[derive(Clone)]
pub struct NativeClient {
    service: Arc<Service>,
}

impl NativeClient {
    /// Create a new native client
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SmartOrdersApi for NativeClient {
    async fn list_devices(&self, filter: DeviceFilter) -> Result<Vec<Device>, OrderError> {
        self.service.list_devices(&filter).await
    }

    async fn get_device(&self, device_id: i32) -> Result<Device, OrderError> {
        self.service.get_device(device_id).await
    }

    async fn authenticate(&self, token: &str) -> Result<Principal, OrderError> {
        self.service.authenticate(token).await
    }

    async fn cart_summary(&self, principal: &Principal) -> Result<CartSummary, OrderError> {
        self.service.cart_summary(principal).await
    }

    async fn get_order(
        &self,
        principal: &Principal,
        order_id: i32,
    ) -> Result<OrderDetails, OrderError> {
        self.service.get_order(principal, order_id).await
    }

    async fn list_orders(
        &self,
        principal: &Principal,
        filter: OrderFilter,
    ) -> Result<Vec<Order>, OrderError> {
        self.service.list_orders(principal, &filter).await
    }
}
