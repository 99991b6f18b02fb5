//! Smart Orders Module
//!
//! Catalog of smart devices, client carts and the order lifecycle
//! (`draft → formed → completed | rejected`, soft delete) with a traffic
//! estimate computed inline or by an external calculator that calls back.

// Public exports
pub mod contract;
pub use contract::{
    client::SmartOrdersApi, error::OrderError, Account, CartSummary, Device, DeviceCategory,
    Order, OrderDetails, OrderStatus, Principal, Role,
};

pub mod module;
pub use module::SmartOrdersModule;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
