//! Contract layer - public API for inter-module communication
//!
//! This layer contains transport-agnostic models and the native client trait.
//! NO serde derives on models - these are pure domain types.

pub mod client;
pub mod error;
pub mod model;

pub use client::SmartOrdersApi;
pub use error::OrderError;
pub use model::{
    Account, AddItemOutcome, CartItemChange, CartSummary, CompletionPolicy, Device,
    DeviceCategory, DeviceFilter, DeviceInput, NewAccount, Order, OrderDetails, OrderFilter,
    OrderLine, OrderQuery, OrderStatus, OrderUpdate, Principal, ProfileUpdate, Role,
    SessionData, TrafficResult,
};
