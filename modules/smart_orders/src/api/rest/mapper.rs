//! Mapper implementations for converting between DTOs and contract models
//!
//! This module contains all From/Into implementations for bidirectional
//! conversion between REST DTOs and transport-agnostic contract models.

use super::dto::*;
use crate::contract::{self, OrderError};

// ===== Catalog conversions =====

impl From<contract::Device> for DeviceDto {
    fn from(device: contract::Device) -> Self {
        Self {
            id: device.id,
            name: device.name,
            model: device.model,
            avg_data_rate: device.avg_data_rate,
            data_per_hour: device.data_per_hour,
            image_url: device.image_url,
            description: device.description,
            description_all: device.description_all,
            protocol: device.protocol,
            category: device.category.to_string(),
        }
    }
}

impl TryFrom<DeviceRequest> for contract::DeviceInput {
    type Error = OrderError;

    fn try_from(req: DeviceRequest) -> Result<Self, Self::Error> {
        let category = req
            .category
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.parse::<contract::DeviceCategory>())
            .transpose()
            .map_err(OrderError::validation)?;

        Ok(Self {
            name: req.name,
            model: req.model,
            avg_data_rate: req.avg_data_rate,
            data_per_hour: req.data_per_hour,
            description: req.description,
            description_all: req.description_all,
            protocol: req.protocol,
            category,
        })
    }
}

impl From<DeviceListQuery> for contract::DeviceFilter {
    fn from(query: DeviceListQuery) -> Self {
        Self {
            search: query.search,
            protocol: query.protocol,
        }
    }
}

// ===== Cart conversions =====

impl From<contract::CartItemChange> for CartItemDto {
    fn from(change: contract::CartItemChange) -> Self {
        Self {
            order_id: change.order_id,
            device_id: change.device_id,
            quantity: change.quantity,
            created: change.created,
        }
    }
}

impl From<contract::CartSummary> for CartSummaryDto {
    fn from(summary: contract::CartSummary) -> Self {
        Self {
            order_id: summary.order_id,
            count: summary.count,
        }
    }
}

// ===== Order conversions =====

impl From<contract::Order> for OrderDto {
    fn from(order: contract::Order) -> Self {
        Self {
            id: order.id,
            status: order.status.to_string(),
            client_id: order.client_id,
            address: order.address,
            created_at: order.created_at,
            formed_at: order.formed_at,
            completed_at: order.completed_at,
            completion_requested_at: order.completion_requested_at,
            moderator_id: order.moderator_id,
            total_traffic: order.total_traffic,
            traffic_calculated: order.traffic_calculated,
        }
    }
}

impl From<contract::OrderLine> for OrderLineDto {
    fn from(line: contract::OrderLine) -> Self {
        Self {
            device_id: line.device_id,
            device_name: line.device_name,
            quantity: line.quantity,
            data_per_hour: line.data_per_hour,
            category: line.category.to_string(),
            image_url: line.image_url,
        }
    }
}

impl From<contract::OrderDetails> for OrderDetailsDto {
    fn from(details: contract::OrderDetails) -> Self {
        Self {
            order: details.order.into(),
            client_name: details.client_name,
            moderator_name: details.moderator_name,
            items: details.lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<OrderListQuery> for contract::OrderFilter {
    type Error = OrderError;

    fn try_from(query: OrderListQuery) -> Result<Self, Self::Error> {
        let status = query
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<contract::OrderStatus>())
            .transpose()
            .map_err(OrderError::validation)?;

        Ok(Self {
            status,
            date_from: query.date_from,
            date_to: query.date_to,
        })
    }
}

impl From<UpdateOrderRequest> for contract::OrderUpdate {
    fn from(req: UpdateOrderRequest) -> Self {
        Self {
            address: req.address,
        }
    }
}

impl From<TrafficResultRequest> for contract::TrafficResult {
    fn from(req: TrafficResultRequest) -> Self {
        Self {
            token: req.token,
            order_id: req.order_id,
            total_traffic: req.total_traffic,
        }
    }
}

// ===== Account conversions =====

impl From<contract::Account> for AccountDto {
    fn from(account: contract::Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            is_moderator: account.is_moderator,
            last_login: account.last_login,
            date_joined: account.date_joined,
        }
    }
}

impl From<contract::Principal> for PrincipalDto {
    fn from(principal: contract::Principal) -> Self {
        let role = match principal.role {
            contract::Role::Client => "client",
            contract::Role::Moderator => "moderator",
        };
        Self {
            account_id: principal.account_id,
            username: principal.username,
            role: role.to_string(),
        }
    }
}

impl From<ProfileUpdateRequest> for contract::ProfileUpdate {
    fn from(req: ProfileUpdateRequest) -> Self {
        Self {
            username: req.username,
            password: req.password,
            current_password: req.current_password,
        }
    }
}
