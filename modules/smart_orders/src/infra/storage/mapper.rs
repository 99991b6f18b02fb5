//! Entity to model mappers
//!
//! Conversions between SeaORM entities and contract models

use super::entity::{account, device, order, order_item};
use crate::contract::{
    Account, Device, DeviceCategory, DeviceInput, Order, OrderLine, OrderStatus,
};
use sea_orm::ActiveValue::Set;

// ===== Device Conversions =====

impl From<device::Model> for Device {
    fn from(entity: device::Model) -> Self {
        let category = entity.category.parse().unwrap_or_else(|e| {
            tracing::warn!(device_id = entity.id, error = %e, "unknown stored category");
            DeviceCategory::Other
        });

        Self {
            id: entity.id,
            name: entity.name,
            model: entity.model,
            avg_data_rate: entity.avg_data_rate,
            data_per_hour: entity.data_per_hour,
            image_key: entity.image_key,
            image_url: entity.image_url,
            description: entity.description,
            description_all: entity.description_all,
            protocol: entity.protocol,
            category,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}

/// Copy the editable fields of `input` onto an active model
pub(crate) fn apply_device_input(active: &mut device::ActiveModel, input: &DeviceInput) {
    active.name = Set(input.name.clone());
    active.model = Set(input.model.clone());
    active.avg_data_rate = Set(input.avg_data_rate);
    active.data_per_hour = Set(input.data_per_hour);
    active.description = Set(input.description.clone());
    active.description_all = Set(input.description_all.clone());
    active.protocol = Set(input.protocol.clone());
    if let Some(category) = input.category {
        active.category = Set(category.as_str().to_string());
    }
}

// ===== Account Conversions =====

impl From<account::Model> for Account {
    fn from(entity: account::Model) -> Self {
        Self {
            id: entity.id,
            username: entity.username,
            password_hash: entity.password_hash,
            is_moderator: entity.is_moderator,
            is_active: entity.is_active,
            last_login: entity.last_login,
            date_joined: entity.date_joined,
        }
    }
}

// ===== Order Conversions =====

impl TryFrom<order::Model> for Order {
    type Error = anyhow::Error;

    fn try_from(entity: order::Model) -> Result<Self, Self::Error> {
        let status: OrderStatus = entity
            .status
            .parse()
            .map_err(|e: String| anyhow::anyhow!("order {}: {}", entity.id, e))?;

        Ok(Self {
            id: entity.id,
            status,
            client_id: entity.client_id,
            address: entity.address,
            created_at: entity.created_at,
            formed_at: entity.formed_at,
            completed_at: entity.completed_at,
            completion_requested_at: entity.completion_requested_at,
            moderator_id: entity.moderator_id,
            total_traffic: entity.total_traffic,
            traffic_calculated: entity.traffic_calculated,
        })
    }
}

/// Join a line item with its device
pub(crate) fn to_order_line(item: order_item::Model, device: device::Model) -> OrderLine {
    let device = Device::from(device);
    OrderLine {
        device_id: item.device_id,
        device_name: device.name,
        quantity: item.quantity,
        data_per_hour: device.data_per_hour,
        category: device.category,
        image_url: device.image_url,
    }
}
