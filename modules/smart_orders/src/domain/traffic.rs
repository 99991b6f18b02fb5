//! Traffic estimate of an order
//!
//! `total = Σ data_per_hour × quantity × coefficient(category)`

use crate::contract::{DeviceCategory, OrderLine};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Traffic multiplier per device category
pub fn coefficient(category: DeviceCategory) -> f64 {
    match category {
        DeviceCategory::Hub => 1.3,
        DeviceCategory::MotionSensor => 0.7,
        DeviceCategory::Bulb => 1.1,
        DeviceCategory::Socket => 0.9,
        DeviceCategory::Switch => 0.8,
        DeviceCategory::Other => 1.0,
    }
}

/// Name keywords of devices created before categories existed, in priority order
const LEGACY_KEYWORDS: &[(DeviceCategory, &[&str])] = &[
    (DeviceCategory::Hub, &["hub", "хаб"]),
    (
        DeviceCategory::MotionSensor,
        &["motion sensor", "sensor", "датчик"],
    ),
    (DeviceCategory::Bulb, &["bulb", "лампочка"]),
    (DeviceCategory::Socket, &["socket", "розетка"]),
    (DeviceCategory::Switch, &["switch", "выключатель"]),
];

/// Category implied by a device name, case-insensitive
pub fn infer_category(name: &str) -> DeviceCategory {
    let name = name.to_lowercase();
    LEGACY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(DeviceCategory::Other)
}

/// Weighted traffic of a single line
pub fn line_traffic(line: &OrderLine) -> f64 {
    line.data_per_hour * f64::from(line.quantity) * coefficient(line.category)
}

/// Total traffic of an order's lines
pub fn calculate_total(lines: &[OrderLine]) -> f64 {
    lines.iter().map(line_traffic).sum()
}

// ===== External calculator =====

/// Request body sent to the external calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRequest {
    pub order_id: i32,
    pub devices: Vec<TrafficRequestItem>,
}

/// One device of a calculation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRequestItem {
    pub device_id: i32,
    pub device_name: String,
    pub quantity: i32,
    pub data_per_hour: f64,
}

impl TrafficRequest {
    pub fn new(order_id: i32, lines: &[OrderLine]) -> Self {
        Self {
            order_id,
            devices: lines
                .iter()
                .map(|line| TrafficRequestItem {
                    device_id: line.device_id,
                    device_name: line.device_name.clone(),
                    quantity: line.quantity,
                    data_per_hour: line.data_per_hour,
                })
                .collect(),
        }
    }
}

/// Dispatch failure
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("calculator responded with status {0}")]
    Status(u16),
    #[error("calculator is not configured: {0}")]
    Config(String),
}

/// Hands an order to the external calculator, which later calls back
#[async_trait]
pub trait TrafficDispatcher: Send + Sync {
    /// Returns once the calculator accepted the request
    async fn dispatch(&self, request: &TrafficRequest) -> Result<(), DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, data_per_hour: f64, quantity: i32) -> OrderLine {
        OrderLine {
            device_id: 1,
            device_name: name.to_string(),
            quantity,
            data_per_hour,
            category: infer_category(name),
            image_url: None,
        }
    }

    #[test]
    fn test_hub_and_motion_sensor_total() {
        let lines = vec![
            line("Smart Hub X1", 56.25, 1),
            line("Motion sensor Aqara", 0.3, 2),
        ];
        let total = calculate_total(&lines);
        assert!((total - 73.545).abs() < 1e-9, "total = {}", total);
    }

    #[test]
    fn test_infer_category_keywords() {
        assert_eq!(infer_category("Умный Хаб Яндекс"), DeviceCategory::Hub);
        assert_eq!(infer_category("Датчик движения"), DeviceCategory::MotionSensor);
        assert_eq!(infer_category("LED bulb E27"), DeviceCategory::Bulb);
        assert_eq!(infer_category("Розетка Wi-Fi"), DeviceCategory::Socket);
        assert_eq!(infer_category("Wall SWITCH"), DeviceCategory::Switch);
        assert_eq!(infer_category("Camera"), DeviceCategory::Other);
    }

    #[test]
    fn test_keyword_priority_follows_table_order() {
        // "hub" outranks "sensor"
        assert_eq!(infer_category("Sensor hub"), DeviceCategory::Hub);
    }

    #[test]
    fn test_empty_order_has_zero_traffic() {
        assert_eq!(calculate_total(&[]), 0.0);
    }

    #[test]
    fn test_request_carries_every_line() {
        let lines = vec![line("Hub", 56.25, 1), line("Bulb", 2.0, 3)];
        let request = TrafficRequest::new(42, &lines);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["order_id"], 42);
        assert_eq!(json["devices"].as_array().unwrap().len(), 2);
        assert_eq!(json["devices"][1]["quantity"], 3);
        assert_eq!(json["devices"][0]["device_name"], "Hub");
    }
}
