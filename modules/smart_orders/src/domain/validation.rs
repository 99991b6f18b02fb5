//! Input validation for orders, cart lines, devices and accounts

use crate::contract::{DeviceInput, OrderError};

/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 150;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

/// Largest quantity a single cart line may hold
pub const MAX_QUANTITY: i32 = 10_000;

/// Validate the delivery address required to form an order
pub fn validate_address(address: &str) -> Result<(), OrderError> {
    if address.trim().is_empty() {
        return Err(OrderError::validation("address is required to form an order"));
    }
    Ok(())
}

/// Quantity requested when adding a device; non-positive values count as one
pub fn normalize_add_quantity(quantity: Option<i32>) -> i32 {
    match quantity {
        Some(q) if q > 0 => q,
        _ => 1,
    }
}

/// Validate an explicit line quantity
pub fn validate_quantity(quantity: i32) -> Result<(), OrderError> {
    if quantity <= 0 {
        return Err(OrderError::validation(format!(
            "quantity must be positive (got {})",
            quantity
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(OrderError::validation(format!(
            "quantity must not exceed {} (got {})",
            MAX_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// Validate catalog fields supplied by a moderator
pub fn validate_device_input(input: &DeviceInput) -> Result<(), OrderError> {
    if input.name.trim().is_empty() {
        return Err(OrderError::validation("device name is required"));
    }

    for (field, value) in [
        ("data_per_hour", input.data_per_hour),
        ("avg_data_rate", input.avg_data_rate),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(OrderError::validation(format!(
                "{} must be a non-negative number (got {})",
                field, value
            )));
        }
    }

    Ok(())
}

/// Validate a username
pub fn validate_username(username: &str) -> Result<(), OrderError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(OrderError::validation("username is required"));
    }
    if trimmed.chars().count() > MAX_USERNAME_LEN {
        return Err(OrderError::validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(OrderError::validation("username must not contain whitespace"));
    }
    Ok(())
}

/// Validate a new password
pub fn validate_password(password: &str) -> Result<(), OrderError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(OrderError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Validate a traffic total reported by the external calculator
pub fn validate_traffic_total(total: f64) -> Result<(), OrderError> {
    if !total.is_finite() || total < 0.0 {
        return Err(OrderError::validation(format!(
            "total_traffic must be a non-negative number (got {})",
            total
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("Moscow, Tverskaya 1").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("   \t").is_err());
    }

    #[test]
    fn test_add_quantity_defaults_to_one() {
        assert_eq!(normalize_add_quantity(None), 1);
        assert_eq!(normalize_add_quantity(Some(0)), 1);
        assert_eq!(normalize_add_quantity(Some(-4)), 1);
        assert_eq!(normalize_add_quantity(Some(3)), 3);
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(matches!(
            validate_quantity(0),
            Err(OrderError::Validation { .. })
        ));
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(validate_quantity(MAX_QUANTITY + 1).is_err());
        assert!(validate_quantity(i32::MAX).is_err());
    }

    #[test]
    fn test_validate_device_input() {
        let mut input = DeviceInput {
            name: "Smart Hub".to_string(),
            data_per_hour: 56.25,
            ..Default::default()
        };
        assert!(validate_device_input(&input).is_ok());

        input.data_per_hour = -1.0;
        assert!(validate_device_input(&input).is_err());

        input.data_per_hour = f64::NAN;
        assert!(validate_device_input(&input).is_err());

        input.data_per_hour = 0.0;
        input.name = "  ".to_string();
        assert!(validate_device_input(&input).is_err());
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_username("ivan").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("ivan petrov").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN + 1)).is_err());

        assert!(validate_password("secret1").is_ok());
        assert!(validate_password("abc").is_err());
    }

    #[test]
    fn test_validate_traffic_total() {
        assert!(validate_traffic_total(0.0).is_ok());
        assert!(validate_traffic_total(73.545).is_ok());
        assert!(validate_traffic_total(-0.5).is_err());
        assert!(validate_traffic_total(f64::INFINITY).is_err());
    }
}
