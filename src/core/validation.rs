//! Validation utilities for configuration values
//!
//! Invalid values are rejected with a message naming the offending option.
//! Nothing here clamps or rounds a value into range.

/// Validate that a millisecond value is strictly positive
pub fn validate_positive_millis(name: &str, value: i64) -> Result<u64, String> {
    match value {
        v if v > 0 => Ok(v as u64),
        _ => Err(format!("'{}' must be a positive value, got {}", name, value)),
    }
}

/// Validate that a millisecond value is zero or positive
pub fn validate_non_negative_millis(name: &str, value: i64) -> Result<u64, String> {
    match value {
        v if v >= 0 => Ok(v as u64),
        _ => Err(format!("'{}' must not be negative, got {}", name, value)),
    }
}

/// Validate a capacity value; zero is allowed and means "disabled"
pub fn validate_capacity(name: &str, value: i64) -> Result<usize, String> {
    if value < 0 {
        return Err(format!("'{}' must not be negative, got {}", name, value));
    }
    usize::try_from(value).map_err(|_| format!("'{}' is too large: {}", name, value))
}

/// Validate a positive integer given as text (command-line values)
pub fn validate_positive_int(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid positive integer", value)),
    }
}
