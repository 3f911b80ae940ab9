//! Parameter validation shared by the tools

use std::fmt::Display;

use crate::{Error, Result};

/// Trim `value` and check its length and, optionally, its allowed values
///
/// # Errors
///
/// Returns [`Error::Tool`] describing the first failed check
pub fn validate_string_param(
    value: &str,
    name: &str,
    min_len: usize,
    max_len: usize,
    allowed: Option<&[&str]>,
) -> Result<String> {
    let clean = value.trim();
    let len = clean.chars().count();

    if len < min_len {
        return Err(Error::Tool(format!(
            "parameter '{name}' too short (min {min_len} chars)"
        )));
    }
    if len > max_len {
        return Err(Error::Tool(format!(
            "parameter '{name}' too long (max {max_len} chars)"
        )));
    }
    if let Some(allowed) = allowed
        && !allowed.contains(&clean)
    {
        return Err(Error::Tool(format!(
            "parameter '{name}' must be one of: {}",
            allowed.join(", ")
        )));
    }

    Ok(clean.to_string())
}

/// Check `value` against optional inclusive bounds
///
/// # Errors
///
/// Returns [`Error::Tool`] when `value` is out of range
pub fn validate_numeric_param<T>(value: T, name: &str, min: Option<T>, max: Option<T>) -> Result<T>
where
    T: PartialOrd + Display + Copy,
{
    if let Some(min) = min
        && value < min
    {
        return Err(Error::Tool(format!("parameter '{name}' must be >= {min}")));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(Error::Tool(format!("parameter '{name}' must be <= {max}")));
    }
    Ok(value)
}
