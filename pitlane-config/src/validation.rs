//! Custom validation functions for configuration.

use std::net::IpAddr;
use std::path::Path;

use pitlane_core::events::Category;
use validator::ValidationError;

pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    address
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_ip_address"))
}

/// Every entry must be a known category tag.
pub fn validate_categories(categories: &[String]) -> Result<(), ValidationError> {
    if categories.is_empty() {
        return Err(ValidationError::new("no_categories"));
    }
    for name in categories {
        if name.parse::<Category>().is_err() {
            let mut err = ValidationError::new("unknown_category");
            err.message = Some(format!("unknown category '{name}'").into());
            return Err(err);
        }
    }
    Ok(())
}

pub fn validate_output_dir(dir: &Path) -> Result<(), ValidationError> {
    if dir.as_os_str().is_empty() {
        Err(ValidationError::new("empty_output_dir"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_addresses() {
        assert!(validate_address("127.0.0.1").is_ok());
        assert!(validate_address("::1").is_ok());
        assert!(validate_address("localhost").is_err());
    }

    #[test]
    fn checks_category_tags() {
        assert!(validate_categories(&["lap".into(), "carTelemetry".into()]).is_ok());
        assert!(validate_categories(&[]).is_err());
        let err = validate_categories(&["tyres".into()]).unwrap_err();
        assert_eq!(err.code, "unknown_category");
    }
}
