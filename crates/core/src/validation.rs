//! Input validation shared by the lease and schedule stores
//!
//! Everything here runs before any I/O; failures are `Error::Validation`.

use crate::error::{Error, Result};
use crate::models::{ResourceKey, StaffSchedule};

/// Reject empty or whitespace-only identifiers
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Check a target month is `YYYY-MM` with a month between 01 and 12
pub fn validate_target_month(target_month: &str) -> Result<()> {
    require_non_empty("target_month", target_month)?;

    let bytes = target_month.as_bytes();
    let well_formed = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit);
    let month_in_range = well_formed
        && target_month[5..]
            .parse::<u8>()
            .is_ok_and(|month| (1..=12).contains(&month));

    if !month_in_range {
        return Err(Error::Validation(format!(
            "target_month '{target_month}' must be in YYYY-MM format"
        )));
    }
    Ok(())
}

pub fn validate_staff_schedules(staff_schedules: &[StaffSchedule]) -> Result<()> {
    if staff_schedules.is_empty() {
        return Err(Error::Validation("staff_schedules is empty".to_string()));
    }
    Ok(())
}

pub fn validate_resource(resource: &ResourceKey) -> Result<()> {
    require_non_empty("facility_id", &resource.facility_id)?;
    require_non_empty("target_month", &resource.target_month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_target_month_format() {
        assert!(validate_target_month("2025-11").is_ok());
        assert!(validate_target_month("1999-01").is_ok());

        for bad in ["", "2025-1", "2025/11", "25-11", "2025-13", "2025-00", "2025-11-01", "abcd-ef"] {
            let err = validate_target_month(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::ValidationError, "accepted {bad:?}");
        }
    }

    #[test]
    fn test_blank_identifier_rejected() {
        assert!(require_non_empty("holder_id", "alice").is_ok());
        assert!(require_non_empty("holder_id", "   ").is_err());
    }

    #[test]
    fn test_empty_staff_schedules_rejected() {
        assert!(validate_staff_schedules(&[]).is_err());
    }
}
