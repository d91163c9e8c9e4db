use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: u64 = 30;
/// Hard cap on page size.
pub const MAX_LIMIT: u64 = 100;

/// Resolve caller-supplied limit/skip to effective values.
pub fn page_window(limit: Option<u64>, skip: Option<u64>) -> (u64, u64) {
    (
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        skip.unwrap_or(0),
    )
}

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Parse the lower bound of a date-range filter. Accepts an RFC 3339
/// timestamp or a bare `YYYY-MM-DD` date, which covers from midnight.
pub fn parse_date_after(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = parse_bare_date(raw)?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

/// Parse the upper bound of a date-range filter. A bare date is inclusive
/// of the whole day.
pub fn parse_date_before(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = parse_bare_date(raw)?;
    Ok(date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::microseconds(1))
}

fn parse_bare_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "'{raw}' is not a valid date (expected YYYY-MM-DD or RFC 3339)"
        ))
    })
}

/// Validate an email's general shape. Full address validation is left to the
/// upstream identity provider; this only rejects obvious garbage.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::Validation(format!("'{email}' is not a valid email")));
    }
    Ok(())
}

/// Validate a trimmed display name (1-256 Unicode characters).
pub fn validate_name(name: &str, what: &str) -> Result<(), AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 256 {
        return Err(AppError::Validation(format!(
            "{what} must be 1-256 characters"
        )));
    }
    Ok(())
}

/// Validate an ID list for bulk operations (non-empty, no duplicates).
pub fn validate_id_list(ids: &[i32], name: &str) -> Result<(), AppError> {
    if ids.is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }
    let mut seen = HashSet::new();
    for &id in ids {
        if !seen.insert(id) {
            return Err(AppError::Validation(format!("Duplicate {name} ID: {id}")));
        }
    }
    Ok(())
}

/// Batch code inferred from the leading digits of an institutional email's
/// local part (`2027abc123@...` => `"2027"`). Empty when there are none.
pub fn infer_batch(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    local.chars().take_while(|c| c.is_ascii_digit()).collect()
}
