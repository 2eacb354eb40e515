use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use super::models::QueryReportsRequest;
use crate::config::QueryConfig;
use crate::query::QueryParameters;

/// Mainland China mobile numbers: 11 digits, `1` then `3`-`9`.
const PHONE_PATTERN: &str = r"^1[3-9]\d{9}$";

static PHONE_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("name and phone are required")]
    MissingIdentity,
    #[error("invalid phone number format")]
    InvalidPhone,
    #[error("pageSize must be between 1 and {max}")]
    InvalidPageSize { max: u32 },
    #[error("currentPage must be at least 1")]
    InvalidPage,
    #[error("{field} is not a valid epoch millisecond timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: i64 },
    #[error("fromDate must not be later than toDate")]
    InvertedRange,
}

pub fn is_valid_phone(phone: &str) -> bool {
    match PHONE_REGEX.get_or_init(|| Regex::new(PHONE_PATTERN)) {
        Ok(pattern) => pattern.is_match(phone),
        Err(_) => false,
    }
}

/// Turn a raw request into pipeline parameters, filling defaults from
/// `query` relative to `now`.
pub fn build_query_parameters(
    request: QueryReportsRequest,
    query: &QueryConfig,
    now: DateTime<Utc>,
) -> Result<QueryParameters, RequestValidationError> {
    let name = non_blank(request.name).ok_or(RequestValidationError::MissingIdentity)?;
    let phone = non_blank(request.phone).ok_or(RequestValidationError::MissingIdentity)?;

    if !is_valid_phone(&phone) {
        return Err(RequestValidationError::InvalidPhone);
    }

    let page_size = request.page_size.unwrap_or(query.default_page_size);
    if page_size == 0 || page_size > query.max_page_size {
        return Err(RequestValidationError::InvalidPageSize {
            max: query.max_page_size,
        });
    }

    let current_page = request.current_page.unwrap_or(1);
    if current_page == 0 {
        return Err(RequestValidationError::InvalidPage);
    }

    let to_date = match request.to_date {
        Some(ms) => timestamp("toDate", ms)?,
        None => now,
    };
    let from_date = match request.from_date {
        Some(ms) => timestamp("fromDate", ms)?,
        None => TimeDelta::from_std(query.default_lookback.as_duration())
            .ok()
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::UNIX_EPOCH),
    };
    if from_date > to_date {
        return Err(RequestValidationError::InvertedRange);
    }

    Ok(QueryParameters {
        search_name: name,
        search_phone: phone,
        from_date,
        to_date,
        page_size,
        current_page,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn timestamp(field: &'static str, ms: i64) -> Result<DateTime<Utc>, RequestValidationError> {
    if ms < 0 {
        return Err(RequestValidationError::InvalidTimestamp { field, value: ms });
    }
    DateTime::from_timestamp_millis(ms)
        .ok_or(RequestValidationError::InvalidTimestamp { field, value: ms })
}
