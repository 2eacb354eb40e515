//! Request body helpers shared by the JSON endpoints

use axum::http::{HeaderMap, header};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::api::error::ApiError;

/// Lookup requests are a handful of short fields.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Accepts `application/json` with optional parameters such as charset.
pub fn require_json_content_type(headers: &HeaderMap) -> Result<mime::Mime, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Collect the (already decompressed) body, giving up as soon as more than
/// `max_size` bytes have arrived.
pub async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = Limited::new(body, max_size)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(max_size)
            } else {
                ApiError::InvalidPayload(err.to_string())
            }
        })?
        .to_bytes();

    Ok(data.to_vec())
}
