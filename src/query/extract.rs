//! Normalization of batch-fetch payloads into attachment shells.
//!
//! The platform is inconsistent about key names and encodings: the field map
//! may arrive as a JSON string or inline, as a list of `{fieldId, fieldData}`
//! entries or as an object keyed by field id, and attachment descriptors carry
//! their link under one of several keys. Every probe goes through [`Lookup`]
//! so a missing value is explicit.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::QueryError;
use super::types::{AttachmentShell, FormInstanceRecord};

const INSTANCE_ID_KEYS: &[&str] = &["formInstanceId", "formInstId"];
const CREATE_TIME_KEYS: &[&str] = &["createTimeGMT", "createTime", "gmtCreate"];
const FIELD_MAP_KEYS: &[&str] = &["instanceValue", "formData"];
const URL_KEYS: &[&str] = &["downloadUrl", "url", "previewUrl"];
const FILE_NAME_KEYS: &[&str] = &["name", "fileName", "title"];
const FILE_SIZE_KEYS: &[&str] = &["size", "fileSize"];

/// Outcome of probing a set of candidate keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing => None,
        }
    }
}

/// First non-empty string among `keys`, in order.
pub fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Lookup<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_str)
        .find(|value| !value.trim().is_empty())
        .map_or(Lookup::Missing, Lookup::Found)
}

/// First value among `keys` readable as an unsigned integer.
fn first_number(object: &Map<String, Value>, keys: &[&str]) -> Lookup<u64> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .map_or(Lookup::Missing, Lookup::Found)
}

/// Make a descriptor URL absolute; root-relative paths get `host` prefixed.
pub fn absolutize_url(raw: &str, host: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('/') {
        format!("{}{}", host.trim_end_matches('/'), raw)
    } else {
        raw.to_string()
    }
}

/// Resolve the source URL of one attachment descriptor.
pub fn attachment_url(descriptor: &Map<String, Value>, host: &str) -> Lookup<String> {
    match first_present(descriptor, URL_KEYS) {
        Lookup::Found(raw) => Lookup::Found(absolutize_url(raw, host)),
        Lookup::Missing => Lookup::Missing,
    }
}

/// Render a creation timestamp as `YYYY年MM月DD日` in `offset`. Values that
/// do not parse are returned unchanged.
pub fn format_create_time(raw: &str, offset: &FixedOffset) -> String {
    match parse_timestamp(raw) {
        Some(instant) => instant
            .with_timezone(offset)
            .format("%Y年%m月%d日")
            .to_string(),
        None => {
            warn!(value = raw, "Unrecognised create time format");
            raw.to_string()
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    // `2024-05-01T10:00Z` (no seconds) and plain `2024-05-01 10:00:00` are both
    // UTC on the wire.
    ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Parse one batch-fetch record.
pub fn parse_record(
    record: &Value,
    attachment_field_id: &str,
) -> Result<FormInstanceRecord, QueryError> {
    let object = record
        .as_object()
        .ok_or_else(|| QueryError::ParseFailure("record is not an object".into()))?;

    let form_instance_id = first_present(object, INSTANCE_ID_KEYS)
        .into_option()
        .ok_or_else(|| QueryError::ParseFailure("record has no form instance id".into()))?
        .to_string();

    let create_time_utc = first_present(object, CREATE_TIME_KEYS)
        .into_option()
        .map(str::to_string);

    let field_map = FIELD_MAP_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .ok_or_else(|| {
            QueryError::ParseFailure(format!("{form_instance_id}: record has no field map"))
        })?;
    let field_map = decode_embedded(field_map).map_err(|e| {
        QueryError::ParseFailure(format!("{form_instance_id}: field map is not JSON: {e}"))
    })?;

    let attachments = match attachment_values(&field_map, attachment_field_id) {
        Lookup::Found(values) => values,
        Lookup::Missing => {
            debug!(%form_instance_id, "Attachment field absent or empty");
            Vec::new()
        }
    };

    Ok(FormInstanceRecord {
        form_instance_id,
        create_time_utc,
        attachments,
    })
}

/// Values that travel as JSON-in-a-string are decoded; others pass through.
fn decode_embedded(value: &Value) -> Result<Value, serde_json::Error> {
    match value {
        Value::String(encoded) => serde_json::from_str(encoded),
        other => Ok(other.clone()),
    }
}

fn attachment_values(field_map: &Value, field_id: &str) -> Lookup<Vec<Value>> {
    let raw = match field_map {
        // [{ "fieldId": "...", "fieldData": { "value": [...] } }, ...]
        Value::Array(entries) => entries
            .iter()
            .filter_map(Value::as_object)
            .find(|entry| entry.get("fieldId").and_then(Value::as_str) == Some(field_id))
            .and_then(|entry| entry.get("fieldData"))
            .and_then(|data| data.get("value")),
        // { "<fieldId>": [...] }
        Value::Object(fields) => fields.get(field_id),
        _ => None,
    };

    match raw.map(decode_embedded) {
        Some(Ok(Value::Array(items))) if !items.is_empty() => Lookup::Found(items),
        _ => Lookup::Missing,
    }
}

/// One shell per attachment descriptor of `record`.
pub fn shells_for(
    record: &FormInstanceRecord,
    attachment_host: &str,
    display_offset: &FixedOffset,
) -> Vec<AttachmentShell> {
    let create_time_formatted = record
        .create_time_utc
        .as_deref()
        .map(|raw| format_create_time(raw, display_offset))
        .unwrap_or_default();

    record
        .attachments
        .iter()
        .map(|descriptor| {
            let (original_url, file_name, file_size_bytes) = match descriptor.as_object() {
                Some(descriptor) => (
                    attachment_url(descriptor, attachment_host)
                        .into_option()
                        .unwrap_or_default(),
                    first_present(descriptor, FILE_NAME_KEYS)
                        .into_option()
                        .map(str::to_string)
                        .unwrap_or_default(),
                    first_number(descriptor, FILE_SIZE_KEYS).into_option(),
                ),
                // Still reported, as a failure with no source url.
                None => {
                    warn!(
                        form_instance_id = %record.form_instance_id,
                        "Attachment descriptor is not an object"
                    );
                    (String::new(), String::new(), None)
                }
            };

            AttachmentShell {
                form_instance_id: record.form_instance_id.clone(),
                file_name,
                file_size_bytes,
                original_url,
                create_time_raw: record.create_time_utc.clone(),
                create_time_formatted: create_time_formatted.clone(),
            }
        })
        .collect()
}

/// Parse every record and flatten its attachments, skipping records that
/// fail to parse.
pub fn extract_attachments(
    records: &[Value],
    attachment_field_id: &str,
    attachment_host: &str,
    display_offset: &FixedOffset,
) -> Vec<AttachmentShell> {
    let mut shells = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match parse_record(record, attachment_field_id) {
            Ok(parsed) => shells.extend(shells_for(&parsed, attachment_host, display_offset)),
            Err(e) => warn!(index, error = %e, "Skipping malformed form instance"),
        }
    }

    shells
}
