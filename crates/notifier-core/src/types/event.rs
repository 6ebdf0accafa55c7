//! Storage event types and decoding
//!
//! Two payload shapes are accepted:
//! - Audit-log records (`ce-type: com.google.cloud.auditlog.event`), where
//!   the object is referenced by `protoPayload.resourceName`
//! - Direct storage notifications carrying `bucket` and `name` at the top
//!   level

use http::HeaderMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

/// CloudEvents header carrying the event type
pub const CE_TYPE_HEADER: &str = "ce-type";

/// Event type of audit-log records
pub const AUDIT_LOG_EVENT_TYPE: &str = "com.google.cloud.auditlog.event";

/// Position of the bucket in `projects/_/buckets/<bucket>/objects/<name>`
const RESOURCE_BUCKET_SEGMENT: usize = 3;

/// Position of the object name in `projects/_/buckets/<bucket>/objects/<name>`
const RESOURCE_OBJECT_SEGMENT: usize = 5;

// ============================================================================
// Errors
// ============================================================================

/// Reasons a request body cannot be turned into an [`IncomingEvent`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("field `{0}` is not a string")]
    InvalidField(&'static str),

    #[error("`{0}` is not a JSON object")]
    NotAnObject(&'static str),

    #[error("resource name `{0}` does not reference a bucket object")]
    InvalidResourceName(String),
}

// ============================================================================
// Event Shapes
// ============================================================================

/// Payload shape, selected by the `ce-type` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventShape {
    /// Cloud audit-log record
    AuditLog,
    /// Storage notification with top-level `bucket` and `name`
    Direct,
}

impl EventShape {
    pub fn from_event_type(event_type: &str) -> Self {
        if event_type == AUDIT_LOG_EVENT_TYPE {
            Self::AuditLog
        } else {
            Self::Direct
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuditLog => "audit_log",
            Self::Direct => "direct",
        }
    }
}

// ============================================================================
// Incoming Event
// ============================================================================

/// A decoded object-created event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    /// Raw `ce-type` marker, empty when the header was absent
    pub event_type: String,
    pub bucket: String,
    pub object_name: String,
}

impl IncomingEvent {
    /// Decode an event from the request headers and raw body.
    pub fn decode(headers: &HeaderMap, body: &[u8]) -> Result<Self, DecodeError> {
        let event_type = event_type_from_headers(headers);
        info!("Received ce-type '{}'", event_type);

        let (bucket, object_name) = match EventShape::from_event_type(&event_type) {
            EventShape::AuditLog => decode_audit_log(body)?,
            EventShape::Direct => decode_direct(body)?,
        };

        if bucket.is_empty() {
            return Err(DecodeError::EmptyField("bucket"));
        }
        if object_name.is_empty() {
            return Err(DecodeError::EmptyField("name"));
        }

        Ok(Self {
            event_type,
            bucket,
            object_name,
        })
    }

    pub fn shape(&self) -> EventShape {
        EventShape::from_event_type(&self.event_type)
    }
}

/// Read the `ce-type` header, treating a missing or non-ASCII value as empty.
pub fn event_type_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(CE_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn decode_audit_log(body: &[u8]) -> Result<(String, String), DecodeError> {
    let payload = parse_object(body)?;
    let proto_payload = match payload.get("protoPayload") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("protoPayload")),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(DecodeError::NotAnObject("protoPayload")),
    };
    let resource_name =
        string_field(proto_payload, "resourceName", "protoPayload.resourceName")?;

    parse_resource_name(&resource_name)
}

fn decode_direct(body: &[u8]) -> Result<(String, String), DecodeError> {
    let payload = parse_object(body)?;
    let bucket = string_field(&payload, "bucket", "bucket")?;
    let name = string_field(&payload, "name", "name")?;
    Ok((bucket, name))
}

/// Parse the body, which must be a JSON object.
fn parse_object(body: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DecodeError::NotAnObject("body")),
    }
}

fn string_field(
    map: &Map<String, Value>,
    key: &str,
    path: &'static str,
) -> Result<String, DecodeError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(path)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(DecodeError::InvalidField(path)),
    }
}

/// Split `projects/_/buckets/<bucket>/objects/<name>` into bucket and object name.
pub fn parse_resource_name(resource_name: &str) -> Result<(String, String), DecodeError> {
    let segments: Vec<&str> = resource_name.split('/').collect();
    if segments.len() <= RESOURCE_OBJECT_SEGMENT {
        return Err(DecodeError::InvalidResourceName(resource_name.to_string()));
    }

    Ok((
        segments[RESOURCE_BUCKET_SEGMENT].to_string(),
        segments[RESOURCE_OBJECT_SEGMENT].to_string(),
    ))
}
