use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A successful decode, emitted once before the session is torn down.
///
/// `text` is the opaque payload read from the code. The remaining fields
/// let hosts correlate the result with logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub id: Uuid,
    pub text: String,
    pub device_id: String,
    pub decoded_at: DateTime<Utc>,
}

impl DecodeResult {
    pub fn new(text: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            device_id: device_id.into(),
            decoded_at: Utc::now(),
        }
    }
}
