//! Stored brevet controls and the fields a listing can select.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One brevet control: a checkpoint's open and close times.
///
/// Times are kept as JSON scalars so whatever the producer stored (ISO-8601
/// strings, epoch integers) comes back out unchanged. Any other fields ride
/// along in `extra` and are never projected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRecord {
    pub open_time: Value,
    pub close_time: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ControlRecord {
    pub fn new(open_time: impl Into<Value>, close_time: impl Into<Value>) -> Self {
        Self {
            open_time: open_time.into(),
            close_time: close_time.into(),
            extra: Map::new(),
        }
    }

    /// Value of a projectable field.
    pub fn field(&self, field: ControlField) -> &Value {
        match field {
            ControlField::OpenTime => &self.open_time,
            ControlField::CloseTime => &self.close_time,
        }
    }
}

/// The fields a listing can project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    OpenTime,
    CloseTime,
}

impl ControlField {
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenTime => "open_time",
            Self::CloseTime => "close_time",
        }
    }
}
