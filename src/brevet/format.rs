//! JSON and CSV projections of control records.

use super::record::{ControlField, ControlRecord};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// One projected record: the selected fields, in selection order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow(Vec<(&'static str, Value)>);

impl ProjectedRow {
    fn from_record(record: &ControlRecord, fields: &[ControlField]) -> Self {
        Self(
            fields
                .iter()
                .map(|field| (field.name(), record.field(*field).clone()))
                .collect(),
        )
    }
}

// Serialized by hand so key order follows the selection rather than the
// map's sort order.
impl Serialize for ProjectedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Project records into rows holding only `fields`, preserving record order.
pub fn to_json_rows(records: &[ControlRecord], fields: &[ControlField]) -> Vec<ProjectedRow> {
    records
        .iter()
        .map(|record| ProjectedRow::from_record(record, fields))
        .collect()
}

/// Render records as CSV: a header of field names, then one line per record.
///
/// Cells are joined with `", "` and every line ends in `\n`. Strings are
/// written raw, null as an empty cell, other scalars as their JSON text.
pub fn to_csv(records: &[ControlRecord], fields: &[ControlField]) -> String {
    let header: Vec<&str> = fields.iter().map(|f| f.name()).collect();
    let mut out = header.join(", ");
    out.push('\n');

    for record in records {
        let cells: Vec<String> = fields
            .iter()
            .map(|field| csv_cell(record.field(*field)))
            .collect();
        out.push_str(&cells.join(", "));
        out.push('\n');
    }
    out
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
