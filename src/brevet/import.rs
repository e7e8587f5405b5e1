//! Loading control records from JSON files for the `import` command.

use super::record::ControlRecord;
use anyhow::{Context, Result};
use std::path::Path;

/// Read a JSON array of control records.
pub fn load_records(path: &Path) -> Result<Vec<ControlRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file: {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("Invalid records file: {}", path.display()))
}

pub fn parse_records(raw: &str) -> Result<Vec<ControlRecord>> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_array_of_controls() {
        let records = parse_records(
            r#"[
                {"open_time": 10, "close_time": 20},
                {"open_time": "2017-01-01T05:53:00+00:00", "close_time": "2017-01-01T08:00:00+00:00", "km": 200}
            ]"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], ControlRecord::new(10, 20));
        assert_eq!(records[1].extra.len(), 1);
    }

    #[test]
    fn rejects_non_array_and_incomplete_records() {
        assert!(parse_records(r#"{"open_time": 10, "close_time": 20}"#).is_err());
        assert!(parse_records(r#"[{"open_time": 10}]"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"open_time": 1, "close_time": 2}}]"#).unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records, vec![ControlRecord::new(1, 2)]);

        let err = load_records(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read records file"));
    }
}
