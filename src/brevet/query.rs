//! Listing queries: request validation, limit parsing and projection.

use super::format::{self, ProjectedRow};
use super::record::{ControlField, ControlRecord};
use super::repository::RecordRepository;
use std::num::{IntErrorKind, NonZeroU64};
use std::sync::Arc;

/// Which fields of each control to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    OpenOnly,
    CloseOnly,
}

impl Selector {
    /// Parse the `items` path segment.
    pub fn from_path(s: &str) -> Option<Self> {
        match s {
            "listAll" => Some(Self::All),
            "listOpenOnly" => Some(Self::OpenOnly),
            "listCloseOnly" => Some(Self::CloseOnly),
            _ => None,
        }
    }

    pub fn fields(self) -> &'static [ControlField] {
        match self {
            Self::All => &[ControlField::OpenTime, ControlField::CloseTime],
            Self::OpenOnly => &[ControlField::OpenTime],
            Self::CloseOnly => &[ControlField::CloseTime],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Json,
    Csv,
}

impl ResultFormat {
    /// Parse the `resultFormat` path segment.
    pub fn from_path(s: &str) -> Option<Self> {
        match s {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// A successful listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Vec<ProjectedRow>),
    Csv(String),
}

/// Reasons a listing produced no records.
///
/// Every variant except `Store` is an informational payload, not a failure:
/// callers answer it with a normal status and `{"Error": <message>}`.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Empty Brevet")]
    EmptyCollection,

    #[error("Invalid Query")]
    InvalidQuery,

    #[error("Value Error for top")]
    InvalidNumber,

    #[error("Invalid number of top elements")]
    InvalidLimit,

    #[error("record store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl QueryError {
    /// Whether this error is reported as a `{"Error": ..}` body with a
    /// success status.
    pub fn is_payload(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

pub struct QueryService {
    repository: Arc<dyn RecordRepository>,
}

impl QueryService {
    pub fn new(repository: Arc<dyn RecordRepository>) -> Self {
        Self { repository }
    }

    /// Run a listing query.
    ///
    /// Checks run in a fixed order and the first failure wins: empty store,
    /// unknown selector or format, then the `top` limit.
    pub fn query(
        &self,
        items: &str,
        result_format: &str,
        top: Option<&str>,
    ) -> Result<Payload, QueryError> {
        if self.repository.count()? == 0 {
            return Err(QueryError::EmptyCollection);
        }

        let (Some(selector), Some(result_format)) = (
            Selector::from_path(items),
            ResultFormat::from_path(result_format),
        ) else {
            return Err(QueryError::InvalidQuery);
        };

        let limit = match top {
            Some(raw) if !raw.is_empty() => Some(parse_limit(raw)?),
            _ => None,
        };

        let records = self.repository.list(limit)?;
        tracing::debug!(
            ?selector,
            ?result_format,
            limit = limit.map(NonZeroU64::get),
            returned = records.len(),
            "Listing controls"
        );
        Ok(project(&records, selector, result_format))
    }
}

fn project(records: &[ControlRecord], selector: Selector, result_format: ResultFormat) -> Payload {
    match result_format {
        ResultFormat::Json => Payload::Json(format::to_json_rows(records, selector.fields())),
        ResultFormat::Csv => Payload::Csv(format::to_csv(records, selector.fields())),
    }
}

/// Parse a `top` value into a positive limit.
///
/// Positive values past `i64::MAX` are clamped rather than rejected.
fn parse_limit(raw: &str) -> Result<NonZeroU64, QueryError> {
    let value = match raw.trim().parse::<i64>() {
        Ok(n) => n,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => return Ok(NonZeroU64::MAX),
        Err(e) if *e.kind() == IntErrorKind::NegOverflow => {
            return Err(QueryError::InvalidLimit)
        }
        Err(_) => return Err(QueryError::InvalidNumber),
    };
    u64::try_from(value)
        .ok()
        .and_then(NonZeroU64::new)
        .ok_or(QueryError::InvalidLimit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brevet::repository::InMemoryRecordRepository;

    fn service(records: Vec<ControlRecord>) -> QueryService {
        QueryService::new(Arc::new(InMemoryRecordRepository::new(records)))
    }

    fn sample() -> QueryService {
        service(vec![ControlRecord::new(10, 20), ControlRecord::new(30, 40)])
    }

    fn json_text(payload: Payload) -> String {
        match payload {
            Payload::Json(rows) => serde_json::to_string(&rows).unwrap(),
            Payload::Csv(csv) => panic!("expected JSON, got CSV: {csv}"),
        }
    }

    fn csv_text(payload: Payload) -> String {
        match payload {
            Payload::Csv(csv) => csv,
            Payload::Json(rows) => panic!("expected CSV, got JSON: {rows:?}"),
        }
    }

    #[test]
    fn list_all_json() {
        let payload = sample().query("listAll", "json", None).unwrap();
        assert_eq!(
            json_text(payload),
            r#"[{"open_time":10,"close_time":20},{"open_time":30,"close_time":40}]"#
        );
    }

    #[test]
    fn list_open_only_csv() {
        let payload = sample().query("listOpenOnly", "csv", None).unwrap();
        assert_eq!(csv_text(payload), "open_time\n10\n30\n");
    }

    #[test]
    fn list_close_only_json() {
        let payload = sample().query("listCloseOnly", "json", None).unwrap();
        assert_eq!(
            json_text(payload),
            r#"[{"close_time":20},{"close_time":40}]"#
        );
    }

    #[test]
    fn list_all_csv_with_top() {
        let payload = sample().query("listAll", "csv", Some("1")).unwrap();
        assert_eq!(csv_text(payload), "open_time, close_time\n10, 20\n");
    }

    #[test]
    fn top_larger_than_collection_returns_everything() {
        let payload = sample().query("listAll", "csv", Some("50")).unwrap();
        assert_eq!(csv_text(payload), "open_time, close_time\n10, 20\n30, 40\n");

        let huge = "9".repeat(40);
        let payload = sample().query("listAll", "csv", Some(&huge)).unwrap();
        assert_eq!(csv_text(payload).lines().count(), 3);
    }

    #[test]
    fn empty_top_means_no_limit() {
        let payload = sample().query("listOpenOnly", "csv", Some("")).unwrap();
        assert_eq!(csv_text(payload), "open_time\n10\n30\n");
    }

    #[test]
    fn top_tolerates_surrounding_whitespace_and_sign() {
        let payload = sample().query("listOpenOnly", "csv", Some(" +1 ")).unwrap();
        assert_eq!(csv_text(payload), "open_time\n10\n");
    }

    #[test]
    fn empty_collection_wins_over_everything() {
        let empty = service(Vec::new());
        for (items, fmt, top) in [
            ("listAll", "json", None),
            ("listAll", "csv", None),
            ("bogus", "xml", Some("abc")),
            ("listOpenOnly", "csv", Some("-5")),
        ] {
            assert!(matches!(
                empty.query(items, fmt, top),
                Err(QueryError::EmptyCollection)
            ));
        }
    }

    #[test]
    fn unknown_selector_or_format_is_invalid_query() {
        let svc = sample();
        assert!(matches!(
            svc.query("bogus", "json", None),
            Err(QueryError::InvalidQuery)
        ));
        assert!(matches!(
            svc.query("listAll", "xml", None),
            Err(QueryError::InvalidQuery)
        ));
        // Selector and format are checked before the limit.
        assert!(matches!(
            svc.query("bogus", "json", Some("abc")),
            Err(QueryError::InvalidQuery)
        ));
    }

    #[test]
    fn non_numeric_top_is_invalid_number() {
        let svc = sample();
        for top in ["abc", "1.5", "1e3", "ten", " "] {
            assert!(
                matches!(
                    svc.query("listAll", "json", Some(top)),
                    Err(QueryError::InvalidNumber)
                ),
                "top = {top:?}"
            );
        }
    }

    #[test]
    fn non_positive_top_is_invalid_limit() {
        let svc = sample();
        let huge_negative = format!("-{}", "9".repeat(40));
        for top in ["0", "-5", "-0", huge_negative.as_str()] {
            assert!(
                matches!(
                    svc.query("listAll", "csv", Some(top)),
                    Err(QueryError::InvalidLimit)
                ),
                "top = {top:?}"
            );
        }
    }

    #[test]
    fn error_messages_match_wire_contract() {
        assert_eq!(QueryError::EmptyCollection.to_string(), "Empty Brevet");
        assert_eq!(QueryError::InvalidQuery.to_string(), "Invalid Query");
        assert_eq!(QueryError::InvalidNumber.to_string(), "Value Error for top");
        assert_eq!(
            QueryError::InvalidLimit.to_string(),
            "Invalid number of top elements"
        );
        assert!(QueryError::InvalidLimit.is_payload());
        assert!(!QueryError::Store(anyhow::anyhow!("down")).is_payload());
    }

    struct FailingRepository;

    impl RecordRepository for FailingRepository {
        fn count(&self) -> anyhow::Result<u64> {
            anyhow::bail!("store unreachable")
        }

        fn list(&self, _limit: Option<NonZeroU64>) -> anyhow::Result<Vec<ControlRecord>> {
            anyhow::bail!("store unreachable")
        }
    }

    #[test]
    fn store_failure_propagates() {
        let svc = QueryService::new(Arc::new(FailingRepository));
        assert!(matches!(
            svc.query("listAll", "json", None),
            Err(QueryError::Store(_))
        ));
    }
}
