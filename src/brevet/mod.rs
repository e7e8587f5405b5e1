//! Read-only listing of brevet controls.
//!
//! A listing picks a field selector (`listAll`, `listOpenOnly`,
//! `listCloseOnly`), an output format (`json`, `csv`) and an optional `top`
//! limit, then projects the stored controls accordingly.

pub mod format;
pub mod import;
pub mod query;
pub mod record;
pub mod repository;

pub use format::ProjectedRow;
pub use query::{Payload, QueryError, QueryService, ResultFormat, Selector};
pub use record::{ControlField, ControlRecord};
pub use repository::{InMemoryRecordRepository, RecordRepository, SqliteRecordRepository};
