/// Row identifiers (`BIGSERIAL` in every table).
pub type DbId = i64;

/// Stored as `TIMESTAMPTZ`, always handled in UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
