/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Untyped form answers as stored in `process_runs.data` / `form_submissions.data`.
pub type FormData = serde_json::Map<String, serde_json::Value>;
