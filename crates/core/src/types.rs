/// Primary keys are 24-character lowercase hex object ids.
///
/// See [`crate::object_id`] for generation and validation.
pub type DbId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
