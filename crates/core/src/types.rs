/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// External ledger resource type identifier (an ore or ice type id).
pub type ResourceTypeId = i64;
