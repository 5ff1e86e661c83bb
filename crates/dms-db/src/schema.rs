//! Database schema for the sensor

/// SQLite schema initialization
///
/// `logs` has no foreign key; deleting a rule leaves its history in place.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS rules (
    name TEXT PRIMARY KEY NOT NULL,
    kind TEXT NOT NULL,
    argument TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS logs (
    rule_name TEXT NOT NULL,
    time TEXT NOT NULL,
    result TEXT NOT NULL,
    PRIMARY KEY (rule_name, time)
);

CREATE INDEX IF NOT EXISTS idx_logs_time ON logs(time);
"#;
