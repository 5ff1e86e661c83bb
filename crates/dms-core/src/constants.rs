//! Constants and default values for the sensor

use std::path::PathBuf;

/// Default home directory name
pub const DMS_DIR: &str = ".dms";

/// Default database file name
pub const DB_FILE: &str = "sensor.db";

/// Where dmsctl keeps the rights service session between commands
pub const SESSION_FILE: &str = "session";

/// Sensor config file names searched in the home directory (in priority order)
pub const SENSOR_CONFIG_FILES: &[&str] = &["sensor.toml", "sensor.yaml", "sensor.yml", "sensor.json"];

/// Client config file names searched in the home directory (in priority order)
pub const CLIENT_CONFIG_FILES: &[&str] = &["client.toml", "client.yaml", "client.yml", "client.json"];

/// Default REST bind host
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default REST port
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Default rights service host
pub const DEFAULT_AUTH_HOST: &str = "127.0.0.1";

/// Default rights service port
pub const DEFAULT_AUTH_PORT: u16 = 4000;

/// Scheduler tick period in milliseconds
pub const DEFAULT_TICK_MILLIS: u64 = 1000;

/// Ticks between two rule snapshot refreshes
pub const DEFAULT_REFRESH_EVERY_TICKS: u64 = 14;

/// Window over which CPU utilization is sampled
pub const CPU_SAMPLE_MILLIS: u64 = 500;

/// Request timeout for the rights service
pub const AUTH_TIMEOUT_SECS: u64 = 10;

/// Maximum length of a rule name
pub const MAX_RULE_NAME_LEN: usize = 32;

/// Maximum length of a rule argument
pub const MAX_ARGUMENT_LEN: usize = 1024;

/// CPU argument selecting aggregate utilization
pub const CPU_ALL: &str = "all";

/// Get the sensor home directory
pub fn dms_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(DMS_DIR))
        .unwrap_or_else(|| PathBuf::from(DMS_DIR))
}

/// Get the default database path
pub fn db_path() -> PathBuf {
    dms_home().join(DB_FILE)
}

/// Get the saved dmsctl session path
pub fn session_path() -> PathBuf {
    dms_home().join(SESSION_FILE)
}
