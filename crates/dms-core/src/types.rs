//! Core types for the sensor

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::*;
use crate::error::{Error, Result};

/// Rule names end up in URL paths, so keep them to a safe alphabet
static RULE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("Invalid rule name regex"));

/// Validate a rule name
pub fn validate_rule_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("A non-empty rule name is required"));
    }
    if name.len() > MAX_RULE_NAME_LEN {
        return Err(Error::validation(format!(
            "Rule name must be at most {} characters",
            MAX_RULE_NAME_LEN
        )));
    }
    if !RULE_NAME_REGEX.is_match(name) {
        return Err(Error::validation(format!(
            "Invalid rule name '{}': only letters, digits, '_', '-' and '.' are allowed",
            name
        )));
    }
    Ok(())
}

/// Convert a signed frequency from the wire into seconds
pub fn parse_frequency(frequency: i64) -> Result<u64> {
    u64::try_from(frequency)
        .map_err(|_| Error::validation(format!("Frequency must not be negative: {}", frequency)))
}

/// The closed set of rule kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    File,
    Command,
    Cpu,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::File => "file",
            RuleKind::Command => "command",
            RuleKind::Cpu => "cpu",
        }
    }
}

impl FromStr for RuleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(RuleKind::File),
            "command" => Ok(RuleKind::Command),
            "cpu" => Ok(RuleKind::Cpu),
            _ => Err(Error::validation(format!("Unknown rule kind: {}", s))),
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted check definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
    /// Path, shell command or CPU selector depending on `kind`
    pub argument: String,
    /// Seconds between automatic runs; 0 means on demand only
    #[serde(rename = "frequency")]
    pub frequency_secs: u64,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        kind: RuleKind,
        argument: impl Into<String>,
        frequency_secs: u64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            argument: argument.into(),
            frequency_secs,
        }
    }

    /// Check field invariants before the rule is persisted
    pub fn validate(&self) -> Result<()> {
        validate_rule_name(&self.name)?;
        if self.argument.is_empty() {
            return Err(Error::validation("An argument is required"));
        }
        if self.argument.len() > MAX_ARGUMENT_LEN {
            return Err(Error::validation(format!(
                "Argument must be at most {} characters",
                MAX_ARGUMENT_LEN
            )));
        }
        Ok(())
    }

    /// Whether the scheduler should ever pick this rule up
    pub fn is_scheduled(&self) -> bool {
        self.frequency_secs != 0
    }
}

/// One timestamped execution result for a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub rule_name: String,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub result: String,
}

/// Fixed-width RFC 3339 rendering; lexical order equals chronological order
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp produced by [`format_timestamp`]
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::db(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Named rights granted by the rights service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Right {
    AdminUsers,
    AdminRights,
    AdminSensors,
    AdminRules,
    ViewReports,
}

impl Right {
    pub fn as_str(&self) -> &'static str {
        match self {
            Right::AdminUsers => "AdminUsers",
            Right::AdminRights => "AdminRights",
            Right::AdminSensors => "AdminSensors",
            Right::AdminRules => "AdminRules",
            Right::ViewReports => "ViewReports",
        }
    }
}

impl FromStr for Right {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AdminUsers" => Ok(Right::AdminUsers),
            "AdminRights" => Ok(Right::AdminRights),
            "AdminSensors" => Ok(Right::AdminSensors),
            "AdminRules" => Ok(Right::AdminRules),
            "ViewReports" => Ok(Right::ViewReports),
            _ => Err(Error::validation(format!("Unknown right: {}", s))),
        }
    }
}

impl std::fmt::Display for Right {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rule_kind_parse() {
        assert_eq!("file".parse::<RuleKind>().unwrap(), RuleKind::File);
        assert_eq!("command".parse::<RuleKind>().unwrap(), RuleKind::Command);
        assert_eq!("cpu".parse::<RuleKind>().unwrap(), RuleKind::Cpu);
        assert!(matches!(
            "script".parse::<RuleKind>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_rule_validate() {
        assert!(Rule::new("disk", RuleKind::File, "/etc/hosts", 0).validate().is_ok());
        assert!(Rule::new("", RuleKind::File, "/etc/hosts", 0).validate().is_err());
        assert!(Rule::new("disk", RuleKind::File, "", 0).validate().is_err());
        assert!(Rule::new("../etc", RuleKind::File, "/", 0).validate().is_err());
        assert!(Rule::new("a".repeat(33), RuleKind::File, "/", 0).validate().is_err());
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!(parse_frequency(0).unwrap(), 0);
        assert_eq!(parse_frequency(30).unwrap(), 30);
        assert!(matches!(parse_frequency(-1), Err(Error::Validation(_))));
    }

    #[test]
    fn test_rule_serializes_frequency_key() {
        let rule = Rule::new("ping", RuleKind::Command, "echo ok", 5);
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["kind"], "command");
        assert_eq!(json["frequency"], 5);
    }

    #[test]
    fn test_timestamp_order_is_lexical() {
        let a = Utc.with_ymd_and_hms(2021, 3, 1, 9, 59, 59).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let c = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();
        let (fa, fb, fc) = (format_timestamp(&a), format_timestamp(&b), format_timestamp(&c));
        assert!(fa < fb && fb < fc);
        assert_eq!(fa.len(), fc.len());
        assert_eq!(parse_timestamp(&fb).unwrap(), b);
    }

    #[test]
    fn test_right_roundtrip_names() {
        assert_eq!(Right::AdminRules.as_str(), "AdminRules");
        assert_eq!("ViewReports".parse::<Right>().unwrap(), Right::ViewReports);
        assert!("viewreports".parse::<Right>().is_err());
    }
}
