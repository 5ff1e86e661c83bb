//! REST client for a sensor

use dms_core::{LogEntry, Rule, RuleKind};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Upper bound for a single request; command rules run synchronously
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Sensor failure, named after the HTTP status it arrived with
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rule failed: {0}")]
    RuleFailed(String),

    #[error("Rights service unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("Sensor unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid sensor URL: {0}")]
    InvalidUrl(String),

    #[error("No user given; pass --user or set DMS_USER")]
    MissingUser,
}

impl SensorError {
    fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => SensorError::BadRequest(message),
            StatusCode::UNAUTHORIZED => SensorError::Unauthorized(message),
            StatusCode::NOT_FOUND => SensorError::NotFound(message),
            StatusCode::CONFLICT => SensorError::Conflict(message),
            StatusCode::INTERNAL_SERVER_ERROR => SensorError::RuleFailed(message),
            StatusCode::BAD_GATEWAY => SensorError::AuthUnavailable(message),
            _ => SensorError::Unexpected {
                status: status.as_u16(),
                message,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// `{ success, data, error }` body every sensor endpoint answers with
#[derive(Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

pub struct SensorClient {
    base_url: Url,
    user: Option<String>,
    http: reqwest::Client,
}

impl SensorClient {
    pub fn new(base_url: &str, user: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SensorError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url,
            user,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn username(&self) -> Result<&str> {
        match self.user.as_deref() {
            Some(user) if !user.is_empty() => Ok(user),
            _ => Err(SensorError::MissingUser),
        }
    }

    /// Append `segments` to the base URL; a trailing `""` yields a trailing slash
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SensorError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Liveness check; needs no user
    pub async fn ping(&self) -> Result<serde_json::Value> {
        let response = self.http.get(self.url(&[""])?).send().await?;
        decode(response).await
    }

    pub async fn list_rules(&self) -> Result<Vec<Rule>> {
        self.get(&["rule", ""], &[]).await
    }

    pub async fn get_rule(&self, name: &str) -> Result<Rule> {
        self.get(&["rule", name], &[]).await
    }

    pub async fn create_rule(
        &self,
        name: &str,
        kind: RuleKind,
        argument: &str,
        frequency: u64,
    ) -> Result<Rule> {
        let frequency = frequency.to_string();
        let response = self
            .http
            .post(self.url(&["rule", ""])?)
            .form(&[
                ("username", self.username()?),
                ("name", name),
                ("kind", kind.as_str()),
                ("argument", argument),
                ("frequency", frequency.as_str()),
            ])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete_rule(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&["rule", name])?)
            .form(&[("username", self.username()?)])
            .send()
            .await?;
        let _: serde_json::Value = decode(response).await?;
        Ok(())
    }

    pub async fn run_rule(&self, name: &str) -> Result<String> {
        self.get(&["rule", name, "run", ""], &[]).await
    }

    pub async fn list_logs(&self, rule: Option<&str>) -> Result<Vec<LogEntry>> {
        match rule {
            Some(rule) => self.get(&["log", ""], &[("rule", rule)]).await,
            None => self.get(&["log", ""], &[]).await,
        }
    }

    pub async fn latest_log(&self, name: &str) -> Result<LogEntry> {
        self.get(&["log", name], &[]).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(segments)?;
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .query(&[("username", self.username()?)])
            .query(query)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;

    let envelope: Option<Envelope<T>> = serde_json::from_str(&text).ok();
    if status.is_success() {
        return envelope
            .and_then(|e| e.data)
            .ok_or_else(|| SensorError::Unexpected {
                status: status.as_u16(),
                message: "response carried no data".to_string(),
            });
    }

    let message = envelope.and_then(|e| e.error).unwrap_or(text);
    Err(SensorError::from_status(status, message))
}
