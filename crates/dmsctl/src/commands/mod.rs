//! Command implementations

pub mod logs;
pub mod ping;
pub mod rights;
pub mod rules;
pub mod users;

use anyhow::{bail, Result};
use dms_auth::AuthServiceClient;
use dms_core::{session_path, ClientConfig, AUTH_TIMEOUT_SECS, DEFAULT_SERVER_PORT};
use std::time::Duration;
use tracing::debug;

use crate::client::SensorClient;
use crate::session;

/// Connection settings resolved from flags, environment and the client config
pub struct Context {
    pub config: ClientConfig,
    pub url: Option<String>,
    pub sensor: Option<String>,
    pub user: Option<String>,
    pub auth_url: Option<String>,
    pub session: Option<String>,
}

impl Context {
    /// `--url` wins, then the named (or first) configured sensor, then localhost
    pub fn sensor_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        if self.sensor.is_some() || !self.config.sensors.is_empty() {
            return Ok(self.config.sensor(self.sensor.as_deref())?.base_url());
        }
        Ok(format!("http://127.0.0.1:{}", DEFAULT_SERVER_PORT))
    }

    pub fn client(&self) -> Result<SensorClient> {
        let url = self.sensor_url()?;
        debug!("Using sensor at {}", url);
        Ok(SensorClient::new(&url, self.user.clone())?)
    }

    /// `--auth-url` wins over the configured rights service
    pub fn auth_client(&self) -> Result<AuthServiceClient> {
        let client = match &self.auth_url {
            Some(url) => {
                let http = reqwest::Client::builder()
                    .timeout(Duration::from_secs(AUTH_TIMEOUT_SECS))
                    .build()?;
                AuthServiceClient::with_client(url, http)?
            }
            None => AuthServiceClient::new(&self.config.auth_service)?,
        };
        Ok(client)
    }

    /// `--session` wins over the session saved by `login`
    pub fn session_id(&self) -> Result<String> {
        if let Some(id) = self.session.as_deref().filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        match session::load(&session_path())? {
            Some(id) => Ok(id),
            None => bail!("Not logged in; run `dmsctl login USER` or pass --session"),
        }
    }
}

/// Password from the flag, or a hidden prompt on a terminal
pub fn read_password(given: Option<String>, prompt: &str) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    if !atty::is(atty::Stream::Stdin) {
        bail!("No password given; pass --password or set DMS_PASSWORD");
    }
    Ok(dialoguer::Password::new().with_prompt(prompt).interact()?)
}
