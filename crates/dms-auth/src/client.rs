//! HTTP client for the rights service

use async_trait::async_trait;
use dms_core::{Error, Result, Right, ServiceEndpoint, AUTH_TIMEOUT_SECS};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::RightsService;

/// Client for the rights service
///
/// Right lookups are anonymous. Managing users and grants needs a session
/// obtained from [`AuthServiceClient::login`]. Every call sends its
/// parameters as a urlencoded form body.
pub struct AuthServiceClient {
    base_url: Url,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SessionReply {
    session_id: String,
}

impl AuthServiceClient {
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(AUTH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::AuthService(e.to_string()))?;
        Self::with_client(&endpoint.base_url(), client)
    }

    /// Create with a custom HTTP client (useful for testing)
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid auth service URL '{}': {}", base_url, e)))?;
        Ok(Self { base_url, client })
    }

    /// Base URL plus percent-encoded `segments`
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("Auth service URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn right_url(&self, user: &str, right: Right) -> Result<Url> {
        self.url(&["users", user, "rights", right.as_str()])
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            warn!("Rights service unreachable: {}", e);
            Error::AuthService(e.to_string())
        })
    }

    /// Check whether the service is reachable at all
    pub async fn is_running(&self) -> bool {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Open a session; returns its id
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url(&["sessions"])?)
            .form(&[("username", username), ("password", password)]);
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::OK => {
                let reply: SessionReply = response
                    .json()
                    .await
                    .map_err(|e| Error::AuthService(format!("Malformed session reply: {}", e)))?;
                info!("Opened session for {}", username);
                Ok(reply.session_id)
            }
            StatusCode::UNAUTHORIZED => Err(Error::InvalidCredentials(username.to_string())),
            status => Err(unexpected(status)),
        }
    }

    pub async fn logout(&self, session_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&["sessions"])?)
            .form(&[("session_id", session_id)]);
        let response = self.send(request).await?;
        admin_outcome(response.status(), "", None)
    }

    /// Register a user with no rights
    pub async fn create_user(&self, username: &str, password: &str, session_id: &str) -> Result<()> {
        let request = self.client.post(self.url(&["users"])?).form(&[
            ("username", username),
            ("password", password),
            ("session_id", session_id),
        ]);
        let response = self.send(request).await?;
        admin_outcome(response.status(), username, None)?;
        info!("Created user {}", username);
        Ok(())
    }

    pub async fn grant(&self, user: &str, right: Right, session_id: &str) -> Result<()> {
        let request = self
            .client
            .post(self.right_url(user, right)?)
            .form(&grant_form(user, right, session_id));
        let response = self.send(request).await?;
        admin_outcome(response.status(), user, Some(right))?;
        info!("Granted {} to {}", right, user);
        Ok(())
    }

    pub async fn revoke(&self, user: &str, right: Right, session_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.right_url(user, right)?)
            .form(&grant_form(user, right, session_id));
        let response = self.send(request).await?;
        admin_outcome(response.status(), user, Some(right))?;
        info!("Revoked {} from {}", right, user);
        Ok(())
    }
}

fn grant_form<'a>(user: &'a str, right: Right, session_id: &'a str) -> [(&'static str, &'a str); 3] {
    [
        ("username", user),
        ("right", right.as_str()),
        ("session_id", session_id),
    ]
}

fn unexpected(status: StatusCode) -> Error {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => Error::AuthService("Server error".to_string()),
        _ => Error::AuthService(format!("Unexpected status {}", status)),
    }
}

/// Map the status of a session-authenticated call
fn admin_outcome(status: StatusCode, user: &str, right: Option<Right>) -> Result<()> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::BAD_REQUEST => Err(Error::validation(format!(
            "Rights service refused user '{}'",
            user
        ))),
        StatusCode::UNAUTHORIZED => Err(Error::SessionRejected),
        StatusCode::CONFLICT => Err(Error::UserAlreadyExists(user.to_string())),
        StatusCode::NOT_FOUND => Err(Error::RightUnknown {
            user: user.to_string(),
            right: right.map(|r| r.as_str()).unwrap_or_default().to_string(),
        }),
        status => Err(unexpected(status)),
    }
}

/// Map the rights service status onto the lookup outcome
fn classify(status: StatusCode, user: &str, right: Right) -> Result<bool> {
    match status {
        StatusCode::OK => Ok(true),
        StatusCode::NOT_FOUND => Err(Error::RightUnknown {
            user: user.to_string(),
            right: right.to_string(),
        }),
        StatusCode::INTERNAL_SERVER_ERROR => Err(unexpected(status)),
        _ => Ok(false),
    }
}

#[async_trait]
impl RightsService for AuthServiceClient {
    async fn has_right(&self, user: &str, right: Right) -> Result<bool> {
        let url = self.right_url(user, right)?;
        debug!("Checking right {} for {}", right, user);

        let request = self
            .client
            .get(url)
            .form(&[("username", user), ("right", right.as_str())]);
        let response = self.send(request).await?;

        classify(response.status(), user, right)
    }
}
