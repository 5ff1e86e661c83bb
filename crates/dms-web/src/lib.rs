//! DMS Web API Server
//!
//! REST surface of the sensor. Every endpoint except the liveness probe takes
//! a `username` parameter and is gated behind one or more rights looked up on
//! the rights service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use dms_auth::{require_right, RightsService};
use dms_core::{Error, Right};
use dms_engine::RuleManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error half of every handler
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn with_status(status: StatusCode, err: Error) -> Self {
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::with_status(status, err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status, self.message);
        } else if self.status == StatusCode::UNAUTHORIZED {
            warn!("Refused: {}", self.message);
        }
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    manager: Arc<RuleManager>,
    rights: Arc<dyn RightsService>,
}

impl AppState {
    pub fn new(manager: Arc<RuleManager>, rights: Arc<dyn RightsService>) -> Self {
        Self { manager, rights }
    }

    /// Check `username` holds every right in `required`
    ///
    /// No username is an unknown user, so it fails like one.
    async fn authorize(&self, username: Option<&str>, required: &[Right]) -> Result<(), ApiError> {
        let user = match username {
            Some(user) if !user.is_empty() => user,
            _ => {
                let right = required.first().map(|r| r.as_str()).unwrap_or_default();
                return Err(Error::RightUnknown {
                    user: String::new(),
                    right: right.to_string(),
                }
                .into());
            }
        };
        for right in required {
            require_right(self.rights.as_ref(), user, *right).await?;
        }
        Ok(())
    }
}

/// Parameters shared by every authorized endpoint
#[derive(Debug, Default, Deserialize)]
pub struct UserParams {
    pub username: Option<String>,
}

/// Body of `POST /rule/`
#[derive(Debug, Default, Deserialize)]
pub struct CreateRuleParams {
    pub username: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<String>,
    pub argument: Option<String>,
    /// Kept as text so a non-integer surfaces as a validation error
    pub frequency: Option<String>,
}

/// Query of `GET /log/`
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub username: Option<String>,
    pub rule: Option<String>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/rule/", get(list_rules).post(create_rule))
        .route("/rule/:name", get(get_rule).delete(delete_rule))
        .route("/rule/:name/run/", get(run_rule).post(run_rule))
        .route("/log/", get(list_logs))
        .route("/log/:name", get(latest_log))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve until `shutdown` fires
pub async fn start_server(
    bind_addr: &str,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let app = create_router(state);

    info!("Starting DMS sensor API on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}

// === API Handlers ===

async fn liveness() -> impl IntoResponse {
    Json(ApiResponse::ok(serde_json::json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn list_rules(
    State(state): State<AppState>,
    Form(params): Form<UserParams>,
) -> ApiResult<Vec<dms_core::Rule>> {
    state
        .authorize(params.username.as_deref(), &[Right::AdminRules])
        .await?;
    Ok(Json(ApiResponse::ok(state.manager.list_rules().await?)))
}

async fn get_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Form(params): Form<UserParams>,
) -> ApiResult<dms_core::Rule> {
    state
        .authorize(params.username.as_deref(), &[Right::AdminRules])
        .await?;
    // An unknown name is reported as a bad request on this endpoint
    let rule = state.manager.get_rule(&name).await.map_err(|e| match e {
        Error::RuleNotFound(_) => ApiError::with_status(StatusCode::BAD_REQUEST, e),
        other => other.into(),
    })?;
    Ok(Json(ApiResponse::ok(rule)))
}

async fn create_rule(
    State(state): State<AppState>,
    Form(params): Form<CreateRuleParams>,
) -> ApiResult<dms_core::Rule> {
    state
        .authorize(params.username.as_deref(), &[Right::AdminRules])
        .await?;

    let frequency = match params.frequency.as_deref().map(str::trim) {
        None | Some("") => return Err(Error::validation("frequency is required").into()),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| Error::validation(format!("frequency must be an integer, got '{}'", raw)))?,
    };

    let rule = state
        .manager
        .create_rule(
            params.name.as_deref().unwrap_or_default(),
            params.kind.as_deref().unwrap_or_default(),
            params.argument.as_deref().unwrap_or_default(),
            frequency,
        )
        .await?;

    info!("Rule {} created", rule.name);
    Ok(Json(ApiResponse::ok(rule)))
}

async fn delete_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Form(params): Form<UserParams>,
) -> ApiResult<serde_json::Value> {
    state
        .authorize(params.username.as_deref(), &[Right::AdminRules])
        .await?;
    state.manager.delete_rule(&name).await?;

    info!("Rule {} deleted", name);
    Ok(Json(ApiResponse::ok(serde_json::json!({ "deleted": name }))))
}

async fn run_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Form(params): Form<UserParams>,
) -> ApiResult<String> {
    state
        .authorize(
            params.username.as_deref(),
            &[Right::AdminRules, Right::ViewReports],
        )
        .await?;
    let result = state.manager.run_rule(&name, &state.manager.logs()).await?;
    Ok(Json(ApiResponse::ok(result)))
}

async fn list_logs(
    State(state): State<AppState>,
    Form(query): Form<LogQuery>,
) -> ApiResult<Vec<dms_core::LogEntry>> {
    state
        .authorize(query.username.as_deref(), &[Right::ViewReports])
        .await?;
    let logs = state.manager.logs();
    let entries = match query.rule.as_deref() {
        Some(rule) if !rule.is_empty() => logs.list_for_rule(rule).await?,
        _ => logs.list_all().await?,
    };
    Ok(Json(ApiResponse::ok(entries)))
}

async fn latest_log(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Form(params): Form<UserParams>,
) -> ApiResult<dms_core::LogEntry> {
    state
        .authorize(params.username.as_deref(), &[Right::ViewReports])
        .await?;
    Ok(Json(ApiResponse::ok(state.manager.last_run(&name).await?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use dms_auth::StaticRights;
    use dms_db::Database;
    use serde_json::Value;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    async fn setup(rights: Arc<dyn RightsService>) -> (Router, Database, TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        let manager = Arc::new(RuleManager::new(db.clone()));
        (create_router(AppState::new(manager, rights)), db, dir)
    }

    fn default_rights() -> Arc<dyn RightsService> {
        Arc::new(
            StaticRights::new()
                .grant("admin", Right::AdminRules)
                .grant("admin", Right::ViewReports)
                .grant("editor", Right::AdminRules)
                .grant("viewer", Right::ViewReports)
                .user("nobody"),
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn form(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn create(app: &Router, body: &str) -> StatusCode {
        send(app, form(Method::POST, "/rule/", body)).await.0
    }

    struct UnreachableRights;

    #[async_trait]
    impl RightsService for UnreachableRights {
        async fn has_right(&self, _user: &str, _right: Right) -> dms_core::Result<bool> {
            Err(Error::AuthService("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_liveness_needs_no_user() {
        let (app, _db, _dir) = setup(default_rights()).await;
        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "running");
    }

    #[tokio::test]
    async fn test_missing_username_is_unauthorized() {
        let (app, _db, _dir) = setup(default_rights()).await;
        for uri in ["/rule/", "/rule/?username=", "/log/", "/log/ping"] {
            let (status, body) = send(&app, get(uri)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body["success"], false);
        }
        assert_eq!(
            create(&app, "name=x&kind=file&argument=%2Ftmp&frequency=0").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_unauthorized_users() {
        let (app, _db, _dir) = setup(default_rights()).await;
        for user in ["nobody", "viewer", "stranger"] {
            let (status, _) = send(&app, get(&format!("/rule/?username={}", user))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "user {}", user);
        }
        let (status, _) = send(&app, get("/rule/?username=editor")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rights_service_down() {
        let (app, _db, _dir) = setup(Arc::new(UnreachableRights)).await;
        let (status, _) = send(&app, get("/rule/?username=admin")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_create_and_get_rule() {
        let (app, _db, _dir) = setup(default_rights()).await;
        assert_eq!(
            create(&app, "username=admin&name=hosts&kind=file&argument=%2Fetc%2Fhosts&frequency=30").await,
            StatusCode::OK
        );

        let (status, body) = send(&app, get("/rule/hosts?username=admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "hosts");
        assert_eq!(body["data"]["kind"], "file");
        assert_eq!(body["data"]["argument"], "/etc/hosts");
        assert_eq!(body["data"]["frequency"], 30);

        let (_, body) = send(&app, get("/rule/?username=admin")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rule_errors() {
        let (app, _db, _dir) = setup(default_rights()).await;
        let base = "username=admin&name=r&argument=true&frequency=0";

        assert_eq!(create(&app, &format!("{}&kind=command", base)).await, StatusCode::OK);
        assert_eq!(create(&app, &format!("{}&kind=command", base)).await, StatusCode::CONFLICT);
        assert_eq!(
            create(&app, "username=admin&name=c&kind=cpu&argument=all&frequency=0").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            create(&app, "username=admin&name=f&kind=file&argument=%2Ftmp&frequency=soon").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            create(&app, "username=admin&name=f&kind=file&argument=%2Ftmp&frequency=-1").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            create(&app, "username=viewer&name=v&kind=file&argument=%2Ftmp&frequency=0").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_create_rule_requires_frequency() {
        let (app, _db, _dir) = setup(default_rights()).await;
        for body in [
            "username=admin&name=nofreq&kind=command&argument=true",
            "username=admin&name=nofreq&kind=command&argument=true&frequency=",
        ] {
            let (status, reply) = send(&app, form(Method::POST, "/rule/", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
            assert!(reply["error"].as_str().unwrap().contains("frequency"));
        }

        let (status, _) = send(&app, get("/rule/nofreq?username=admin")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_rule_is_bad_request() {
        let (app, _db, _dir) = setup(default_rights()).await;
        let (status, _) = send(&app, get("/rule/ghost?username=admin")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_rule() {
        let (app, _db, _dir) = setup(default_rights()).await;
        let (status, _) = send(&app, form(Method::DELETE, "/rule/ghost", "username=admin")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        create(&app, "username=admin&name=tmp&kind=file&argument=%2Ftmp&frequency=0").await;
        let (status, body) = send(&app, form(Method::DELETE, "/rule/tmp", "username=admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], "tmp");
    }

    #[tokio::test]
    async fn test_run_rule_and_list_logs() {
        let (app, db, _dir) = setup(default_rights()).await;
        create(&app, "username=admin&name=ping&kind=command&argument=echo+ok&frequency=0").await;

        // Running needs both rights
        let (status, _) = send(&app, get("/rule/ping/run/?username=editor")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(db.logs().list_all().await.unwrap().is_empty());

        let (status, body) = send(&app, get("/rule/ping/run/?username=admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "ok\n");

        let (status, body) = send(&app, get("/log/?username=viewer")).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body["data"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["rule_name"], "ping");
        assert_eq!(entries[0]["result"], "ok\n");

        let (status, body) = send(&app, get("/log/ping?username=viewer")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["result"], "ok\n");

        let (_, body) = send(&app, get("/log/?username=viewer&rule=other")).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, get("/log/?username=editor")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_run_rule_errors() {
        let (app, db, _dir) = setup(default_rights()).await;
        let (status, _) = send(&app, get("/rule/ghost/run/?username=admin")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        create(&app, "username=admin&name=broken&kind=command&argument=exit+4&frequency=0").await;
        let (status, body) = send(&app, get("/rule/broken/run/?username=admin")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(db.logs().list_all().await.unwrap().is_empty());

        let (status, _) = send(&app, get("/log/broken?username=admin")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
