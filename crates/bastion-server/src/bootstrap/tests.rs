use std::sync::Arc;

use aide::axum::routing::{get as api_get, get_with as api_get_with, post as api_post};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use axum_test::TestServer;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

use super::*;
use crate::extract::{Json, ValidateJson};
use crate::service::{DataStore, LogMailer, MailMessage, MailService, MemoryStore};
use crate::{BoxedError, ErrorKind};

const SECRET: &str = "bootstrap-test-secret";
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
struct Note {
    #[validate(length(min = 1, max = 64))]
    title: String,
    body: String,
}

async fn ping() -> String {
    "pong".to_owned()
}

async fn create_note(
    State(store): State<Arc<dyn DataStore>>,
    ValidateJson(note): ValidateJson<Note>,
) -> handler::Result<Json<Note>> {
    store
        .ping()
        .await
        .map_err(|_| handler::ErrorKind::ServiceUnavailable.into_error())?;
    Ok(Json(note))
}

async fn broken_note() -> ValidateJson<Note> {
    ValidateJson(Note {
        title: String::new(),
        body: "untitled".to_owned(),
    })
}

async fn session(jar: SignedCookieJar) -> String {
    jar.get("jid")
        .map(|cookie| cookie.value().to_owned())
        .unwrap_or_default()
}

fn routes(context: MountContext) -> ApiRouter<AppState> {
    assert_eq!(context.prefix(), API_PREFIX);
    assert_eq!(context.data_store().name(), "memory");

    ApiRouter::new()
        .api_route("/ping", api_get(ping))
        .api_route("/notes", api_post(create_note))
        .api_route("/broken", api_get(broken_note))
        .route("/session", get(session))
}

struct DownStore;

#[async_trait]
impl DataStore for DownStore {
    fn name(&self) -> &str {
        "down"
    }

    async fn ping(&self) -> Result<(), BoxedError> {
        Err("connection refused".into())
    }
}

struct UnverifiedMailer;

#[async_trait]
impl MailService for UnverifiedMailer {
    async fn send(&self, _: MailMessage) -> Result<(), BoxedError> {
        Ok(())
    }

    async fn verify(&self) -> Result<(), BoxedError> {
        Err("smtp unreachable".into())
    }
}

struct RejectingRoutes;

#[async_trait]
impl RouteRegistrar for RejectingRoutes {
    async fn register(&self, _: MountContext) -> crate::Result<ApiRouter<AppState>> {
        Err(Error::registration("route tree refused to mount"))
    }
}

fn config() -> ConfigBundle {
    ConfigBundle::with_cookie_secret(SECRET)
}

fn dependencies() -> Dependencies {
    Dependencies::new(MemoryStore::new(), LogMailer::new())
}

async fn server_with(config: ConfigBundle) -> anyhow::Result<TestServer> {
    let instance = start(dependencies(), config, routes).await?;
    Ok(TestServer::new(instance.into_router())?)
}

fn signed_session_cookie() -> anyhow::Result<HeaderValue> {
    let key = config().cookie.signing_key()?;
    let response = SignedCookieJar::new(key)
        .add(Cookie::new("jid", "session"))
        .into_response();

    let set_cookie = response.headers()[header::SET_COOKIE].to_str()?;
    let pair = set_cookie.split(';').next().unwrap_or_default();
    Ok(HeaderValue::from_str(pair)?)
}

#[tokio::test]
async fn stages_run_in_order() -> anyhow::Result<()> {
    let instance = start(dependencies(), config(), routes).await?;
    assert_eq!(instance.stages(), BootstrapStage::ALL.as_slice());
    Ok(())
}

#[tokio::test]
async fn typestate_steps_can_be_driven_one_by_one() -> anyhow::Result<()> {
    let bootstrap = Bootstrap::new(dependencies(), config())?
        .install_schema_adapter()?
        .sign_cookies()
        .await?
        .cors()
        .await?
        .client_ip()
        .await?
        .documentation()
        .await?;
    assert_eq!(bootstrap.stages(), &BootstrapStage::ALL[..6]);

    let instance = bootstrap
        .rate_limit()
        .await?
        .security_headers()
        .await?
        .mount(&routes)
        .await?
        .ready()
        .await?;
    assert_eq!(instance.stages().len(), BootstrapStage::ALL.len());
    Ok(())
}

#[tokio::test]
async fn missing_or_empty_cookie_secret_aborts_startup() -> anyhow::Result<()> {
    for config in [
        ConfigBundle::default(),
        ConfigBundle::with_cookie_secret(""),
        ConfigBundle::with_cookie_secret("   "),
    ] {
        let Err(failure) = start(dependencies(), config, routes).await else {
            anyhow::bail!("startup succeeded without a cookie secret");
        };

        assert_eq!(failure.stage(), BootstrapStage::Configuration);
        assert_eq!(failure.error().kind(), ErrorKind::Config);
    }
    Ok(())
}

#[tokio::test]
async fn forwarded_address_drives_rate_limit() -> anyhow::Result<()> {
    let mut config = config();
    config.rate_limit.max_requests = 2;
    let server = server_with(config).await?;

    let from = |ip: &'static str| {
        server
            .get("/api/ping")
            .add_header(X_FORWARDED_FOR, HeaderValue::from_static(ip))
    };

    let first = from("203.0.113.1").await;
    first.assert_status_ok();
    assert_eq!(first.headers()["x-ratelimit-limit"], "2");
    assert_eq!(first.headers()["x-ratelimit-remaining"], "1");

    // The last admitted request of the window.
    let second = from("203.0.113.1").await;
    second.assert_status_ok();
    assert_eq!(second.headers()["x-ratelimit-remaining"], "0");

    let limited = from("203.0.113.1").await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(header::RETRY_AFTER));
    let body: Value = limited.json();
    assert_eq!(body["name"], "too_many_requests");

    from("203.0.113.2").await.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn credentialed_cross_origin_request_reflects_origin() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server
        .get("/api/ping")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://app.example.com"))
        .await;

    response.assert_status_ok();
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    Ok(())
}

#[tokio::test]
async fn security_headers_exclude_csp() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server.get("/api/ping").await;

    response.assert_status_ok();
    let headers = response.headers();
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    assert!(!headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert!(headers.contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn published_docs_describe_mounted_routes() -> anyhow::Result<()> {
    let instance = start(dependencies(), config(), routes).await?;
    let paths = instance
        .openapi()
        .paths
        .as_ref()
        .map(|paths| paths.paths.len())
        .unwrap_or_default();
    assert!(paths >= 3);

    let server = TestServer::new(instance.into_router())?;
    let response = server.get("/api/docs/json").await;
    response.assert_status_ok();

    let document: Value = response.json();
    assert_eq!(document["info"]["title"], "Bastion API");
    assert!(document["paths"]["/api/notes"]["post"].is_object());
    assert!(document["paths"]["/api/ping"]["get"].is_object());

    server.get("/api/docs").await.assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn tampered_cookie_is_rejected() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server
        .get("/api/ping")
        .add_header(header::COOKIE, HeaderValue::from_static("jid=forged"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["name"], "invalid_cookie_signature");
    assert_eq!(body["resource"], "jid");
    Ok(())
}

#[tokio::test]
async fn tampered_cookie_rejection_carries_cors_headers() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server
        .get("/api/ping")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://app.example.com"))
        .add_header(header::COOKIE, HeaderValue::from_static("jid=forged"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    Ok(())
}

#[tokio::test]
async fn signed_cookie_reaches_route() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server
        .get("/api/session")
        .add_header(header::COOKIE, signed_session_cookie()?)
        .await;

    response.assert_status_ok();
    response.assert_text("session");
    Ok(())
}

#[tokio::test]
async fn valid_body_passes_unchanged() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let note = json!({ "title": "Groceries", "body": "eggs, flour" });

    let response = server.post("/api/notes").json(&note).await;
    response.assert_status_ok();
    response.assert_json(&note);
    Ok(())
}

#[tokio::test]
async fn invalid_body_names_offending_field() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server
        .post("/api/notes")
        .json(&json!({ "title": "", "body": "empty title" }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["fields"], json!(["title"]));
    Ok(())
}

#[tokio::test]
async fn response_violating_schema_is_server_fault() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server.get("/api/broken").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["name"], "internal_server_error");
    Ok(())
}

#[tokio::test]
async fn unknown_path_returns_not_found() -> anyhow::Result<()> {
    let server = server_with(config()).await?;
    let response = server.get("/api/missing").await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["name"], "not_found");
    Ok(())
}

#[tokio::test]
async fn failing_data_store_aborts_at_readiness() -> anyhow::Result<()> {
    let dependencies = Dependencies::new(DownStore, LogMailer::new());
    let routes = |_: MountContext| ApiRouter::<AppState>::new();

    let Err(failure) = start(dependencies, config(), routes).await else {
        anyhow::bail!("startup succeeded with an unreachable data store");
    };

    assert_eq!(failure.stage(), BootstrapStage::Readiness);
    assert_eq!(failure.error().kind(), ErrorKind::Dependency);
    assert!(failure.error().message().starts_with("down"));
    Ok(())
}

#[tokio::test]
async fn failing_registrar_aborts_at_route_mount() -> anyhow::Result<()> {
    let Err(failure) = start(dependencies(), config(), RejectingRoutes).await else {
        anyhow::bail!("startup succeeded although the routes refused to mount");
    };

    assert_eq!(failure.stage(), BootstrapStage::RouteMount);
    assert_eq!(failure.error().kind(), ErrorKind::Registration);
    Ok(())
}

#[tokio::test]
async fn unverified_mailer_does_not_abort_startup() -> anyhow::Result<()> {
    let dependencies = Dependencies::new(MemoryStore::new(), UnverifiedMailer);
    let instance = start(dependencies, config(), routes).await?;
    assert_eq!(instance.stages().last(), Some(&BootstrapStage::DocumentationPublish));
    Ok(())
}

#[tokio::test]
async fn route_claiming_docs_path_aborts_at_documentation() -> anyhow::Result<()> {
    let routes = |_: MountContext| ApiRouter::<AppState>::new().api_route("/docs", api_get(ping));

    let Err(failure) = start(dependencies(), config(), routes).await else {
        anyhow::bail!("startup succeeded although a route shadows the documentation UI");
    };

    assert_eq!(failure.stage(), BootstrapStage::Documentation);
    assert_eq!(failure.error().kind(), ErrorKind::Registration);
    Ok(())
}

#[tokio::test]
async fn documentation_errors_while_mounting_are_reported() -> anyhow::Result<()> {
    let instance = start(dependencies(), config(), routes).await?;
    assert_eq!(instance.documentation_errors(), 0);

    let undocumented = |_: MountContext| {
        ApiRouter::<AppState>::new().api_route(
            "/ping",
            api_get_with(ping, |op| op.parameter_untyped("missing", |param| param)),
        )
    };
    let instance = start(dependencies(), config(), undocumented).await?;
    assert_eq!(instance.documentation_errors(), 1);
    Ok(())
}
