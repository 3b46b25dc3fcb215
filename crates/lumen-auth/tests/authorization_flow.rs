//! Drives the authorization code flow end to end through the HTTP
//! surface: login form, consent submission, code exchange, and replay.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use lumen_auth::audit::TracingAuditSink;
use lumen_auth::authn::AuthHandler;
use lumen_auth::config::AuthConfig;
use lumen_auth::http::{self, HttpServices};
use lumen_auth::oauth::AuthorizationService;
use lumen_auth::storage::{
    ClientStorage, CodeStorage, InMemoryClientStorage, InMemoryCodeStorage, InMemoryTokenStorage,
    InMemoryUserStorage, TokenStorage, UserStorage,
};
use lumen_auth::token::jwt::KeyManager;
use lumen_auth::token::{OidcTokenService, TokenService};
use lumen_auth::types::{Client, GrantType};

const ISSUER: &str = "https://auth.example.com";
const REDIRECT: &str = "https://app.example.com/cb";

async fn build_app() -> Router {
    let config = AuthConfig::new(ISSUER);
    config.validate().expect("valid config");

    let clients = Arc::new(InMemoryClientStorage::new());
    clients
        .create(
            Client::public("c1", "Example App")
                .with_redirect_uri(REDIRECT)
                .with_grant_type(GrantType::AuthorizationCode),
        )
        .await
        .expect("register client");
    let clients: Arc<dyn ClientStorage> = clients;
    let codes: Arc<dyn CodeStorage> = Arc::new(InMemoryCodeStorage::new());
    let tokens: Arc<dyn TokenStorage> = Arc::new(InMemoryTokenStorage::new());
    let users: Arc<dyn UserStorage> = Arc::new(InMemoryUserStorage::new());

    let keys = Arc::new(KeyManager::generate(config.keys.clone()).expect("generate keys"));
    let oidc = Arc::new(OidcTokenService::new(
        Arc::clone(&keys),
        &config.issuer,
        Duration::from_secs(3600),
    ));
    let auth = AuthHandler::new(Arc::clone(&users));
    let audit = Arc::new(TracingAuditSink);

    let authorization = Arc::new(AuthorizationService::new(
        Arc::clone(&clients),
        Arc::clone(&codes),
        auth.clone(),
        audit.clone(),
        config.clone(),
    ));
    let token_service = Arc::new(TokenService::new(
        codes,
        tokens,
        auth,
        Arc::clone(&keys),
        Arc::clone(&oidc),
        audit,
        config,
    ));

    http::router(HttpServices {
        authorization,
        tokens: token_service,
        clients,
        keys,
        oidc,
    })
}

fn form_request(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(pairs).expect("encode form");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(body))
        .expect("build request")
}

async fn response_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn authorization_code_flow_over_http() {
    let app = build_app().await;

    // The login form knows who is asking and what to render.
    let query = serde_urlencoded::to_string([
        ("response_type", "code"),
        ("client_id", "c1"),
        ("redirect_uri", REDIRECT),
        ("state", "xyz"),
    ])
    .expect("encode query");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/authorize?{query}"))
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("GET /authorize");
    assert_eq!(response.status(), StatusCode::OK);
    let form = response_json(response).await;
    assert_eq!(form["client_name"], "Example App");
    assert_eq!(form["redirect_uri"], REDIRECT);
    assert_eq!(form["state"], "xyz");
    assert!(form.get("message").is_some());
    assert!(form["login_options"].is_array());

    // Submitting an identifier yields the redirect URL carrying the code.
    let response = app
        .clone()
        .oneshot(form_request(
            "/authorize",
            &[
                ("response_type", "code"),
                ("client_id", "c1"),
                ("redirect_uri", REDIRECT),
                ("state", "xyz"),
                ("identifier", "alice"),
            ],
        ))
        .await
        .expect("POST /authorize");
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let redirect = Url::parse(body["redirectUrl"].as_str().expect("redirectUrl string"))
        .expect("redirect URL parses");
    assert!(redirect.as_str().starts_with(REDIRECT));

    let code = redirect
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .expect("code parameter");
    assert_eq!(code.len(), 32);
    assert!(code.bytes().all(|b| b.is_ascii_hexdigit()));
    assert!(redirect.query_pairs().any(|(k, v)| k == "state" && v == "xyz"));

    // The code buys a token pair.
    let response = app
        .clone()
        .oneshot(form_request(
            "/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", REDIRECT),
                ("client_id", "c1"),
            ],
        ))
        .await
        .expect("POST /token");
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = response_json(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert!(tokens["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(tokens["refresh_token"].as_str().is_some());

    // A second redemption of the same code fails.
    let response = app
        .oneshot(form_request(
            "/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", REDIRECT),
                ("client_id", "c1"),
            ],
        ))
        .await
        .expect("second POST /token");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = response_json(response).await;
    assert_eq!(error["error"], "invalid_grant");
}
