//! OAuth login round trip against a fake provider.

use axum::http::{header, StatusCode};
use std::time::Duration;

mod common;

use common::{app, body_string, cookie_pair, get, test_config};

/// Query value of `state` in the provider redirect.
fn state_param(location: &str) -> String {
    let url = url::Url::parse(location).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let (router, _) = app(test_config());
    let response = get(&router, "/auth/login", &[]).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://provider.test/authorize"));
    assert!(!state_param(location).is_empty());
    assert!(cookie_pair(&response, "oauthstate").is_some());
}

#[tokio::test]
async fn test_callback_signs_in() {
    let (router, provider) = app(test_config());
    let login = get(&router, "/auth/login", &[]).await;
    let state = state_param(login.headers()[header::LOCATION].to_str().unwrap());
    let cookie = cookie_pair(&login, "oauthstate").unwrap();

    let uri = format!("/auth/callback?state={}&code=abc", state);
    let callback = get(&router, &uri, &[("cookie", &cookie)]).await;

    assert_eq!(callback.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(callback.headers()[header::LOCATION], "/");
    assert!(provider.exchanged());
    assert!(cookie_pair(&callback, "session").is_some());
    assert_eq!(
        cookie_pair(&callback, "oauthstate").as_deref(),
        Some("oauthstate=")
    );
}

#[tokio::test]
async fn test_mismatched_state_never_reaches_provider() {
    let (router, provider) = app(test_config());
    let login = get(&router, "/auth/login", &[]).await;
    let cookie = cookie_pair(&login, "oauthstate").unwrap();

    let response = get(
        &router,
        "/auth/callback?state=forged&code=abc",
        &[("cookie", &cookie), ("hx-request", "true")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!provider.exchanged());
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["error"]["message"], "invalid oauth state");
}

#[tokio::test]
async fn test_missing_state_cookie_is_rejected() {
    let (router, provider) = app(test_config());
    let response = get(&router, "/auth/callback?state=abc&code=abc", &[]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!provider.exchanged());
}

#[tokio::test]
async fn test_rejected_code_is_a_client_error() {
    let (router, provider) = app(test_config());
    let login = get(&router, "/auth/login", &[]).await;
    let state = state_param(login.headers()[header::LOCATION].to_str().unwrap());
    let cookie = cookie_pair(&login, "oauthstate").unwrap();

    let uri = format!("/auth/callback?state={}&code=bad", state);
    let response = get(&router, &uri, &[("cookie", &cookie)]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(provider.exchanged());
    assert!(body_string(response).await.contains("invalid oauth code"));
}

#[tokio::test]
async fn test_expired_state_is_rejected() {
    let mut config = test_config();
    config.oauth.state_ttl_secs = 1;
    let (router, provider) = app(config);

    let login = get(&router, "/auth/login", &[]).await;
    let state = state_param(login.headers()[header::LOCATION].to_str().unwrap());
    let cookie = cookie_pair(&login, "oauthstate").unwrap();

    tokio::time::sleep(Duration::from_millis(2100)).await;

    let uri = format!("/auth/callback?state={}&code=abc", state);
    let response = get(&router, &uri, &[("cookie", &cookie)]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!provider.exchanged());
}
