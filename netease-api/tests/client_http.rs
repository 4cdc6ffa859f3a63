use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use netease_api::auth::Session;
use netease_api::crypto::{decrypt_eapi_params, decrypt_linux_params};
use netease_api::{ClientConfig, CookieJar, NeteaseClient, NeteaseError, Quality};
use serde_json::{Value, json};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

fn client(base: &str, cookies: &str) -> NeteaseClient {
    NeteaseClient::with_config(ClientConfig::with_base(base), Session::from_cookie_str(cookies))
        .unwrap()
}

fn cookie_of(headers: &HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

async fn player_url(headers: HeaderMap, Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    assert!(form.contains_key("params"));
    assert_eq!(form["encSecKey"].len(), 256);
    let body = json!({
        "code": 200,
        "cookieSeen": cookie_of(&headers),
        "data": [{ "id": 12345, "url": "http://cdn.example/12345.mp3", "br": 320_000 }],
    });
    (
        [(header::SET_COOKIE, "__csrf=fresh; Path=/; HttpOnly")],
        Json(body),
    )
}

async fn eapi_echo(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    let (path, body) = decrypt_eapi_params(&form["params"]).unwrap();
    Json(json!({ "code": 200, "path": path, "body": body }))
}

async fn linux_echo(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    let envelope = decrypt_linux_params(&form["eparams"]).unwrap();
    Json(json!({ "code": 200, "envelope": envelope }))
}

async fn logout(State(code): State<Arc<AtomicI64>>) -> Json<Value> {
    Json(json!({ "code": code.load(Ordering::SeqCst) }))
}

async fn toplist(headers: HeaderMap) -> impl IntoResponse {
    if !cookie_of(&headers).contains("MUSIC_U=tok") {
        return (StatusCode::FORBIDDEN, String::new());
    }
    (
        StatusCode::OK,
        r#"<a href="/song?id=7">x</a><a href="/song?id=9">y</a>"#.to_owned(),
    )
}

async fn unavailable() -> Json<Value> {
    Json(json!({ "code": 200, "data": [{ "id": 1, "url": null, "code": 404 }] }))
}

async fn vendor(logout_code: Arc<AtomicI64>) -> String {
    let app = Router::new()
        .route("/weapi/song/enhance/player/url", post(player_url))
        .route("/eapi/song/detail", post(eapi_echo))
        .route("/api/linux/forward", post(linux_echo))
        .route("/weapi/logout", post(logout))
        .route("/discover/toplist", get(toplist))
        .with_state(logout_code);
    spawn(app).await
}

#[tokio::test]
async fn web_request_sends_cookies_and_merges_set_cookie() {
    let base = vendor(Arc::new(AtomicI64::new(200))).await;
    let client = client(&base, "MUSIC_U=tok");

    let resp = client
        .post_web("/song/enhance/player/url", &json!({ "ids": "[12345]", "br": 320_000 }))
        .await
        .unwrap();
    assert_eq!(resp["code"], 200);
    assert_eq!(resp["cookieSeen"], "MUSIC_U=tok");
    assert_eq!(client.cookie("__csrf").as_deref(), Some("fresh"));
    assert_eq!(client.cookie("MUSIC_U").as_deref(), Some("tok"));
}

#[tokio::test]
async fn track_url_returns_signed_url() {
    let base = vendor(Arc::new(AtomicI64::new(200))).await;
    let url = client(&base, "").track_url(12345, Quality::Exhigh).await.unwrap();
    assert_eq!(url, "http://cdn.example/12345.mp3");
}

#[tokio::test]
async fn null_url_is_unavailable() {
    let base = spawn(Router::new().route("/weapi/song/enhance/player/url", post(unavailable))).await;
    let err = client(&base, "").track_url(1, Quality::Standard).await.unwrap_err();
    assert!(matches!(err, NeteaseError::Unavailable(_)), "{err:?}");
}

#[tokio::test]
async fn encrypted_request_signs_api_path() {
    let base = vendor(Arc::new(AtomicI64::new(200))).await;
    let resp = client(&base, "__csrf=abc")
        .post_encrypted("/api/song/detail", &json!({ "c": "[{\"id\":1}]" }))
        .await
        .unwrap();
    assert_eq!(resp["path"], "/api/song/detail");
    assert_eq!(resp["body"]["c"], "[{\"id\":1}]");
    assert_eq!(resp["body"]["header"]["__csrf"], "abc");
}

#[tokio::test]
async fn linux_request_wraps_forward_envelope() {
    let base = vendor(Arc::new(AtomicI64::new(200))).await;
    let resp = client(&base, "")
        .post_linux("/song/lyric", &json!({ "id": 5 }))
        .await
        .unwrap();
    assert_eq!(resp["envelope"]["url"], "https://music.163.com/api/song/lyric");
    assert_eq!(resp["envelope"]["params"]["id"], 5);
}

#[tokio::test]
async fn non_200_codes_are_returned_as_is() {
    let base = vendor(Arc::new(AtomicI64::new(301))).await;
    let resp = client(&base, "MUSIC_U=tok")
        .post_web("/logout", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp["code"], 301);
}

#[tokio::test]
async fn logout_clears_cookies_only_on_success() {
    let code = Arc::new(AtomicI64::new(301));
    let base = vendor(Arc::clone(&code)).await;
    let client = client(&base, "MUSIC_U=tok");

    let err = client.logout().await.unwrap_err();
    assert!(matches!(err, NeteaseError::Denied { code: 301, .. }));
    assert_eq!(client.cookie("MUSIC_U").as_deref(), Some("tok"));

    code.store(200, Ordering::SeqCst);
    client.logout().await.unwrap();
    assert_eq!(client.cookies(), CookieJar::new());
}

#[tokio::test]
async fn get_scrapes_with_session_cookie() {
    let base = vendor(Arc::new(AtomicI64::new(200))).await;
    let ids = client(&base, "MUSIC_U=tok")
        .scrape_song_ids(&format!("{base}/discover/toplist"))
        .await
        .unwrap();
    assert_eq!(ids, vec![7, 9]);

    let err = client(&base, "")
        .get(&format!("{base}/discover/toplist"))
        .await
        .unwrap_err();
    assert!(matches!(err, NeteaseError::HttpStatus { status: 403 }), "{err:?}");
}

async fn gateway_error() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "<html><body>502 Bad Gateway</body></html>")
}

async fn throttled() -> impl IntoResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "code": -460, "message": "cheating" })),
    )
}

#[tokio::test]
async fn http_error_status_is_reported_with_its_code() {
    let base = spawn(
        Router::new()
            .route("/weapi/song/enhance/player/url", post(gateway_error))
            .route("/weapi/song/lyric", post(throttled)),
    )
    .await;
    let client = client(&base, "");

    let err = client.track_url(1, Quality::Exhigh).await.unwrap_err();
    assert!(matches!(err, NeteaseError::HttpStatus { status: 502 }), "{err:?}");

    // A decodable envelope on an error status keeps the vendor code.
    let err = client.track_lyric(1).await.unwrap_err();
    assert!(matches!(err, NeteaseError::Denied { code: -460, .. }), "{err:?}");
}

#[tokio::test]
async fn connection_failure_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&base, "").post_web("/x", &json!({})).await.unwrap_err();
    assert!(matches!(err, NeteaseError::Transport(_)));
}
