//! HTTP client for the Netease Cloud Music API.
//!
//! Every call runs the same cycle:
//!
//! 1. Attach the current cookie set
//! 2. Encode the parameters for the chosen [`Variant`]
//! 3. POST the form body
//! 4. Merge any `Set-Cookie` headers back into the jar
//! 5. Decode the body into JSON
//!
//! | Method                               | Variant     | URL                                 |
//! |--------------------------------------|-------------|-------------------------------------|
//! | [`post_web`](NeteaseClient::post_web)             | `Web`       | `{web}/weapi{path}`      |
//! | [`post_encrypted`](NeteaseClient::post_encrypted) | `Encrypted` | `{eapi}/eapi{path}`      |
//! | [`post_linux`](NeteaseClient::post_linux)         | `Linux`     | `{web}/api/linux/forward`|
//!
//! # Response format
//!
//! All API responses share this envelope:
//!
//! ```json
//! {
//!   "code": 200,
//!   ...endpoint-specific fields...
//! }
//! ```
//!
//! The `post_*` methods hand back whatever `code` the server chose; use
//! [`ensure_code`] to turn a non-200 code into [`NeteaseError::Denied`].

use crate::auth::Session;
use crate::cookie::CookieJar;
use crate::crypto::{self, Variant};
use crate::error::{NeteaseError, Result};
use rand::Rng;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, REFERER, SET_COOKIE, USER_AGENT};
use serde_json::{Value, json};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const WEB_BASE_URL: &str = "https://music.163.com";
const EAPI_BASE_URL: &str = "https://interface3.music.163.com";
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const LINUX_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/60.0.3112.90 Safari/537.36";
const MOBILE_USER_AGENT: &str = "NeteaseMusic/9.0.90.230415162012(9000090);Dalvik/2.1.0 \
    (Linux; U; Android 13; 22081212C Build/TKQ1.220829.002)";
const EAPI_APP_VERSION: &str = "9.0.90";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Endpoints and transport settings for a [`NeteaseClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host for `weapi`, `linuxapi` and plain GETs.
    pub web_base: String,
    /// Host for `eapi`.
    pub eapi_base: String,
    /// Per-request transport timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            web_base: WEB_BASE_URL.to_owned(),
            eapi_base: EAPI_BASE_URL.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Point both variants at a single host (mock servers, proxies).
    pub fn with_base(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            web_base: base.clone(),
            eapi_base: base,
            ..Self::default()
        }
    }
}

/// Async HTTP client for the Netease Cloud Music API.
///
/// Owns a [`reqwest::Client`] and the process cookie jar. The jar is only
/// mutated through [`update_cookie`](Self::update_cookie), by `Set-Cookie`
/// headers on responses, and by a confirmed [`logout`](Self::logout).
pub struct NeteaseClient {
    http: Client,
    config: ClientConfig,
    cookies: RwLock<CookieJar>,
}

impl NeteaseClient {
    /// Create a new client, loading the session from
    /// `~/.config/ncmstream/session.json`.
    pub fn new() -> Result<Self> {
        Self::with_session(Session::load()?)
    }

    /// Create a client with an explicit [`Session`] against the public hosts.
    pub fn with_session(session: Session) -> Result<Self> {
        Self::with_config(ClientConfig::default(), session)
    }

    pub fn with_config(config: ClientConfig, session: Session) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            cookies: RwLock::new(session.into_jar()),
        })
    }

    /// Send a `weapi` request.
    ///
    /// `path` is the endpoint after `/weapi`, e.g. `/song/detail`; a leading
    /// `/api` is accepted and stripped. A `csrf_token` field taken from the
    /// `__csrf` cookie is added to `params`.
    pub async fn post_web(&self, path: &str, params: &Value) -> Result<Value> {
        let path = endpoint(path);
        let mut params = params.clone();
        if let Some(obj) = params.as_object_mut() {
            obj.insert(
                "csrf_token".into(),
                Value::String(self.cookie("__csrf").unwrap_or_default()),
            );
        }
        let encoded = crypto::encode(&format!("/api{path}"), &params, Variant::Web);
        let url = format!("{}/weapi{path}", self.config.web_base);
        self.exchange(&url, Variant::Web, encoded.to_form(), DESKTOP_USER_AGENT)
            .await
    }

    /// Send an `eapi` request.
    ///
    /// The signed path is `/api{path}`; a `header` object describing the
    /// client is merged into `params` the way the mobile app does.
    pub async fn post_encrypted(&self, path: &str, params: &Value) -> Result<Value> {
        let path = endpoint(path);
        let mut params = params.clone();
        if let Some(obj) = params.as_object_mut() {
            obj.insert("header".into(), self.eapi_header());
        }
        let encoded = crypto::encode(&format!("/api{path}"), &params, Variant::Encrypted);
        let url = format!("{}/eapi{path}", self.config.eapi_base);
        self.exchange(&url, Variant::Encrypted, encoded.to_form(), MOBILE_USER_AGENT)
            .await
    }

    /// Send a `linuxapi` request through the `/api/linux/forward` gateway.
    pub async fn post_linux(&self, path: &str, params: &Value) -> Result<Value> {
        let path = endpoint(path);
        let encoded = crypto::encode(&format!("/api{path}"), params, Variant::Linux);
        let url = format!("{}/api/linux/forward", self.config.web_base);
        self.exchange(&url, Variant::Linux, encoded.to_form(), LINUX_USER_AGENT)
            .await
    }

    /// Cookie-authenticated, unencrypted GET returning the body as text.
    ///
    /// Used by page-scraping helpers; see [`crate::page`].
    pub async fn get(&self, url: &str) -> Result<String> {
        let mut req = self
            .http
            .get(url)
            .header(USER_AGENT, DESKTOP_USER_AGENT)
            .header(REFERER, WEB_BASE_URL);
        if let Some(cookie) = self.cookie_header() {
            req = req.header(COOKIE, cookie);
        }
        let resp = req.send().await?;
        self.absorb_cookies(resp.headers());
        let status = resp.status();
        if !status.is_success() {
            debug!(%url, %status, "page request refused");
            return Err(NeteaseError::HttpStatus {
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }

    /// Replace the entire cookie set; `None` clears it.
    pub fn update_cookie(&self, jar: Option<CookieJar>) {
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        *cookies = jar.unwrap_or_default();
    }

    /// Value of a single cookie.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(String::from)
    }

    /// Snapshot of the full cookie set.
    pub fn cookies(&self) -> CookieJar {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log out server-side, clearing the cookie set only once the server
    /// confirms with `code == 200`.
    pub async fn logout(&self) -> Result<()> {
        let resp = ensure_code(self.post_web("/logout", &json!({})).await?)?;
        debug!(code = ?resp.get("code"), "logout confirmed");
        self.update_cookie(None);
        info!("session cookies cleared");
        Ok(())
    }

    async fn exchange(
        &self,
        url: &str,
        variant: Variant,
        form: String,
        user_agent: &str,
    ) -> Result<Value> {
        let mut req = self
            .http
            .post(url)
            .header(USER_AGENT, user_agent)
            .header(REFERER, WEB_BASE_URL)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        if let Some(cookie) = self.cookie_header() {
            req = req.header(COOKIE, cookie);
        }

        let resp = req.body(form).send().await?;
        self.absorb_cookies(resp.headers());
        let status = resp.status();
        let raw = resp.bytes().await?;
        debug!(%url, ?variant, %status, bytes = raw.len(), "api response");

        // Error statuses that still carry an envelope are handed back as-is.
        match crypto::decode(&raw, variant) {
            Err(_) if !status.is_success() => Err(NeteaseError::HttpStatus {
                status: status.as_u16(),
            }),
            decoded => decoded,
        }
    }

    fn cookie_header(&self) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .header()
    }

    fn absorb_cookies(&self, headers: &HeaderMap) {
        let mut values = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .peekable();
        if values.peek().is_none() {
            return;
        }
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        for value in values {
            if let Some(name) = cookies.merge_set_cookie(value) {
                debug!(%name, "cookie updated from response");
            }
        }
    }

    fn eapi_header(&self) -> Value {
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        let mut header = json!({
            "os": "pc",
            "appver": EAPI_APP_VERSION,
            "requestId": request_id(),
            "__csrf": cookies.get("__csrf").unwrap_or_default(),
        });
        if let Some(music_u) = cookies.get("MUSIC_U") {
            header["MUSIC_U"] = Value::String(music_u.to_owned());
        }
        header
    }
}

/// Map a non-200 `code` to [`NeteaseError::Denied`].
///
/// Responses without a `code` field pass through unchanged.
pub fn ensure_code(json: Value) -> Result<Value> {
    match json.get("code").and_then(Value::as_i64) {
        Some(200) | None => Ok(json),
        Some(code) => {
            let message = json
                .get("message")
                .or_else(|| json.get("msg"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_owned();
            Err(NeteaseError::Denied { code, message })
        }
    }
}

/// Normalize `/api/song/detail` and `/song/detail` to `/song/detail`.
fn endpoint(path: &str) -> &str {
    path.strip_prefix("/api")
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or(path)
}

fn request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("{millis}_{:04}", rand::rng().random_range(0..1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_api_prefix() {
        assert_eq!(endpoint("/api/song/detail"), "/song/detail");
        assert_eq!(endpoint("/song/detail"), "/song/detail");
        assert_eq!(endpoint("/apis/x"), "/apis/x");
    }

    #[test]
    fn ensure_code_maps_denials() {
        assert!(ensure_code(json!({"code": 200})).is_ok());
        assert!(ensure_code(json!({"data": 1})).is_ok());
        match ensure_code(json!({"code": 301, "msg": "need login"})) {
            Err(NeteaseError::Denied { code, message }) => {
                assert_eq!(code, 301);
                assert_eq!(message, "need login");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn update_cookie_replaces_whole_set() {
        let client = NeteaseClient::with_session(Session::from_cookie_str("a=1; b=2")).unwrap();
        client.update_cookie(Some(CookieJar::parse("c=3")));
        assert_eq!(client.cookie("a"), None);
        assert_eq!(client.cookie("c").as_deref(), Some("3"));
        client.update_cookie(None);
        assert!(client.cookies().is_empty());
    }
}
