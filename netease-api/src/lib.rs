//! Netease Cloud Music protocol client.
//!
//! Transports arbitrary API calls over the three encrypted wire variants the
//! vendor accepts, keeping one cookie set for the whole process.
//!
//! ```no_run
//! use netease_api::auth::Session;
//! use netease_api::{NeteaseClient, Quality};
//!
//! # async fn demo() -> netease_api::Result<()> {
//! let client = NeteaseClient::with_session(Session::from_cookie_str("MUSIC_U=..."))?;
//! let url = client.track_url(12345, Quality::Exhigh).await?;
//! let raw = client
//!     .post_encrypted("/song/detail", &serde_json::json!({ "c": "[{\"id\":12345}]" }))
//!     .await?;
//! # let _ = (url, raw);
//! # Ok(())
//! # }
//! ```
//!
//! # Wire variants
//!
//! | Variant                          | Entry point                          |
//! |----------------------------------|--------------------------------------|
//! | [`Variant::Web`] (weapi)         | [`NeteaseClient::post_web`]          |
//! | [`Variant::Encrypted`] (eapi)    | [`NeteaseClient::post_encrypted`]    |
//! | [`Variant::Linux`] (linuxapi)    | [`NeteaseClient::post_linux`]        |
//!
//! See [`crypto`] for the exact transforms.
//!
//! # Wrappers
//!
//! Only the calls the streaming server needs are wrapped:
//! [`NeteaseClient::track_url`], [`NeteaseClient::track_lyric`] and
//! [`NeteaseClient::logout`]. Everything else goes through `post_*` directly.

pub mod auth;
pub mod client;
pub mod cookie;
pub mod crypto;
pub mod error;
pub mod page;
mod track;
pub mod types;

pub use client::{ClientConfig, NeteaseClient, ensure_code};
pub use cookie::CookieJar;
pub use crypto::Variant;
pub use error::{NeteaseError, Result};
pub use types::{Lyric, Quality};
