//! Track URL and lyric APIs.
//!
//! # Endpoints
//!
//! ## `track_url`: `POST /weapi/song/enhance/player/url`
//!
//! Request: `{ "ids": "[123]", "br": 320000 }`
//!
//! Response:
//! ```json
//! {
//!   "code": 200,
//!   "data": [{
//!     "id": 123,
//!     "url": "https://m701.music.126.net/...",  // null if unavailable
//!     "br": 320000,
//!     "size": 12345678,
//!     "type": "mp3",
//!     "code": 200
//!   }]
//! }
//! ```
//!
//! `url` is `null` when the track requires VIP/purchase or is region-locked.
//!
//! ## `track_lyric`: `POST /weapi/song/lyric`
//!
//! Request: `{ "id": 123, "lv": -1, "tv": -1 }`
//!
//! Response:
//! ```json
//! {
//!   "code": 200,
//!   "lrc":    { "lyric": "[00:00.00]歌词..." },
//!   "tlyric": { "lyric": "[00:00.00]翻译..." }
//! }
//! ```
//!
//! `lrc`/`tlyric` may be absent or have empty `lyric` for instrumental tracks.

use crate::client::{NeteaseClient, ensure_code};
use crate::error::{NeteaseError, Result};
use crate::types::{Lyric, Quality};
use serde_json::json;
use tracing::debug;

impl NeteaseClient {
    /// Get a direct playback URL for a track at the requested quality.
    ///
    /// The returned URL is a temporary CDN link (typically valid for ~20 minutes)
    /// pointing to an MP3 or FLAC file. The server may downgrade quality if the
    /// user's VIP tier doesn't support the requested bitrate.
    ///
    /// # Errors
    ///
    /// - [`NeteaseError::Denied`] if the envelope `code` is not 200
    /// - [`NeteaseError::Unavailable`] if the track is VIP-only, region-locked,
    ///   or taken down (the API returns `url: null`)
    pub async fn track_url(&self, id: u64, quality: Quality) -> Result<String> {
        let data = json!({
            "ids": format!("[{id}]"),
            "br": quality.bitrate(),
        });
        let resp = ensure_code(self.post_web("/song/enhance/player/url", &data).await?)?;
        let entry = &resp["data"][0];
        let url = entry["url"].as_str().ok_or_else(|| {
            let code = entry["code"].as_i64().unwrap_or_default();
            NeteaseError::Unavailable(format!(
                "track {id} has no playable url (code {code}; no copyright or VIP required)"
            ))
        })?;
        debug!(id, %quality, br = entry["br"].as_u64(), "resolved track url");
        Ok(url.to_owned())
    }

    /// Get lyrics for a track.
    ///
    /// Returns a [`Lyric`] with optional original (`lrc`) and translated
    /// (`tlyric`) lyrics in LRC timestamp format. Both fields are `None`
    /// for instrumental tracks or tracks without uploaded lyrics.
    pub async fn track_lyric(&self, id: u64) -> Result<Lyric> {
        let data = json!({ "id": id, "lv": -1, "tv": -1 });
        let resp = ensure_code(self.post_web("/song/lyric", &data).await?)?;
        let non_empty = |v: &serde_json::Value| {
            v.as_str().filter(|s| !s.is_empty()).map(String::from)
        };
        Ok(Lyric {
            lrc: non_empty(&resp["lrc"]["lyric"]),
            tlyric: non_empty(&resp["tlyric"]["lyric"]),
        })
    }
}
