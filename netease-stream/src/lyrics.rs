//! Lyrics cached as JSON in their own cache root.

use netease_api::{Lyric, NeteaseClient};
use netease_cache::DiskCache;
use netease_cache::key::lyric_key;
use tracing::{debug, warn};

use crate::error::StreamError;

/// Lyrics for `track_id`, served from `cache` when present.
///
/// A cached entry that no longer parses is refetched and overwritten.
pub async fn cached_lyric(
    client: &NeteaseClient,
    cache: &DiskCache,
    track_id: u64,
) -> Result<Lyric, StreamError> {
    let key = lyric_key(track_id);
    if let Some(raw) = cache.read(&key).await? {
        match serde_json::from_slice(&raw) {
            Ok(lyric) => {
                debug!(track_id, "lyric cache hit");
                return Ok(lyric);
            }
            Err(e) => warn!(track_id, error = %e, "discarding unreadable cached lyric"),
        }
    }

    debug!(track_id, "lyric cache miss");
    let lyric = client.track_lyric(track_id).await?;
    cache.save(&key, &serde_json::to_vec(&lyric)?).await?;
    Ok(lyric)
}
