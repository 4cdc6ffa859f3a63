//! Source of playable URLs for the media fetcher.

use async_trait::async_trait;
use netease_api::{NeteaseClient, Quality};

/// Turns a track id into a time-limited media URL.
///
/// The server only depends on this seam so tests and alternative vendors can
/// stand in for [`NeteaseClient`].
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, track_id: u64, quality: Quality) -> netease_api::Result<String>;
}

#[async_trait]
impl TrackResolver for NeteaseClient {
    async fn resolve(&self, track_id: u64, quality: Quality) -> netease_api::Result<String> {
        self.track_url(track_id, quality).await
    }
}
