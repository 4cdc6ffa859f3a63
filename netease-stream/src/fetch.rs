//! Cache-or-fetch for media entries.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use netease_api::Quality;
use netease_cache::StagedFile;
use tracing::{debug, info, warn};

use crate::error::{FetchFailure, StreamError};
use crate::flight::{self, Joined};
use crate::server::AppState;

impl AppState {
    /// Path of a complete entry for `track_id` at `quality`, fetching it first
    /// if needed.
    ///
    /// Concurrent callers for the same key share one upstream fetch. The fetch
    /// runs in its own task, so it finishes and releases the other waiters
    /// even if the caller that started it goes away.
    pub(crate) async fn ensure_cached(
        self: &Arc<Self>,
        track_id: u64,
        quality: Quality,
        ignore_cache: bool,
    ) -> Result<PathBuf, StreamError> {
        let key = netease_cache::key::media_key(track_id, quality.code());
        let path = self.media.full_path(&key)?;
        if !ignore_cache && self.media.has(&key).await {
            debug!(%key, "cache hit");
            return Ok(path);
        }

        let rx = match self.flights.join(&key) {
            Joined::Follower(rx) => rx,
            Joined::Leader(flight, rx) => {
                // Another flight may have committed between the check and the join.
                if !ignore_cache && self.media.has(&key).await {
                    flight.complete(Ok(()));
                    debug!(%key, "cache hit");
                    return Ok(path);
                }
                debug!(
                    %key,
                    ignore_cache,
                    in_flight = self.flights.in_flight(),
                    "cache miss, starting upstream fetch"
                );
                let state = Arc::clone(self);
                tokio::spawn(async move {
                    let outcome = state
                        .fetch(track_id, quality, flight.key())
                        .await
                        .map(|_| ())
                        .map_err(|e| {
                            warn!(key = flight.key(), error = %e, "upstream fetch failed");
                            FetchFailure::from(&e)
                        });
                    flight.complete(outcome);
                });
                rx
            }
        };

        flight::wait(rx).await.map_err(StreamError::Fetch)?;
        Ok(path)
    }

    /// Resolve, download and commit one media entry. Returns its size.
    async fn fetch(&self, track_id: u64, quality: Quality, key: &str) -> Result<u64, StreamError> {
        let work = async {
            let url = self.resolver.resolve(track_id, quality).await?;
            info!(track_id, %quality, "fetching media");
            let staged = self.media.stage(key).await?;
            download(&self.http, &url, staged).await
        };
        let bytes = tokio::time::timeout(self.upstream_timeout, work)
            .await
            .map_err(|_| StreamError::Timeout(self.upstream_timeout))??;
        info!(track_id, %quality, bytes, "media cached");
        Ok(bytes)
    }
}

/// Stream `url` into `staged` and commit it. Nothing is committed on error.
async fn download(
    http: &reqwest::Client,
    url: &str,
    mut staged: StagedFile,
) -> Result<u64, StreamError> {
    let resp = http.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(StreamError::Denied {
            status: status.as_u16(),
        });
    }

    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        staged.write(&chunk?).await?;
    }

    let bytes = staged.written();
    if bytes == 0 {
        return Err(StreamError::EmptyBody);
    }
    staged.commit().await?;
    Ok(bytes)
}
