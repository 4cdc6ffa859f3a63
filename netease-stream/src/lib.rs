//! Local HTTP streaming server for Netease tracks.
//!
//! A player opens `http://localhost:<port>/music?id=<track>&quality=<l|m|h|sq>`.
//! The first request for a track downloads it into the media cache; every
//! later request, including byte-range seeks, is answered from disk.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use netease_api::{NeteaseClient, Quality};
//! use netease_cache::DiskCache;
//! use netease_stream::{StreamConfig, start};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(NeteaseClient::new()?);
//! let media = DiskCache::open("/tmp/ncmstream/media")?;
//! let server = start(StreamConfig::default(), client, media).await?;
//! println!("{}", server.media_url(12345, Quality::Exhigh));
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod fetch;
mod flight;
pub mod format;
mod lyrics;
pub mod range;
mod resolver;
mod server;

pub use error::{FetchFailure, StreamError};
pub use lyrics::cached_lyric;
pub use resolver::TrackResolver;
pub use server::{DEFAULT_UPSTREAM_TIMEOUT, RunningServer, StreamConfig, app, start};
