//! Router, `/music` handler and server lifecycle.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use netease_api::Quality;
use netease_cache::DiskCache;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::StreamError;
use crate::flight::FlightMap;
use crate::format::{AudioFormat, SNIFF_LEN};
use crate::range::{self, RangePlan};
use crate::resolver::TrackResolver;

/// Default bound on one whole upstream fetch (resolve + download).
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Loopback address to listen on; port `0` picks a free one.
    pub bind_addr: SocketAddr,
    pub upstream_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl StreamConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            ..Self::default()
        }
    }
}

pub(crate) struct AppState {
    pub(crate) resolver: Arc<dyn TrackResolver>,
    pub(crate) media: DiskCache,
    pub(crate) http: reqwest::Client,
    pub(crate) flights: Arc<FlightMap>,
    pub(crate) upstream_timeout: Duration,
}

/// Build the router without binding a socket.
pub fn app(config: &StreamConfig, resolver: Arc<dyn TrackResolver>, media: DiskCache) -> Router {
    let state = Arc::new(AppState {
        resolver,
        media,
        http: reqwest::Client::new(),
        flights: Arc::new(FlightMap::default()),
        upstream_timeout: config.upstream_timeout,
    });
    Router::new()
        .route("/music", get(music))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A server started by [`start`]. Dropping it stops the server.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<std::io::Result<()>>>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Local URL a player can open for `track_id` at `quality`.
    pub fn media_url(&self, track_id: u64, quality: Quality) -> String {
        format!(
            "http://localhost:{}/music?id={track_id}&quality={}",
            self.addr.port(),
            quality.code()
        )
    }

    /// Stop accepting connections and wait for in-progress responses.
    pub async fn shutdown(mut self) -> std::io::Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await.map_err(std::io::Error::other)??;
        }
        Ok(())
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// Bind the listener and serve in a background task.
pub async fn start(
    config: StreamConfig,
    resolver: Arc<dyn TrackResolver>,
    media: DiskCache,
) -> std::io::Result<RunningServer> {
    let app = app(&config, resolver, media);
    let listener = TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;
    info!(port = addr.port(), "streaming server listening on {addr}");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .inspect_err(|e| error!(error = %e, "streaming server stopped"))
    });

    Ok(RunningServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
    })
}

async fn health() -> &'static str {
    "ok\n"
}

// ── /music ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct MusicQuery {
    id: Option<String>,
    quality: Option<String>,
    #[serde(rename = "ignoreCache")]
    ignore_cache: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MediaRequest {
    track_id: u64,
    quality: Quality,
    ignore_cache: bool,
}

impl TryFrom<MusicQuery> for MediaRequest {
    type Error = StreamError;

    fn try_from(query: MusicQuery) -> Result<Self, StreamError> {
        let id = query
            .id
            .ok_or_else(|| StreamError::BadRequest("missing `id`".into()))?;
        let track_id = id
            .trim()
            .parse()
            .map_err(|_| StreamError::BadRequest(format!("invalid track id `{id}`")))?;
        let quality = match query.quality.as_deref() {
            None | Some("") => Quality::default(),
            Some(code) => code
                .parse()
                .map_err(|e| StreamError::BadRequest(format!("{e}")))?,
        };
        let ignore_cache = match query.ignore_cache.as_deref() {
            None | Some("" | "0" | "false") => false,
            Some("1" | "true") => true,
            Some(other) => {
                return Err(StreamError::BadRequest(format!(
                    "invalid `ignoreCache` value `{other}`"
                )));
            }
        };
        Ok(Self {
            track_id,
            quality,
            ignore_cache,
        })
    }
}

async fn music(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MusicQuery>,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    let req = MediaRequest::try_from(query)?;
    let path = state
        .ensure_cached(req.track_id, req.quality, req.ignore_cache)
        .await?;
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());
    serve_file(&path, range).await
}

/// Answer from a complete cache entry, honouring a single byte range.
///
/// Length and content come from the same open handle, so a concurrent
/// replacement of the entry cannot tear the response.
async fn serve_file(path: &Path, range: Option<&str>) -> Result<Response, StreamError> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();

    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    let format = AudioFormat::sniff(&head);

    let partial = match range::plan(range, len) {
        RangePlan::Full => None,
        RangePlan::Partial(r) => Some(r),
        RangePlan::Unsatisfiable => {
            return Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [
                    (header::CONTENT_RANGE, format!("bytes */{len}")),
                    (header::ACCEPT_RANGES, "bytes".to_owned()),
                ],
            )
                .into_response());
        }
    };

    let (start, body_len) = partial.map_or((0, len), |r| (r.start, r.len()));
    file.seek(SeekFrom::Start(start)).await?;
    let body = Body::from_stream(ReaderStream::new(file.take(body_len)));

    let mut resp = Response::new(body);
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.mime_type()),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_len));
    if let Some(r) = partial {
        headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&r.content_range(len)).map_err(std::io::Error::other)?,
        );
        *resp.status_mut() = StatusCode::PARTIAL_CONTENT;
    }
    Ok(resp)
}
