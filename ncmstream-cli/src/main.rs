mod config;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use netease_api::auth::Session;
use netease_api::{NeteaseClient, Quality, ensure_code};
use netease_cache::DiskCache;
use netease_stream::{StreamConfig, cached_lyric};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "ncmstream",
    version,
    about = "Local streaming proxy & CLI for Netease Cloud Music"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the local streaming server until Ctrl-C
    Serve {
        /// Loopback port (0 picks a free one)
        #[arg(short, long)]
        port: Option<u16>,
        /// Cache root (holds media/ and lyrics/)
        #[arg(long, value_name = "PATH")]
        cache_dir: Option<PathBuf>,
    },
    /// Save login cookies (`MUSIC_U=...; __csrf=...` or a bare `MUSIC_U` value)
    Login {
        #[arg(required_unless_present = "check")]
        cookie: Option<String>,
        /// Check current login status
        #[arg(long)]
        check: bool,
    },
    /// Log out server-side and clear the saved session
    Logout,
    /// Print a temporary playback URL for a track
    Url {
        /// Track ID
        track_id: u64,
        /// Audio quality
        #[arg(short, long, default_value = "exhigh")]
        quality: QualityArg,
    },
    /// Print track lyrics (cached)
    Lyric {
        /// Track ID
        track_id: u64,
    },
    /// Inspect or empty the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and size
    Usage,
    /// Remove every cached entry
    Clear,
}

#[derive(Clone, ValueEnum)]
enum QualityArg {
    #[value(alias = "l")]
    Standard,
    #[value(alias = "m")]
    Higher,
    #[value(alias = "h")]
    Exhigh,
    #[value(alias = "sq")]
    Lossless,
}

impl From<QualityArg> for Quality {
    fn from(q: QualityArg) -> Self {
        match q {
            QualityArg::Standard => Self::Standard,
            QualityArg::Higher => Self::Higher,
            QualityArg::Exhigh => Self::Exhigh,
            QualityArg::Lossless => Self::Lossless,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;
    init_tracing(&config.log_level);

    match cli.command {
        Command::Serve { port, cache_dir } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(dir) = cache_dir {
                config.cache_dir = dir;
            }
            cmd_serve(&config).await
        }
        Command::Login { cookie, check } => cmd_login(cookie, check).await,
        Command::Logout => cmd_logout().await,
        Command::Url { track_id, quality } => cmd_url(track_id, quality.into()).await,
        Command::Lyric { track_id } => cmd_lyric(&config, track_id).await,
        Command::Cache { action } => cmd_cache(&config, &action),
    }
}

/// Logs go to stderr so command output stays pipeable. `RUST_LOG` wins over
/// the configured level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── serve ──

async fn cmd_serve(config: &Config) -> Result<()> {
    let client = Arc::new(NeteaseClient::new()?);
    let media = DiskCache::open(config.media_dir())
        .with_context(|| format!("cannot open cache at {}", config.media_dir().display()))?;
    // Anything staged longer ago than a fetch may run was left by a dead process.
    match media.sweep_stale(config.upstream_timeout()) {
        Ok(0) => {}
        Ok(removed) => info!(removed, "removed stale staged files"),
        Err(e) => warn!(error = %e, "cannot sweep staging directory"),
    }
    let stream_config = StreamConfig {
        bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, config.port)),
        upstream_timeout: config.upstream_timeout(),
    };

    let server = netease_stream::start(stream_config, client, media)
        .await
        .with_context(|| format!("cannot bind port {}", config.port))?;
    println!("Listening on http://{}", server.addr());
    println!("Example: {}", server.media_url(12345, Quality::default()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    println!("Shutting down.");
    server.shutdown().await?;
    Ok(())
}

// ── login / logout ──

async fn cmd_login(cookie: Option<String>, check: bool) -> Result<()> {
    if check {
        let session = Session::load()?;
        if !session.is_logged_in() {
            println!("Not logged in.");
            return Ok(());
        }
        let client = NeteaseClient::with_session(session)?;
        let account = client
            .post_web("/nuser/account/get", &json!({}))
            .await
            .and_then(ensure_code);
        match account {
            Ok(resp) => match resp["profile"]["nickname"].as_str() {
                Some(nickname) => println!(
                    "Logged in as: {nickname} (id={})",
                    resp["profile"]["userId"]
                ),
                None => println!("Session exists but has expired."),
            },
            Err(e) => println!("Session exists but validation failed: {e}"),
        }
        return Ok(());
    }

    let cookie = cookie.context("cookie value required")?;
    let session = Session::from_cookie_str(&cookie);
    if !session.is_logged_in() {
        anyhow::bail!("no MUSIC_U cookie in input");
    }
    session.save()?;
    println!("Session saved.");
    Ok(())
}

async fn cmd_logout() -> Result<()> {
    let session = Session::load()?;
    if session.is_logged_in() {
        let client = NeteaseClient::with_session(session)?;
        if let Err(e) = client.logout().await {
            warn!(error = %e, "server-side logout failed");
        }
    }
    Session::clear()?;
    println!("Session cleared.");
    Ok(())
}

// ── url / lyric ──

async fn cmd_url(track_id: u64, quality: Quality) -> Result<()> {
    let client = NeteaseClient::new()?;
    let url = client.track_url(track_id, quality).await?;
    println!("{url}");
    Ok(())
}

async fn cmd_lyric(config: &Config, track_id: u64) -> Result<()> {
    let client = NeteaseClient::new()?;
    let cache = DiskCache::open(config.lyrics_dir())?;
    let lyric = cached_lyric(&client, &cache, track_id).await?;
    if let Some(lrc) = &lyric.lrc {
        println!("{lrc}");
    }
    if let Some(tlyric) = &lyric.tlyric {
        println!("\n--- Translation ---\n{tlyric}");
    }
    if lyric.lrc.is_none() && lyric.tlyric.is_none() {
        println!("No lyrics available.");
    }
    Ok(())
}

// ── cache ──

fn cmd_cache(config: &Config, action: &CacheAction) -> Result<()> {
    let roots = [("media", config.media_dir()), ("lyrics", config.lyrics_dir())];
    for (name, root) in roots {
        let cache = DiskCache::open(&root)
            .with_context(|| format!("cannot open cache at {}", root.display()))?;
        match action {
            CacheAction::Usage => {
                let usage = cache.usage()?;
                println!(
                    "{name:<7} {:>6} files {:>12} bytes  {}",
                    usage.files,
                    usage.bytes,
                    root.display()
                );
            }
            CacheAction::Clear => {
                let report = cache.clear();
                println!(
                    "{name:<7} removed {} files ({} bytes)",
                    report.removed, report.bytes_freed
                );
                for (path, e) in &report.errors {
                    eprintln!("warning: {}: {e}", path.display());
                }
            }
        }
    }
    Ok(())
}
