//! Data types shared by the API wrappers and the streaming server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Song lyrics.
///
/// Returned by [`NeteaseClient::track_lyric`](crate::NeteaseClient::track_lyric).
///
/// API JSON path: `response.lrc.lyric` (original) and `response.tlyric.lyric` (translation).
/// Both are in LRC format (e.g. `[00:12.34]歌词内容`) and stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyric {
    /// Original lyrics in LRC format. `None` if the track has no lyrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lrc: Option<String>,
    /// Translated lyrics (usually Chinese ↔ other language). `None` if unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tlyric: Option<String>,
}

/// Audio quality / bitrate for track playback URLs.
///
/// Passed to [`NeteaseClient::track_url`](crate::NeteaseClient::track_url) as the
/// `br` (bitrate) parameter. The server returns the best available quality up to
/// the requested level, subject to the user's VIP tier.
///
/// | Variant    | Code | Bitrate   | Typical format |
/// |------------|------|-----------|----------------|
/// | `Standard` | `l`  | 128 kbps  | MP3            |
/// | `Higher`   | `m`  | 192 kbps  | MP3            |
/// | `Exhigh`   | `h`  | 320 kbps  | MP3            |
/// | `Lossless` | `sq` | 999 kbps* | FLAC           |
///
/// *999000 is a sentinel value; actual lossless bitrate varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    /// 128 kbps MP3.
    Standard,
    /// 192 kbps MP3.
    Higher,
    /// 320 kbps MP3.
    #[default]
    Exhigh,
    /// Lossless (FLAC). Requires VIP.
    Lossless,
}

impl Quality {
    /// Return the bitrate value sent to the API `br` parameter.
    pub fn bitrate(self) -> u64 {
        match self {
            Self::Standard => 128_000,
            Self::Higher => 192_000,
            Self::Exhigh => 320_000,
            Self::Lossless => 999_000,
        }
    }

    /// Short code used in local URLs and cache keys.
    pub fn code(self) -> &'static str {
        match self {
            Self::Standard => "l",
            Self::Higher => "m",
            Self::Exhigh => "h",
            Self::Lossless => "sq",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unrecognized quality code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown quality {0:?} (expected l, m, h or sq)")]
pub struct UnknownQuality(pub String);

impl FromStr for Quality {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l" => Ok(Self::Standard),
            "m" => Ok(Self::Higher),
            "h" => Ok(Self::Exhigh),
            "sq" => Ok(Self::Lossless),
            other => Err(UnknownQuality(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_codes_parse_back() {
        for q in [Quality::Standard, Quality::Higher, Quality::Exhigh, Quality::Lossless] {
            assert_eq!(q.code().parse::<Quality>().unwrap(), q);
        }
        assert_eq!(Quality::Exhigh.bitrate(), 320_000);
        assert!("x".parse::<Quality>().is_err());
    }
}
