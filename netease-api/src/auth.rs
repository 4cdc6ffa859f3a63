//! Session persistence: the cookie jar saved between runs.
//!
//! The session file is stored at `~/.config/ncmstream/session.json` and
//! contains the flat cookie set:
//!
//! ```json
//! { "MUSIC_U": "00AABBCC...", "__csrf": "..." }
//! ```
//!
//! The `MUSIC_U` cookie is the authentication token issued by Netease after
//! login. It can be obtained from browser developer tools → Application → Cookies
//! on `music.163.com`. Typical lifetime is several months.
//!
//! A session is loaded once at startup and replaced wholesale on login or
//! logout; the client never writes it back on its own.

use crate::cookie::CookieJar;
use crate::error::{NeteaseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persistent login session backed by a JSON file on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    cookies: CookieJar,
}

impl Session {
    /// Build a session from a cookie header string (`MUSIC_U=...; __csrf=...`).
    ///
    /// A bare token without `=` is taken as the `MUSIC_U` value.
    pub fn from_cookie_str(raw: &str) -> Self {
        let raw = raw.trim();
        let cookies = if raw.contains('=') {
            CookieJar::parse(raw)
        } else {
            let mut jar = CookieJar::new();
            if !raw.is_empty() {
                jar.set("MUSIC_U", raw);
            }
            jar
        };
        Self { cookies }
    }

    pub fn jar(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn into_jar(self) -> CookieJar {
        self.cookies
    }

    /// Check whether a `MUSIC_U` cookie is present (does not validate it).
    pub fn is_logged_in(&self) -> bool {
        self.cookies.is_logged_in()
    }

    /// Load session from `~/.config/ncmstream/session.json`.
    ///
    /// Returns a default (empty) session if the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Save session to disk, creating parent directories if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Delete the session file from disk.
    pub fn clear() -> Result<()> {
        let path = Self::path()?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    fn path() -> Result<PathBuf> {
        let config = dirs::config_dir()
            .ok_or_else(|| NeteaseError::Other("cannot determine config directory".into()))?;
        Ok(config.join("ncmstream").join("session.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_token_becomes_music_u() {
        let s = Session::from_cookie_str("  00AABB  ");
        assert_eq!(s.jar().get("MUSIC_U"), Some("00AABB"));
        assert!(s.is_logged_in());
    }

    #[test]
    fn cookie_string_is_parsed() {
        let s = Session::from_cookie_str("MUSIC_U=x; __csrf=y");
        assert_eq!(s.jar().len(), 2);
    }

    #[test]
    fn empty_input_is_logged_out() {
        assert!(!Session::from_cookie_str("").is_logged_in());
    }

    #[test]
    fn missing_file_loads_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let s = Session::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(s, Session::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let s = Session::from_cookie_str("MUSIC_U=abc");
        s.save_to(&path).unwrap();
        assert_eq!(Session::load_from(&path).unwrap(), s);
    }
}
