//! In-memory cookie set shared by every request of a [`NeteaseClient`](crate::NeteaseClient).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered `name → value` cookie set.
///
/// Serialized as a flat JSON object, which is also the on-disk session format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar(BTreeMap<String, String>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` header style string: `a=1; b=2`.
    ///
    /// Segments without `=` and empty names are skipped.
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::new();
        for pair in header.split(';') {
            if let Some((name, value)) = split_pair(pair) {
                jar.set(name, value);
            }
        }
        jar
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge one `Set-Cookie` header value.
    ///
    /// Only the leading `name=value` is kept; attributes (`Path`, `Domain`,
    /// `Expires`, ...) are dropped. Returns the cookie name on success.
    pub fn merge_set_cookie(&mut self, header: &str) -> Option<String> {
        let first = header.split(';').next()?;
        let (name, value) = split_pair(first)?;
        self.set(name, value);
        Some(name.to_owned())
    }

    /// Render as a `Cookie` request header value, or `None` when empty.
    pub fn header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Whether a `MUSIC_U` login token is present (does not validate it).
    pub fn is_logged_in(&self) -> bool {
        self.get("MUSIC_U").is_some_and(|u| !u.is_empty())
    }
}

fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_header() {
        let jar = CookieJar::parse("MUSIC_U=abc; __csrf=tok ;junk; =x");
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("__csrf"), Some("tok"));
        assert_eq!(jar.header().as_deref(), Some("MUSIC_U=abc; __csrf=tok"));
        assert!(jar.is_logged_in());
    }

    #[test]
    fn set_cookie_keeps_only_name_value() {
        let mut jar = CookieJar::new();
        let name = jar.merge_set_cookie("__csrf=abc123; Max-Age=1296010; Path=/; Domain=.music.163.com");
        assert_eq!(name.as_deref(), Some("__csrf"));
        assert_eq!(jar.get("__csrf"), Some("abc123"));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn set_cookie_overwrites_existing_value() {
        let mut jar = CookieJar::parse("MUSIC_U=old");
        jar.merge_set_cookie("MUSIC_U=new; HttpOnly");
        assert_eq!(jar.get("MUSIC_U"), Some("new"));
    }

    #[test]
    fn empty_jar_has_no_header() {
        assert!(CookieJar::new().header().is_none());
        assert!(!CookieJar::new().is_logged_in());
    }

    #[test]
    fn serializes_as_flat_object() {
        let jar = CookieJar::parse("a=1; b=2");
        assert_eq!(serde_json::to_string(&jar).unwrap(), r#"{"a":"1","b":"2"}"#);
    }
}
