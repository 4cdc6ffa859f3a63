//! HTML page scraping.
//!
//! The parsers here depend on the markup of `music.163.com` pages and break
//! whenever it changes. They never fail: unrecognized markup yields an empty
//! result, so scraping problems stay out of the protocol error taxonomy.

use crate::client::NeteaseClient;
use crate::error::Result;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static SONG_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="/song\?id=(\d+)""#).expect("valid song link pattern"));

/// Track ids linked from a page, in first-seen order, without duplicates.
///
/// Matches anchors of the form `<a href="/song?id=123">`.
pub fn song_ids(html: &str) -> Vec<u64> {
    let mut seen = HashSet::new();
    SONG_LINK
        .captures_iter(html)
        .filter_map(|c| c[1].parse::<u64>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

impl NeteaseClient {
    /// Fetch `url` with the session cookies and extract the linked track ids.
    pub async fn scrape_song_ids(&self, url: &str) -> Result<Vec<u64>> {
        Ok(song_ids(&self.get(url).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ids_in_order_without_duplicates() {
        let html = r#"
            <ul class="f-hide">
              <li><a href="/song?id=1901371647">A</a></li>
              <li><a href="/song?id=33894312">B</a></li>
              <li><a href="/song?id=1901371647">A again</a></li>
              <li><a href="/album?id=5">not a song</a></li>
            </ul>"#;
        assert_eq!(song_ids(html), vec![1_901_371_647, 33_894_312]);
    }

    #[test]
    fn unknown_markup_yields_nothing() {
        assert!(song_ids("<html><body>blocked</body></html>").is_empty());
    }
}
