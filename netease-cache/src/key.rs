use crate::error::{CacheError, Result};

/// Longest encoded file name accepted; leaves room for staging suffixes
/// under the usual 255-byte file name limit.
const MAX_FILE_NAME: usize = 200;

/// Map a cache key to a file name.
///
/// Percent-encoding is injective (a literal `%` becomes `%25`), so distinct
/// keys never share a file. A leading `.` is escaped as well, which keeps
/// keys away from hidden names such as the `.staging` directory.
pub fn file_name(key: &str) -> Result<String> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey(key.to_owned()));
    }
    let encoded = urlencoding::encode(key);
    let name = match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => encoded.into_owned(),
    };
    if name.len() > MAX_FILE_NAME {
        return Err(CacheError::InvalidKey(key.to_owned()));
    }
    Ok(name)
}

/// Cache key for a track at a quality code, e.g. `12345-h`.
pub fn media_key(track_id: u64, quality_code: &str) -> String {
    format!("{track_id}-{quality_code}")
}

/// Cache key for a track's lyrics.
pub fn lyric_key(track_id: u64) -> String {
    track_id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keys_are_kept() {
        assert_eq!(file_name("12345-h").unwrap(), "12345-h");
        assert_eq!(media_key(12345, "h"), "12345-h");
    }

    #[test]
    fn separators_and_dots_are_escaped() {
        assert_eq!(file_name("a/b").unwrap(), "a%2Fb");
        assert_eq!(file_name("..").unwrap(), "%2E.");
        assert_eq!(file_name(".staging").unwrap(), "%2Estaging");
    }

    #[test]
    fn encoding_is_collision_free_for_escapes() {
        assert_ne!(file_name("a/b").unwrap(), file_name("a%2Fb").unwrap());
        assert_ne!(file_name(".x").unwrap(), file_name("%2Ex").unwrap());
    }

    #[test]
    fn empty_and_oversized_keys_are_rejected() {
        assert!(file_name("").is_err());
        assert!(file_name(&"k".repeat(500)).is_err());
    }
}
