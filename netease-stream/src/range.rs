//! `Range` request header handling for the `bytes` unit (RFC 9110).
//!
//! Only single ranges are honoured. A header that fails to parse, names
//! another unit, or lists several ranges is ignored and the whole file is
//! served with `200`.

/// An inclusive byte range (`start..=end`), never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    pub fn len(self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a partial response over a `total`-byte file.
    pub fn content_range(self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// One range-specifier as written by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRangeSpec {
    /// `first-last` or `first-`.
    FromTo { start: u64, end: Option<u64> },
    /// `-suffix-length`.
    Suffix { suffix_len: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid Range header")]
pub struct RangeParseError;

/// How a request should be answered given its `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePlan {
    /// `200` with the whole file.
    Full,
    /// `206` with the given bytes.
    Partial(ByteRange),
    /// `416` with `Content-Range: bytes */<len>`.
    Unsatisfiable,
}

/// Parse a `Range` header value.
///
/// `Ok(None)` means the unit is not `bytes`.
pub fn parse_range_header(value: &str) -> Result<Option<Vec<ByteRangeSpec>>, RangeParseError> {
    let (unit, rest) = value.trim().split_once('=').ok_or(RangeParseError)?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Ok(None);
    }

    let mut out = Vec::new();
    for part in rest.split(',') {
        let part = part.trim();
        if let Some(suffix) = part.strip_prefix('-') {
            out.push(ByteRangeSpec::Suffix {
                suffix_len: parse_u64(suffix)?,
            });
            continue;
        }

        let (start, end) = part.split_once('-').ok_or(RangeParseError)?;
        let start = parse_u64(start)?;
        let end = if end.trim().is_empty() {
            None
        } else {
            Some(parse_u64(end)?)
        };
        if end.is_some_and(|end| start > end) {
            return Err(RangeParseError);
        }
        out.push(ByteRangeSpec::FromTo { start, end });
    }
    Ok(Some(out))
}

fn parse_u64(s: &str) -> Result<u64, RangeParseError> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeParseError);
    }
    s.parse().map_err(|_| RangeParseError)
}

/// Resolve one specifier against a file of `len` bytes.
pub fn resolve_one(spec: ByteRangeSpec, len: u64) -> Option<ByteRange> {
    if len == 0 {
        return None;
    }
    match spec {
        ByteRangeSpec::FromTo { start, end } => {
            if start >= len {
                return None;
            }
            let end = end.map_or(len - 1, |end| end.min(len - 1));
            Some(ByteRange { start, end })
        }
        ByteRangeSpec::Suffix { suffix_len: 0 } => None,
        ByteRangeSpec::Suffix { suffix_len } => Some(ByteRange {
            start: len.saturating_sub(suffix_len),
            end: len - 1,
        }),
    }
}

/// Decide how to answer a request for a `len`-byte file.
pub fn plan(header: Option<&str>, len: u64) -> RangePlan {
    let Some(value) = header else {
        return RangePlan::Full;
    };
    match parse_range_header(value) {
        Ok(Some(specs)) if specs.len() == 1 => match resolve_one(specs[0], len) {
            Some(range) => RangePlan::Partial(range),
            None => RangePlan::Unsatisfiable,
        },
        _ => RangePlan::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_forms() {
        assert_eq!(
            parse_range_header("bytes=0-99").unwrap().unwrap(),
            vec![ByteRangeSpec::FromTo { start: 0, end: Some(99) }]
        );
        assert_eq!(
            parse_range_header("bytes=500-").unwrap().unwrap(),
            vec![ByteRangeSpec::FromTo { start: 500, end: None }]
        );
        assert_eq!(
            parse_range_header(" Bytes = -20 ").unwrap().unwrap(),
            vec![ByteRangeSpec::Suffix { suffix_len: 20 }]
        );
    }

    #[test]
    fn unknown_unit_is_ignored_and_garbage_rejected() {
        assert_eq!(parse_range_header("items=0-1").unwrap(), None);
        assert!(parse_range_header("bytes=a-b").is_err());
        assert!(parse_range_header("bytes=3-2").is_err());
        assert!(parse_range_header("bytes=+1-2").is_err());
        assert!(parse_range_header("bytes").is_err());
    }

    #[test]
    fn resolves_against_length() {
        let len = 1000;
        let from_to = |start, end| ByteRangeSpec::FromTo { start, end };
        assert_eq!(
            resolve_one(from_to(0, Some(99)), len),
            Some(ByteRange { start: 0, end: 99 })
        );
        assert_eq!(
            resolve_one(from_to(900, Some(5000)), len),
            Some(ByteRange { start: 900, end: 999 })
        );
        assert_eq!(resolve_one(from_to(1000, Some(1010)), len), None);
        assert_eq!(
            resolve_one(ByteRangeSpec::Suffix { suffix_len: 5000 }, len),
            Some(ByteRange { start: 0, end: 999 })
        );
        assert_eq!(resolve_one(ByteRangeSpec::Suffix { suffix_len: 0 }, len), None);
        assert_eq!(resolve_one(from_to(0, None), 0), None);
    }

    #[test]
    fn plan_picks_status() {
        assert_eq!(plan(None, 10), RangePlan::Full);
        assert_eq!(plan(Some("bytes=x"), 10), RangePlan::Full);
        assert_eq!(plan(Some("bytes=0-1,4-5"), 10), RangePlan::Full);
        assert_eq!(
            plan(Some("bytes=2-"), 10),
            RangePlan::Partial(ByteRange { start: 2, end: 9 })
        );
        assert_eq!(plan(Some("bytes=10-20"), 10), RangePlan::Unsatisfiable);
        assert_eq!(ByteRange { start: 0, end: 99 }.content_range(1000), "bytes 0-99/1000");
        assert_eq!(ByteRange { start: 0, end: 99 }.len(), 100);
    }
}
