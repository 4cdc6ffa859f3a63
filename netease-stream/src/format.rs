//! Magic-byte sniffing for the `Content-Type` of cached media.

/// Container detected from the first bytes of a cached media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Unknown,
}

/// Bytes needed by [`AudioFormat::sniff`].
pub const SNIFF_LEN: usize = 12;

impl AudioFormat {
    pub fn sniff(head: &[u8]) -> Self {
        match head {
            [b'I', b'D', b'3', ..] => Self::Mp3,
            // MPEG frame sync: 11 set bits.
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Self::Mp3,
            [b'f', b'L', b'a', b'C', ..] => Self::Flac,
            [b'O', b'g', b'g', b'S', ..] => Self::Ogg,
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Self::Mp4,
            _ => Self::Unknown,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
            Self::Ogg => "audio/ogg",
            Self::Mp4 => "audio/mp4",
            Self::Unknown => "application/octet-stream",
        }
    }
}
