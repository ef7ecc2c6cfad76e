//! Text payloads.
//!
//! Clipboard strings are null-terminated and their encoding is a property of
//! the format, never of the content: `CF_UNICODETEXT` is always UTF-16LE,
//! `HTML Format` is always UTF-8, `CF_TEXT` is always the ANSI code page.
//! The table itself lives in [`FormatRegistry::string_encoding`].
//!
//! [`FormatRegistry::string_encoding`]: crate::format::FormatRegistry::string_encoding

/// Encoding family of a string-valued format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// Single-byte ANSI code page
    Ansi,
    /// UTF-16 little endian
    Utf16,
    /// UTF-8
    Utf8,
}

impl TextEncoding {
    /// Size of the terminating null in bytes
    pub const fn terminator_len(self) -> usize {
        match self {
            Self::Utf16 => 2,
            Self::Ansi | Self::Utf8 => 1,
        }
    }
}

/// Encode `text` with a trailing null terminator
pub fn encode_string(text: &str, encoding: TextEncoding) -> Vec<u8> {
    let mut out = match encoding {
        TextEncoding::Ansi => crate::sys::ansi_encode(text),
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
        TextEncoding::Utf16 => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
    };
    out.resize(out.len() + encoding.terminator_len(), 0);
    out
}

/// Decode a null-terminated string
///
/// Decoding stops at the first terminator; a block without one is decoded in
/// full. Invalid sequences become U+FFFD.
pub fn decode_string(data: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Ansi => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            crate::sys::ansi_decode(&data[..end])
        }
        TextEncoding::Utf8 => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            String::from_utf8_lossy(&data[..end]).into_owned()
        }
        TextEncoding::Utf16 => {
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .take_while(|&c| c != 0)
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

// =============================================================================
// Byte-order-mark Detection
// =============================================================================

/// Encoding detected for a text file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    /// UTF-8 with a byte-order mark
    Utf8Bom,
    /// UTF-8 without a byte-order mark
    Utf8,
    /// UTF-16 little endian (FF FE)
    Utf16Le,
    /// UTF-16 big endian (FE FF)
    Utf16Be,
    /// UTF-32 little endian (FF FE 00 00)
    Utf32Le,
    /// UTF-32 big endian (00 00 FE FF)
    Utf32Be,
    /// Not valid UTF-8, decoded with the ANSI code page
    Ansi,
}

/// Decode file contents, choosing the encoding from its byte-order mark
///
/// Without a mark the bytes are taken as UTF-8 when valid and as ANSI
/// otherwise.
pub fn decode_text_file(data: &[u8]) -> (String, DetectedEncoding) {
    match data {
        [0x00, 0x00, 0xFE, 0xFF, rest @ ..] => (decode_utf32(rest, u32::from_be_bytes), DetectedEncoding::Utf32Be),
        [0xFF, 0xFE, 0x00, 0x00, rest @ ..] => (decode_utf32(rest, u32::from_le_bytes), DetectedEncoding::Utf32Le),
        [0xFF, 0xFE, rest @ ..] => (decode_utf16(rest, u16::from_le_bytes), DetectedEncoding::Utf16Le),
        [0xFE, 0xFF, rest @ ..] => (decode_utf16(rest, u16::from_be_bytes), DetectedEncoding::Utf16Be),
        [0xEF, 0xBB, 0xBF, rest @ ..] => (String::from_utf8_lossy(rest).into_owned(), DetectedEncoding::Utf8Bom),
        _ => match std::str::from_utf8(data) {
            Ok(text) => (text.to_string(), DetectedEncoding::Utf8),
            Err(_) => (crate::sys::ansi_decode(data), DetectedEncoding::Ansi),
        },
    }
}

/// True if `data` looks like text rather than binary content
///
/// A byte-order mark always means text; otherwise the first 8 KiB must be
/// free of NUL bytes.
pub fn looks_like_text(data: &[u8]) -> bool {
    if data.starts_with(&[0xFF, 0xFE]) || data.starts_with(&[0xFE, 0xFF]) || data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return true;
    }
    !data.iter().take(8192).any(|&b| b == 0)
}

fn decode_utf16(data: &[u8], from_bytes: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = data.chunks_exact(2).map(|c| from_bytes([c[0], c[1]])).collect();
    String::from_utf16_lossy(&units)
}

fn decode_utf32(data: &[u8], from_bytes: fn([u8; 4]) -> u32) -> String {
    data.chunks_exact(4)
        .map(|c| char::from_u32(from_bytes([c[0], c[1], c[2], c[3]])).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

// =============================================================================
// Windows-1252
// =============================================================================

/// Encode as Windows-1252, replacing unrepresentable characters with '?'
pub fn windows1252_encode(text: &str) -> Vec<u8> {
    text.chars().map(char_to_windows1252).collect()
}

/// Decode Windows-1252 bytes
pub fn windows1252_decode(data: &[u8]) -> String {
    data.iter().map(|&b| windows1252_to_char(b)).collect()
}

fn char_to_windows1252(c: char) -> u8 {
    let cp = c as u32;
    if cp < 128 {
        return cp as u8;
    }

    match cp {
        0x20AC => 128,
        0x201A => 130,
        0x0192 => 131,
        0x201E => 132,
        0x2026 => 133,
        0x2020 => 134,
        0x2021 => 135,
        0x02C6 => 136,
        0x2030 => 137,
        0x0160 => 138,
        0x2039 => 139,
        0x0152 => 140,
        0x017D => 142,
        0x2018 => 145,
        0x2019 => 146,
        0x201C => 147,
        0x201D => 148,
        0x2022 => 149,
        0x2013 => 150,
        0x2014 => 151,
        0x02DC => 152,
        0x2122 => 153,
        0x0161 => 154,
        0x203A => 155,
        0x0153 => 156,
        0x017E => 158,
        0x0178 => 159,
        160..=255 => cp as u8,
        _ => b'?',
    }
}

fn windows1252_to_char(b: u8) -> char {
    if b < 128 || b >= 160 {
        return char::from(b);
    }

    match b {
        128 => '\u{20AC}',
        130 => '\u{201A}',
        131 => '\u{0192}',
        132 => '\u{201E}',
        133 => '\u{2026}',
        134 => '\u{2020}',
        135 => '\u{2021}',
        136 => '\u{02C6}',
        137 => '\u{2030}',
        138 => '\u{0160}',
        139 => '\u{2039}',
        140 => '\u{0152}',
        142 => '\u{017D}',
        145 => '\u{2018}',
        146 => '\u{2019}',
        147 => '\u{201C}',
        148 => '\u{201D}',
        149 => '\u{2022}',
        150 => '\u{2013}',
        151 => '\u{2014}',
        152 => '\u{02DC}',
        153 => '\u{2122}',
        154 => '\u{0161}',
        155 => '\u{203A}',
        156 => '\u{0153}',
        158 => '\u{017E}',
        159 => '\u{0178}',
        // 129, 141, 143, 144, 157 are undefined
        _ => '?',
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_utf16_terminator() {
        let bytes = encode_string("hi", TextEncoding::Utf16);
        assert_eq!(bytes, vec![b'h', 0, b'i', 0, 0, 0]);
        assert_eq!(decode_string(&bytes, TextEncoding::Utf16), "hi");
    }

    #[test]
    fn test_decode_stops_at_first_null() {
        assert_eq!(decode_string(b"abc\0garbage", TextEncoding::Utf8), "abc");
        assert_eq!(decode_string(b"no terminator", TextEncoding::Utf8), "no terminator");
    }

    #[test]
    fn test_windows1252_special_chars() {
        assert_eq!(windows1252_encode("€é"), vec![128, 0xE9]);
        assert_eq!(windows1252_decode(&[128, 0xE9, 0x93]), "€é\u{201C}");
        assert_eq!(windows1252_encode("日"), vec![b'?']);
    }

    #[test]
    fn test_bom_detection() {
        let (text, enc) = decode_text_file(&[0xEF, 0xBB, 0xBF, b'o', b'k']);
        assert_eq!((text.as_str(), enc), ("ok", DetectedEncoding::Utf8Bom));

        let (text, enc) = decode_text_file(&[0xFF, 0xFE, b'o', 0, b'k', 0]);
        assert_eq!((text.as_str(), enc), ("ok", DetectedEncoding::Utf16Le));

        let (text, enc) = decode_text_file(&[0xFE, 0xFF, 0, b'o', 0, b'k']);
        assert_eq!((text.as_str(), enc), ("ok", DetectedEncoding::Utf16Be));

        let (text, enc) = decode_text_file(&[0xFF, 0xFE, 0, 0, b'o', 0, 0, 0]);
        assert_eq!((text.as_str(), enc), ("o", DetectedEncoding::Utf32Le));

        let (text, enc) = decode_text_file(&[0, 0, 0xFE, 0xFF, 0, 0, 0, b'o']);
        assert_eq!((text.as_str(), enc), ("o", DetectedEncoding::Utf32Be));

        let (_, enc) = decode_text_file("plain ütf8".as_bytes());
        assert_eq!(enc, DetectedEncoding::Utf8);
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_ansi() {
        let (_, enc) = decode_text_file(&[b'a', 0xE9, b'b']);
        assert_eq!(enc, DetectedEncoding::Ansi);
    }

    #[test]
    fn test_looks_like_text() {
        assert!(looks_like_text(b"hello\nworld"));
        assert!(looks_like_text(&[0xFF, 0xFE, b'a', 0]));
        assert!(!looks_like_text(&[0x89, b'P', b'N', b'G', 0, 0]));
    }

    proptest! {
        #[test]
        fn prop_unicode_round_trip(text in "\\PC{0,64}") {
            let bytes = encode_string(&text, TextEncoding::Utf16);
            prop_assert_eq!(decode_string(&bytes, TextEncoding::Utf16), text);
        }

        #[test]
        fn prop_utf8_round_trip(text in "\\PC{0,64}") {
            let bytes = encode_string(&text, TextEncoding::Utf8);
            prop_assert_eq!(decode_string(&bytes, TextEncoding::Utf8), text);
        }
    }
}
