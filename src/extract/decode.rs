//! Byte-to-text decoding for plain-text style inputs.
//!
//! Decoders are tried in order and the first that accepts the bytes wins.
//! The last one (Latin-1) maps every byte to a char, so decoding never fails.

/// Invalid UTF-8 bytes tolerated (per 100 input bytes) before giving up on UTF-8.
const LOSSY_UTF8_MAX_PERCENT: usize = 1;

type Decoder = fn(&[u8]) -> Option<String>;

const DECODERS: &[(&str, Decoder)] = &[
    ("utf-8", decode_utf8_strict),
    ("utf-16le", decode_utf16le_bom),
    ("utf-16be", decode_utf16be_bom),
    ("utf-8-lossy", decode_utf8_tolerant),
    ("latin-1", decode_latin1),
];

/// Decoded text and the label of the decoder that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
}

pub fn decode_bytes(bytes: &[u8]) -> Decoded {
    for (label, decoder) in DECODERS {
        if let Some(text) = decoder(bytes) {
            return Decoded {
                text: text.replace('\0', ""),
                encoding: label,
            };
        }
    }
    // unreachable in practice: latin-1 accepts everything
    Decoded {
        text: decode_latin1(bytes).unwrap_or_default(),
        encoding: "latin-1",
    }
}

fn decode_utf8_strict(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

fn decode_utf16le_bom(bytes: &[u8]) -> Option<String> {
    let body = bytes.strip_prefix(b"\xFF\xFE")?;
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Some(String::from_utf16_lossy(&units))
}

fn decode_utf16be_bom(bytes: &[u8]) -> Option<String> {
    let body = bytes.strip_prefix(b"\xFE\xFF")?;
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Some(String::from_utf16_lossy(&units))
}

/// UTF-8 that drops a sparse sprinkling of invalid bytes.
fn decode_utf8_tolerant(bytes: &[u8]) -> Option<String> {
    let mut text = String::with_capacity(bytes.len());
    let mut invalid = 0usize;
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
        invalid += chunk.invalid().len();
    }
    if invalid * 100 <= bytes.len() * LOSSY_UTF8_MAX_PERCENT {
        Some(text)
    } else {
        None
    }
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| b as char).collect())
}
