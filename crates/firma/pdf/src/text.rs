//! Text encodings for PDF strings.

use lopdf::{Object, StringFormat};

/// Encode text for a simple font using `WinAnsiEncoding`.
///
/// Characters the encoding lacks become `?` and are reported with a warning.
pub fn win_ansi_bytes(text: &str) -> Vec<u8> {
    let mut missing = Vec::new();
    let bytes = text
        .chars()
        .map(|c| {
            win_ansi_code(c).unwrap_or_else(|| {
                missing.push(c);
                b'?'
            })
        })
        .collect();

    if !missing.is_empty() {
        tracing::warn!(
            text = %text,
            missing = %missing.iter().collect::<String>(),
            "characters outside WinAnsiEncoding replaced with '?'"
        );
    }
    bytes
}

/// WinAnsi code point of `c`: Latin-1 plus the 0x80..0x9f punctuation block.
fn win_ansi_code(c: char) -> Option<u8> {
    let code = match c {
        ' '..='~' | '\u{a0}'..='\u{ff}' => return Some(u32::from(c) as u8),
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// A PDF text string: literal bytes for ASCII, UTF-16BE with BOM otherwise.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xfe, 0xff];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string written by [`text_string`] or by other producers
/// using PDFDocEncoding for the ASCII range.
pub fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xfe, 0xff, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
