//! Plain text decoding.

use docverter_core::ConversionError;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, WINDOWS_1252};

/// Decoded text and the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// `None` for UTF-8
    pub encoding: Option<&'static str>,
}

/// Legacy single-byte encodings tried in order when UTF-8 fails.
pub const FALLBACK_ENCODINGS: &[&str] = &["latin-1", "cp1252", "iso-8859-1"];

/// Decode file bytes.
///
/// UTF-8 is tried first (a BOM is stripped, UTF-16 BOMs are honoured), then
/// each of [`FALLBACK_ENCODINGS`].
pub fn decode_text(bytes: &[u8]) -> Result<DecodedText, ConversionError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        if encoding == UTF_16LE || encoding == UTF_16BE {
            let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            if !had_errors {
                return Ok(DecodedText {
                    text: text.into_owned(),
                    encoding: Some(if encoding == UTF_16LE { "utf-16le" } else { "utf-16be" }),
                });
            }
        }
    }

    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return Ok(DecodedText {
            text: text.to_string(),
            encoding: None,
        });
    }

    for &name in FALLBACK_ENCODINGS {
        if let Some(text) = decode_legacy(name, body) {
            return Ok(DecodedText {
                text,
                encoding: Some(name),
            });
        }
    }

    Err(ConversionError::Decode(format!(
        "not valid UTF-8 and none of {} decoded it",
        FALLBACK_ENCODINGS.join(", ")
    )))
}

fn decode_legacy(name: &str, bytes: &[u8]) -> Option<String> {
    match name {
        // Every byte is the code point of the same value.
        "latin-1" | "iso-8859-1" => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        "cp1252" => {
            let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (!had_errors).then(|| text.into_owned())
        }
        _ => None,
    }
}
