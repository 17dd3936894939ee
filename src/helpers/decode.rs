//! Decoding of delimited text that arrives as raw bytes.

use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;

/// Decodes `bytes` to text.
///
/// A byte-order mark selects UTF-8 or UTF-16 and is stripped. Without one the
/// bytes are read as UTF-8 when valid, otherwise as Windows-1252, the code
/// page spreadsheet applications use for plain-text exports on Western
/// systems.
pub(crate) fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return (text, encoding);
    }
    match UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => (text, UTF_8),
        None => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text, WINDOWS_1252)
        }
    }
}
