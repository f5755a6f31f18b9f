//! Single-byte charset bridge.
//!
//! The portal serves windows-1250 without reliably declaring it. Bytes are
//! first widened positionally into a raw 8-bit character sequence (each byte
//! becomes U+0000..U+00FF) and that sequence is then mapped through the
//! windows-1250 table. Both hops are kept explicit because some callers only
//! ever see the first hop (header values, Latin-1 mis-decoded strings).

use encoding_rs::WINDOWS_1250;

/// Decode a raw portal response body into Unicode text.
pub fn decode(bytes: &[u8]) -> String {
    map_raw_chars(&raw_chars(bytes))
}

/// First hop: every byte becomes the code point with the same value.
pub fn raw_chars(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Second hop: map a raw 8-bit character sequence through the windows-1250
/// table. Characters above U+00FF cannot come from a single byte and are
/// passed through unchanged.
pub fn map_raw_chars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending: Vec<u8> = Vec::new();

    for ch in raw.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(byte) => pending.push(byte),
            Err(_) => {
                flush(&mut pending, &mut out);
                out.push(ch);
            }
        }
    }
    flush(&mut pending, &mut out);
    out
}

fn flush(pending: &mut Vec<u8>, out: &mut String) {
    if pending.is_empty() {
        return;
    }
    let (decoded, _had_errors) = WINDOWS_1250.decode_without_bom_handling(pending);
    out.push_str(&decoded);
    pending.clear();
}

/// Encode Unicode text into windows-1250 bytes. Unmappable characters become
/// numeric character references, as a browser would submit them.
pub fn encode(text: &str) -> Vec<u8> {
    let (bytes, _, _) = WINDOWS_1250.encode(text);
    bytes.into_owned()
}

/// Whether a string looks like windows-1250 bytes that were decoded as Latin-1.
///
/// Such strings contain code points in U+0080..U+00FF but nothing above.
pub fn looks_mis_decoded(text: &str) -> bool {
    let mut has_high = false;
    for ch in text.chars() {
        let cp = u32::from(ch);
        if cp > 0xFF {
            return false;
        }
        if cp >= 0x80 {
            has_high = true;
        }
    }
    has_high
}

/// Re-decode a Latin-1 mis-decoded string through the windows-1250 table.
/// Strings that do not look mis-decoded are returned unchanged.
pub fn repair_mis_decoded(text: &str) -> String {
    if looks_mis_decoded(text) {
        map_raw_chars(text)
    } else {
        text.to_string()
    }
}
