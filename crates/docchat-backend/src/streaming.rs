//! Shared utilities for streaming response parsing.

// ─────────────────────────────────────────────────────────────────────────────
// UTF-8 Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Try to decode bytes as UTF-8, handling incomplete sequences at the end.
/// Returns the decoded string and leaves any incomplete bytes in the buffer.
///
/// Invalid sequences in the middle of the buffer are replaced with U+FFFD so a
/// single bad byte cannot stall the stream.
pub fn decode_utf8_streaming(byte_buffer: &mut Vec<u8>) -> Option<String> {
    match std::str::from_utf8(byte_buffer) {
        Ok(s) => {
            let result = s.to_string();
            byte_buffer.clear();
            Some(result)
        }
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            match e.error_len() {
                // Truncated sequence at the end: keep it for the next chunk
                None if valid_up_to > 0 => {
                    let valid_bytes: Vec<u8> = byte_buffer.drain(..valid_up_to).collect();
                    Some(String::from_utf8_lossy(&valid_bytes).into_owned())
                }
                None => None,
                Some(bad_len) => {
                    let consumed: Vec<u8> = byte_buffer.drain(..valid_up_to + bad_len).collect();
                    let mut result = String::from_utf8_lossy(&consumed).into_owned();
                    if let Some(rest) = decode_utf8_streaming(byte_buffer) {
                        result.push_str(&rest);
                    }
                    Some(result)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_buffer_is_drained() {
        let mut buffer = "héllo".as_bytes().to_vec();
        assert_eq!(decode_utf8_streaming(&mut buffer).as_deref(), Some("héllo"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_split_multibyte_sequence_waits_for_rest() {
        let bytes = "aé".as_bytes();
        let mut buffer = bytes[..2].to_vec();

        assert_eq!(decode_utf8_streaming(&mut buffer).as_deref(), Some("a"));
        assert_eq!(buffer.len(), 1);

        buffer.extend_from_slice(&bytes[2..]);
        assert_eq!(decode_utf8_streaming(&mut buffer).as_deref(), Some("é"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_only_partial_sequence_yields_nothing() {
        let mut buffer = vec![0xE2, 0x82];
        assert!(decode_utf8_streaming(&mut buffer).is_none());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_invalid_byte_is_replaced() {
        let mut buffer = vec![b'a', 0xFF, b'b'];
        assert_eq!(decode_utf8_streaming(&mut buffer).as_deref(), Some("a\u{FFFD}b"));
        assert!(buffer.is_empty());
    }
}
