use crate::err::{DeserializationError, DeserializationResult};

/// Returns the byte offset of the first 2-byte-aligned NUL code unit in `bytes`.
pub(crate) fn find_utf16_terminator(bytes: &[u8]) -> Option<usize> {
    bytes
        .chunks_exact(2)
        .position(|unit| unit == [0, 0])
        .map(|i| i * 2)
}

/// Collects the UTF-16LE code units of `bytes` up to (excluding) the first NUL, if present.
pub(crate) fn utf16le_units_z(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
        .take_while(|&c| c != 0)
        .collect()
}

/// Decode a UTF-16LE byte slice until the first NUL (0x0000), if present.
pub(crate) fn decode_utf16le_z(bytes: &[u8], what: &'static str) -> DeserializationResult<String> {
    let units = utf16le_units_z(bytes);

    // Pure ASCII converts directly, without surrogate handling.
    if units.iter().all(|&c| c <= 0x7F) {
        return Ok(units.iter().map(|&c| c as u8 as char).collect());
    }

    String::from_utf16(&units).map_err(|_| DeserializationError::InvalidUtf16String {
        what,
        offset: 0,
    })
}

/// Size of the UTF-8 representation of `bytes`, including a terminating NUL byte.
pub(crate) fn utf8_size_z(bytes: &[u8], what: &'static str) -> DeserializationResult<usize> {
    Ok(decode_utf16le_z(bytes, what)?.len() + 1)
}

/// Size of the UTF-16 representation of `bytes` in code units, including a terminating NUL.
pub(crate) fn utf16_size_z(bytes: &[u8]) -> usize {
    utf16le_units_z(bytes).len() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect()
    }

    #[test]
    fn test_terminator_must_be_aligned() {
        // 0x0100 0x0041 - the zero bytes straddle a unit boundary and are not a terminator.
        let buf = [0x00, 0x01, 0x00, 0x41, 0x00, 0x00];
        assert_eq!(find_utf16_terminator(&buf), Some(4));
    }

    #[test]
    fn test_decodes_non_ascii_names() {
        let buf = utf16("Ereignisanzeige-Überwachung");
        assert_eq!(
            decode_utf16le_z(&buf, "name").unwrap(),
            "Ereignisanzeige-Überwachung"
        );
        assert_eq!(utf16_size_z(&buf), 28);
        assert_eq!(utf8_size_z(&buf, "name").unwrap(), 29);
    }

    #[test]
    fn test_unpaired_surrogate_is_rejected() {
        let buf = [0x00, 0xd8, 0x41, 0x00, 0x00, 0x00];
        assert!(decode_utf16le_z(&buf, "name").is_err());
    }
}
