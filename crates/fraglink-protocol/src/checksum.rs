//! CRC32 checksum utilities for corruption detection.
//!
//! CRC32 is strictly a corruption detector here, not a security primitive.

use crc32fast::Hasher;

/// Computes the CRC32 of the given coverage bytes.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Returns whether `expected` matches the CRC32 of the coverage bytes.
pub fn verify(data: &[u8], expected: u32) -> bool {
    crc32(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_matches_known_value() {
        // CRC32 of "123456789" is the standard check value.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_verify_accepts_and_rejects() {
        let data = b"Hello, world!";
        let checksum = crc32(data);
        assert!(verify(data, checksum));
        assert!(!verify(data, checksum ^ 1));

        let mut mutated = data.to_vec();
        mutated[0] ^= 0xFF;
        assert!(!verify(&mutated, checksum));
    }

    #[test]
    fn test_crc32_of_empty_input() {
        assert_eq!(crc32(b""), 0);
        assert!(verify(b"", 0));
    }
}
