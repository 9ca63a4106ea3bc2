//! Constants for credential layout and tag record encoding.
//!
//! Identity register sizes come from ISO/IEC 14443-3 anticollision, where a
//! UID is transmitted in one, two or three cascade levels. Record constants
//! follow the NFC Forum NDEF and URI Record Type Definitions as they appear
//! in a Type 4 Tag NDEF file:
//!
//! ```text
//! +--------+--------+------+-------------+------+------+----------------+
//! | NLEN   | header | TLEN | PLEN (1|4)  | 'U'  | code | URI body ...   |
//! | 2 B BE | 0xD1   | 0x01 | payload len | 0x55 | 1 B  |                |
//! +--------+--------+------+-------------+------+------+----------------+
//! ```

// ============================================================================
// Identity register
// ============================================================================

/// UID length for a single-size (cascade level 1) identity.
pub const UID_SINGLE_LEN: usize = 4;

/// UID length for a double-size (cascade level 2) identity.
pub const UID_DOUBLE_LEN: usize = 7;

/// UID length for a triple-size (cascade level 3) identity.
pub const UID_TRIPLE_LEN: usize = 10;

/// Shortest credential accepted by the UID codec.
pub const MIN_UID_LEN: usize = 1;

/// Longest credential accepted by the UID codec.
pub const MAX_UID_LEN: usize = UID_TRIPLE_LEN;

// ============================================================================
// NDEF record layout
// ============================================================================

/// Size of the big-endian NLEN prefix of a Type 4 Tag NDEF file.
pub const NLEN_FIELD_SIZE: usize = 2;

/// Record header for a lone short record: MB | ME | SR | TNF=Well-Known.
pub const RECORD_HEADER_SHORT: u8 = 0xD1;

/// Record header for a lone long record: MB | ME | TNF=Well-Known.
pub const RECORD_HEADER_LONG: u8 = 0xC1;

/// Type length of the URI record type.
pub const URI_TYPE_LEN: u8 = 1;

/// Record type of a well-known URI record (`'U'`).
pub const URI_RECORD_TYPE: u8 = 0x55;

/// Largest payload that fits a short record's one-byte length.
pub const SHORT_RECORD_MAX_PAYLOAD: usize = 0xFF;

/// Header, type length, one-byte payload length and record type.
pub const SHORT_RECORD_OVERHEAD: usize = 4;

/// Header, type length, four-byte payload length and record type.
pub const LONG_RECORD_OVERHEAD: usize = 7;

/// Largest NDEF message an NLEN prefix can describe.
pub const MAX_NDEF_MESSAGE_LEN: usize = u16::MAX as usize;

// ============================================================================
// Defaults
// ============================================================================

/// Default capacity of the tag payload buffer in bytes.
pub const DEFAULT_PAYLOAD_CAPACITY: usize = 256;

/// Smallest payload buffer that can hold an empty URI record.
pub const MIN_PAYLOAD_CAPACITY: usize = NLEN_FIELD_SIZE + SHORT_RECORD_OVERHEAD + 1;

/// Default number of consecutive backend failures treated as unrecoverable.
pub const DEFAULT_ERROR_MAX: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_sizes_ascending() {
        assert!(MIN_UID_LEN <= UID_SINGLE_LEN);
        assert!(UID_SINGLE_LEN < UID_DOUBLE_LEN);
        assert!(UID_DOUBLE_LEN < UID_TRIPLE_LEN);
        assert_eq!(MAX_UID_LEN, 10);
    }

    #[test]
    fn test_record_headers() {
        // MB=1 ME=1 CF=0 SR=1 IL=0 TNF=001
        assert_eq!(RECORD_HEADER_SHORT, 0b1101_0001);
        // MB=1 ME=1 CF=0 SR=0 IL=0 TNF=001
        assert_eq!(RECORD_HEADER_LONG, 0b1100_0001);
    }

    #[test]
    fn test_minimum_capacity() {
        assert_eq!(MIN_PAYLOAD_CAPACITY, 7);
        assert!(DEFAULT_PAYLOAD_CAPACITY >= MIN_PAYLOAD_CAPACITY);
    }
}
