//! UID codec: credential bytes to identity register layout.
//!
//! Credentials arrive most-significant byte first, while the identity
//! register is filled least-significant byte first. The codec picks the
//! smallest size class that holds the credential, writes the bytes reversed
//! into the tail of the field and zero-pads the head:
//!
//! ```text
//! raw   = [EF BE AD BA 01]              (5 bytes -> Double)
//! field = [00 00 01 BA AD BE EF]
//! ```

use crate::{
    Result,
    constants::{MAX_UID_LEN, MIN_UID_LEN, UID_TRIPLE_LEN},
    error::Error,
    types::{SizeClass, UidOverflowPolicy},
};
use std::fmt;
use subtle::ConstantTimeEq;

/// Identity register contents for one size class.
///
/// Only the first `size_class.byte_len()` bytes are meaningful; the rest of
/// the backing array is always zero.
#[derive(Clone, Eq)]
pub struct UidField {
    bytes: [u8; UID_TRIPLE_LEN],
    size_class: SizeClass,
}

impl UidField {
    /// An all-zero field of the given size class.
    #[must_use]
    pub fn zeroed(size_class: SizeClass) -> Self {
        Self {
            bytes: [0; UID_TRIPLE_LEN],
            size_class,
        }
    }

    /// Encode a credential, rejecting anything longer than ten bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidLength` if `raw` is empty or longer than ten bytes.
    ///
    /// # Examples
    /// ```
    /// use tagpass_core::{SizeClass, UidField};
    ///
    /// let field = UidField::encode(&[0xEF, 0xBE, 0xAD, 0xBA]).unwrap();
    /// assert_eq!(field.size_class(), SizeClass::Single);
    /// assert_eq!(field.as_bytes(), &[0xBA, 0xAD, 0xBE, 0xEF]);
    /// ```
    pub fn encode(raw: &[u8]) -> Result<Self> {
        Self::encode_with_policy(raw, UidOverflowPolicy::Reject)
    }

    /// Encode a credential, applying `policy` to credentials over ten bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidLength` if `raw` is empty, or longer than ten
    /// bytes under `UidOverflowPolicy::Reject`.
    pub fn encode_with_policy(raw: &[u8], policy: UidOverflowPolicy) -> Result<Self> {
        if raw.len() < MIN_UID_LEN {
            return Err(Error::InvalidLength {
                len: raw.len(),
                max: MAX_UID_LEN,
            });
        }

        let raw = match policy {
            UidOverflowPolicy::Truncate => &raw[..raw.len().min(MAX_UID_LEN)],
            UidOverflowPolicy::Reject => raw,
        };

        let size_class = SizeClass::for_len(raw.len()).ok_or(Error::InvalidLength {
            len: raw.len(),
            max: MAX_UID_LEN,
        })?;

        let mut field = Self::zeroed(size_class);
        let size = size_class.byte_len();
        for (i, byte) in raw.iter().enumerate() {
            field.bytes[size - 1 - i] = *byte;
        }
        Ok(field)
    }

    /// Register bytes, exactly `size_class().byte_len()` long.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.size_class.byte_len()]
    }

    #[must_use]
    pub fn size_class(&self) -> SizeClass {
        self.size_class
    }

    /// Overwrite every byte with zero, keeping the size class.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    /// Register bytes as uppercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.as_bytes().iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl Default for UidField {
    fn default() -> Self {
        Self::zeroed(SizeClass::Single)
    }
}

/// Constant-time comparison so credential checks do not leak where fields differ.
impl PartialEq for UidField {
    fn eq(&self, other: &Self) -> bool {
        self.size_class == other.size_class && bool::from(self.bytes[..].ct_eq(&other.bytes[..]))
    }
}

/// Credential bytes are left out; use [`UidField::to_hex`] or `Display`.
impl fmt::Debug for UidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UidField")
            .field("size_class", &self.size_class)
            .field("zeroed", &self.is_zeroed())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.size_class, self.to_hex())
    }
}
