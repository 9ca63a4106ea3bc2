//! URI encoder: URI bytes to a Type 4 Tag NDEF file holding one URI record.
//!
//! The encoder always produces a buffer of the full configured capacity.
//! The emulation stack reads the real message length from the NLEN prefix,
//! so the zero bytes after the record are never exposed to a reader.

use crate::{
    Result,
    constants::{
        LONG_RECORD_OVERHEAD, MAX_NDEF_MESSAGE_LEN, NLEN_FIELD_SIZE, RECORD_HEADER_LONG,
        RECORD_HEADER_SHORT, SHORT_RECORD_MAX_PAYLOAD, SHORT_RECORD_OVERHEAD, URI_RECORD_TYPE,
        URI_TYPE_LEN,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefixes of the NFC Forum URI Record Type Definition, indexed by code.
const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// URI identifier code: the one-byte scheme abbreviation of a URI record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct UriIdentifierCode(u8);

impl UriIdentifierCode {
    pub const NONE: Self = Self(0x00);
    pub const HTTP_WWW: Self = Self(0x01);
    pub const HTTPS_WWW: Self = Self(0x02);
    pub const HTTP: Self = Self(0x03);
    pub const HTTPS: Self = Self(0x04);
    pub const TEL: Self = Self(0x05);
    pub const MAILTO: Self = Self(0x06);

    /// Look up a code, returning `None` for reserved values.
    #[must_use]
    pub fn new(code: u8) -> Option<Self> {
        (usize::from(code) < URI_PREFIXES.len()).then_some(Self(code))
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Text the code stands for.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        URI_PREFIXES[usize::from(self.0)]
    }

    /// Find the longest abbreviation for `uri` and split off the prefix.
    ///
    /// # Examples
    /// ```
    /// use tagpass_core::UriIdentifierCode;
    ///
    /// let (code, body) = UriIdentifierCode::detect(b"https://www.example.com");
    /// assert_eq!(code, UriIdentifierCode::HTTPS_WWW);
    /// assert_eq!(body, b"example.com");
    /// ```
    #[must_use]
    pub fn detect(uri: &[u8]) -> (Self, &[u8]) {
        URI_PREFIXES
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, prefix)| uri.starts_with(prefix.as_bytes()))
            .max_by_key(|(_, prefix)| prefix.len())
            .map(|(code, prefix)| (Self(code as u8), &uri[prefix.len()..]))
            .unwrap_or((Self::NONE, uri))
    }
}

impl TryFrom<u8> for UriIdentifierCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Self::new(code)
            .ok_or_else(|| Error::config(format!("Reserved URI identifier code 0x{code:02X}")))
    }
}

impl From<UriIdentifierCode> for u8 {
    fn from(code: UriIdentifierCode) -> Self {
        code.0
    }
}

impl fmt::Display for UriIdentifierCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X} ({:?})", self.0, self.prefix())
    }
}

/// How the encoder chooses the identifier code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UriPrefixMode {
    /// Abbreviate the longest known prefix found in the URI.
    #[default]
    Detect,
    /// The URI is a body only; prepend this code unconditionally.
    Fixed(UriIdentifierCode),
}

/// Fixed-capacity NDEF file contents.
#[derive(Clone, PartialEq, Eq)]
pub struct TagPayload {
    bytes: Box<[u8]>,
    message_len: usize,
}

impl TagPayload {
    /// A buffer describing an empty NDEF file (NLEN = 0).
    #[must_use]
    pub fn empty(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity].into_boxed_slice(),
            message_len: 0,
        }
    }

    /// Whole buffer, as submitted to the emulation stack.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// NDEF message bytes, without NLEN or padding.
    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.bytes[NLEN_FIELD_SIZE.min(self.bytes.len())..][..self.message_len]
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn message_len(&self) -> usize {
        self.message_len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message_len == 0
    }

    /// Reassemble the URI carried by the record, if the buffer holds one.
    #[must_use]
    pub fn uri(&self) -> Option<Vec<u8>> {
        let message = self.message();
        let (&header, rest) = message.split_first()?;
        let (&type_len, rest) = rest.split_first()?;
        if type_len != URI_TYPE_LEN {
            return None;
        }
        let (payload_len, rest) = match header {
            RECORD_HEADER_SHORT => {
                let (&len, rest) = rest.split_first()?;
                (usize::from(len), rest)
            }
            RECORD_HEADER_LONG => {
                let (len, rest) = rest.split_at_checked(4)?;
                let len = u32::from_be_bytes(len.try_into().ok()?);
                (usize::try_from(len).ok()?, rest)
            }
            _ => return None,
        };

        let (&record_type, payload) = rest.split_first()?;
        if record_type != URI_RECORD_TYPE || payload.len() != payload_len {
            return None;
        }
        let (&code, body) = payload.split_first()?;
        let mut uri = UriIdentifierCode::new(code)?.prefix().as_bytes().to_vec();
        uri.extend_from_slice(body);
        Some(uri)
    }
}

impl fmt::Debug for TagPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagPayload")
            .field("capacity", &self.capacity())
            .field("message_len", &self.message_len)
            .finish()
    }
}

/// Encodes URIs into fixed-capacity tag payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriEncoder {
    capacity: usize,
    prefix_mode: UriPrefixMode,
}

impl UriEncoder {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            prefix_mode: UriPrefixMode::Detect,
        }
    }

    #[must_use]
    pub fn with_prefix_mode(mut self, prefix_mode: UriPrefixMode) -> Self {
        self.prefix_mode = prefix_mode;
        self
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffer bytes an encoded `uri` occupies.
    #[must_use]
    pub fn encoded_len(&self, uri: &[u8]) -> usize {
        let (_, body) = self.split(uri);
        NLEN_FIELD_SIZE + Self::record_len(body.len() + 1)
    }

    /// Encode `uri` as the only record of an NDEF file.
    ///
    /// # Errors
    /// Returns `Error::Encoding` if NLEN plus the record does not fit the buffer.
    ///
    /// # Examples
    /// ```
    /// use tagpass_core::UriEncoder;
    ///
    /// let payload = UriEncoder::new(32).encode(b"https://a.io").unwrap();
    /// assert_eq!(payload.capacity(), 32);
    /// assert_eq!(&payload.as_bytes()[..6], &[0x00, 0x09, 0xD1, 0x01, 0x05, 0x55]);
    /// assert_eq!(payload.uri().unwrap(), b"https://a.io");
    /// ```
    pub fn encode(&self, uri: &[u8]) -> Result<TagPayload> {
        let (code, body) = self.split(uri);
        let payload_len = body.len() + 1;
        let message_len = Self::record_len(payload_len);
        let required = NLEN_FIELD_SIZE + message_len;

        if required > self.capacity || message_len > MAX_NDEF_MESSAGE_LEN {
            return Err(Error::Encoding {
                required,
                capacity: self.capacity,
            });
        }

        let mut bytes = vec![0u8; self.capacity];
        bytes[..NLEN_FIELD_SIZE].copy_from_slice(&(message_len as u16).to_be_bytes());

        let mut cursor = NLEN_FIELD_SIZE;
        let mut put = |data: &[u8]| {
            bytes[cursor..cursor + data.len()].copy_from_slice(data);
            cursor += data.len();
        };

        if payload_len <= SHORT_RECORD_MAX_PAYLOAD {
            put(&[RECORD_HEADER_SHORT, URI_TYPE_LEN, payload_len as u8]);
        } else {
            put(&[RECORD_HEADER_LONG, URI_TYPE_LEN]);
            put(&(payload_len as u32).to_be_bytes());
        }
        put(&[URI_RECORD_TYPE, code.as_u8()]);
        put(body);

        Ok(TagPayload {
            bytes: bytes.into_boxed_slice(),
            message_len,
        })
    }

    fn split<'a>(&self, uri: &'a [u8]) -> (UriIdentifierCode, &'a [u8]) {
        match self.prefix_mode {
            UriPrefixMode::Detect => UriIdentifierCode::detect(uri),
            UriPrefixMode::Fixed(code) => (code, uri),
        }
    }

    fn record_len(payload_len: usize) -> usize {
        let overhead = if payload_len <= SHORT_RECORD_MAX_PAYLOAD {
            SHORT_RECORD_OVERHEAD
        } else {
            LONG_RECORD_OVERHEAD
        };
        overhead + payload_len
    }
}
