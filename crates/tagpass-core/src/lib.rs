//! Core types for credential presentation over NFC tag emulation.
//!
//! This crate holds the pure parts of the system: the error taxonomy shared
//! by every crate, the UID codec that lays a credential out for the identity
//! register, and the URI encoder that builds the tag's NDEF file.

pub mod constants;
pub mod error;
pub mod ndef;
pub mod types;
pub mod uid;

pub use error::{BackendOperation, Error, Result};
pub use ndef::{TagPayload, UriEncoder, UriIdentifierCode, UriPrefixMode};
pub use types::*;
pub use uid::UidField;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
