//! Emulator configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! error_max = 3
//! counter_policy = "lifetime"
//! uid_overflow = "reject"
//! payload_capacity = 256
//! uri_prefix = { fixed = 4 }
//! default_uri = "tagpass.example/credential"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tagpass_core::{
    Error, Result, UidOverflowPolicy, UriEncoder, UriPrefixMode,
    constants::{
        DEFAULT_ERROR_MAX, DEFAULT_PAYLOAD_CAPACITY, MAX_NDEF_MESSAGE_LEN, MIN_PAYLOAD_CAPACITY,
        NLEN_FIELD_SIZE,
    },
};

/// When the consecutive-failure counters go back to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCounterPolicy {
    /// Counters only ever grow for the lifetime of the controller.
    #[default]
    Lifetime,

    /// A successful call of the same kind resets its counter.
    ResetOnSuccess,
}

/// Configuration for an [`EmulationController`](crate::EmulationController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    /// Failures of one kind after which the controller gives up.
    pub error_max: u32,

    pub counter_policy: ErrorCounterPolicy,

    /// What to do with credentials longer than ten bytes.
    pub uid_overflow: UidOverflowPolicy,

    /// Size of the NDEF file buffer handed to the backend.
    pub payload_capacity: usize,

    pub uri_prefix: UriPrefixMode,

    /// URI applied once at construction.
    pub default_uri: Option<String>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            error_max: DEFAULT_ERROR_MAX,
            counter_policy: ErrorCounterPolicy::default(),
            uid_overflow: UidOverflowPolicy::default(),
            payload_capacity: DEFAULT_PAYLOAD_CAPACITY,
            uri_prefix: UriPrefixMode::default(),
            default_uri: None,
        }
    }
}

impl EmulatorConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the document does not parse or fails
    /// [`validate`](Self::validate).
    ///
    /// # Examples
    ///
    /// ```
    /// use tagpass_emulator::{EmulatorConfig, ErrorCounterPolicy};
    ///
    /// let config =
    ///     EmulatorConfig::from_toml_str("counter_policy = \"reset_on_success\"").unwrap();
    /// assert_eq!(config.counter_policy, ErrorCounterPolicy::ResetOnSuccess);
    /// assert_eq!(config.error_max, 3);
    /// ```
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config: Self = toml::from_str(document).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let document = std::fs::read_to_string(path)?;
        Self::from_toml_str(&document)
    }

    /// Check value ranges and that `default_uri` fits the buffer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.error_max == 0 {
            return Err(Error::config("error_max must be at least 1"));
        }

        let max_capacity = NLEN_FIELD_SIZE + MAX_NDEF_MESSAGE_LEN;
        if !(MIN_PAYLOAD_CAPACITY..=max_capacity).contains(&self.payload_capacity) {
            return Err(Error::config(format!(
                "payload_capacity must be between {} and {}, got {}",
                MIN_PAYLOAD_CAPACITY, max_capacity, self.payload_capacity
            )));
        }

        if let Some(uri) = &self.default_uri {
            self.encoder()
                .encode(uri.as_bytes())
                .map_err(|e| Error::config(format!("default_uri: {e}")))?;
        }

        Ok(())
    }

    /// Encoder for this configuration's buffer size and prefix mode.
    #[must_use]
    pub fn encoder(&self) -> UriEncoder {
        UriEncoder::new(self.payload_capacity).with_prefix_mode(self.uri_prefix)
    }

    /// Set the failure limit.
    #[must_use]
    pub fn with_error_max(mut self, error_max: u32) -> Self {
        self.error_max = error_max;
        self
    }

    /// Set the counter reset policy.
    #[must_use]
    pub fn with_counter_policy(mut self, policy: ErrorCounterPolicy) -> Self {
        self.counter_policy = policy;
        self
    }

    /// Set the UID overflow policy.
    #[must_use]
    pub fn with_uid_overflow(mut self, policy: UidOverflowPolicy) -> Self {
        self.uid_overflow = policy;
        self
    }

    /// Set the payload buffer size.
    #[must_use]
    pub fn with_payload_capacity(mut self, capacity: usize) -> Self {
        self.payload_capacity = capacity;
        self
    }

    /// Set the URI prefix mode.
    #[must_use]
    pub fn with_uri_prefix(mut self, mode: UriPrefixMode) -> Self {
        self.uri_prefix = mode;
        self
    }

    /// Set the URI applied at construction.
    #[must_use]
    pub fn with_default_uri(mut self, uri: impl Into<String>) -> Self {
        self.default_uri = Some(uri.into());
        self
    }
}
