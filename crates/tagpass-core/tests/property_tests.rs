//! Property-based tests for the credential codecs.
//!
//! These tests use proptest to generate arbitrary credentials and URIs and
//! verify that the layout invariants hold for every accepted input.

use proptest::prelude::*;
use tagpass_core::constants::{DEFAULT_PAYLOAD_CAPACITY, MAX_UID_LEN};
use tagpass_core::{Error, SizeClass, UidField, UidOverflowPolicy, UriEncoder};

/// Strategy for credentials the codec accepts (1-10 bytes).
fn valid_uid() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=MAX_UID_LEN)
}

/// Strategy for credentials over the triple size.
fn overlong_uid() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), (MAX_UID_LEN + 1)..64)
}

/// Strategy for URI-ish byte strings, with and without known prefixes.
fn uri() -> impl Strategy<Value = Vec<u8>> {
    (
        prop_oneof![
            Just(""),
            Just("https://"),
            Just("https://www."),
            Just("tel:"),
            Just("urn:epc:id:")
        ],
        prop::string::string_regex("[a-z0-9./?=_-]{0,300}")
            .expect("Failed to create URI body regex strategy"),
    )
        .prop_map(|(prefix, body)| format!("{prefix}{body}").into_bytes())
}

proptest! {
    /// Property: the field is the reversed credential, head-padded with zeros,
    /// in the smallest size class that holds it.
    #[test]
    fn prop_uid_layout(raw in valid_uid()) {
        let field = UidField::encode(&raw).unwrap();
        let size = field.size_class().byte_len();

        prop_assert!(size >= raw.len());
        let minimal = [SizeClass::Single, SizeClass::Double, SizeClass::Triple]
            .into_iter()
            .find(|class| class.byte_len() >= raw.len())
            .unwrap();
        prop_assert_eq!(field.size_class(), minimal);

        let mut expected = vec![0u8; size - raw.len()];
        expected.extend(raw.iter().rev());
        prop_assert_eq!(field.as_bytes(), expected.as_slice());
    }

    /// Property: overlong credentials are rejected, or truncated to their
    /// leading ten bytes under the truncate policy.
    #[test]
    fn prop_uid_overflow_policy(raw in overlong_uid()) {
        let rejected = UidField::encode(&raw);
        let is_invalid_length = matches!(rejected, Err(Error::InvalidLength { .. }));
        prop_assert!(is_invalid_length);

        let truncated = UidField::encode_with_policy(&raw, UidOverflowPolicy::Truncate).unwrap();
        let leading = UidField::encode(&raw[..MAX_UID_LEN]).unwrap();
        prop_assert_eq!(truncated, leading);
    }

    /// Property: every URI either fits and reads back unchanged, or is
    /// rejected with the size it would have needed.
    #[test]
    fn prop_uri_fits_or_rejects(uri in uri()) {
        let encoder = UriEncoder::new(DEFAULT_PAYLOAD_CAPACITY);
        match encoder.encode(&uri) {
            Ok(payload) => {
                prop_assert_eq!(payload.capacity(), DEFAULT_PAYLOAD_CAPACITY);
                prop_assert_eq!(payload.uri().unwrap(), uri);
                let nlen = u16::from_be_bytes([payload.as_bytes()[0], payload.as_bytes()[1]]);
                prop_assert_eq!(usize::from(nlen), payload.message_len());
            }
            Err(Error::Encoding { required, capacity }) => {
                prop_assert_eq!(capacity, DEFAULT_PAYLOAD_CAPACITY);
                prop_assert!(required > capacity);
                prop_assert_eq!(required, encoder.encoded_len(&uri));
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
