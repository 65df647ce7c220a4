//! Canonical encoding and signing of gateway payloads.
//!
//! The signing input is `k1=v1&k2=v2&...&key=<api key>`: keys in ascending
//! byte order, the `sign` field and empty values left out. This layout is
//! part of the wire contract and must not change.

use hmac::{Hmac, Mac as _};
use sha2::Sha256;

use crate::mch::types::{FIELD_SIGN, Payload, SignType};

type HmacSha256 = Hmac<Sha256>;

/// Builds the byte string every signature is computed over.
#[must_use]
pub fn canonical_string(payload: &Payload, api_key: &str) -> String {
    let mut canonical = String::new();

    // Payload iterates in key order already.
    for (key, value) in payload.iter() {
        if key == FIELD_SIGN || value.is_empty() {
            continue;
        }
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
        canonical.push('&');
    }

    canonical.push_str("key=");
    canonical.push_str(api_key);
    canonical
}

/// Signs `payload` with `sign_type`, returning uppercase hex.
///
/// The caller decides where the result goes, usually the `sign` field.
#[must_use]
pub fn sign(payload: &Payload, sign_type: SignType, api_key: &str) -> String {
    match sign_type {
        SignType::Md5 => sign_with_md5(payload, api_key),
        SignType::HmacSha256 => sign_with_hmac_sha256(payload, api_key),
    }
}

#[must_use]
pub fn sign_with_md5(payload: &Payload, api_key: &str) -> String {
    let digest = md5::compute(canonical_string(payload, api_key).as_bytes());
    hex::encode_upper(digest.0)
}

#[must_use]
#[expect(
    clippy::expect_used,
    reason = "HMAC accepts keys of any length, so keying never fails"
)]
pub fn sign_with_hmac_sha256(payload: &Payload, api_key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(api_key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(canonical_string(payload, api_key).as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_KEY: &str = "192006250b4c09247ec02edce69f6a2d";

    fn sample() -> Payload {
        Payload::from_iter([
            ("mch_id", "1900000109"),
            ("nonce_str", "5K8264ILTKCH16CQ2502SI8ZNMTM67VS"),
            ("body", "test"),
        ])
    }

    #[test]
    fn canonical_string_sorts_keys_and_appends_key() {
        assert_eq!(
            canonical_string(&sample(), API_KEY),
            "body=test&mch_id=1900000109&nonce_str=5K8264ILTKCH16CQ2502SI8ZNMTM67VS\
             &key=192006250b4c09247ec02edce69f6a2d"
        );
    }

    #[test]
    fn canonical_string_skips_sign_and_empty_values() {
        let payload = sample()
            .with("sign", "ABCDEF")
            .with("attach", "")
            .with("detail", "");

        assert_eq!(
            canonical_string(&payload, API_KEY),
            canonical_string(&sample(), API_KEY)
        );
    }

    #[test]
    fn canonical_string_of_empty_payload_is_only_key() {
        assert_eq!(canonical_string(&Payload::new(), "k"), "key=k");
    }

    #[test]
    fn canonical_string_uses_byte_order() {
        let payload = Payload::from_iter([("b", "1"), ("B", "2"), ("a_b", "3"), ("aB", "4")]);

        assert_eq!(canonical_string(&payload, "k"), "B=2&aB=4&a_b=3&b=1&key=k");
    }

    #[test]
    fn insertion_order_does_not_change_signature() {
        let forward = sample();
        let mut reversed = Payload::new();
        let pairs: Vec<_> = sample().into_iter().collect();
        for (k, v) in pairs.into_iter().rev() {
            reversed.insert(k, v);
        }

        for sign_type in [SignType::Md5, SignType::HmacSha256] {
            assert_eq!(
                sign(&forward, sign_type, API_KEY),
                sign(&reversed, sign_type, API_KEY)
            );
        }
    }

    #[test]
    fn md5_known_answer() {
        assert_eq!(
            sign(&sample(), SignType::Md5, API_KEY),
            "3970B01F02691EA97ADD572BE097721A"
        );
    }

    #[test]
    fn hmac_sha256_known_answer() {
        let payload = sample().with("sign_type", "HMAC-SHA256");

        assert_eq!(
            sign(&payload, SignType::HmacSha256, API_KEY),
            "25BAE7CC429A6C9BED1B66C1D95AC0F97B63E9EF5252750324EC46FC8A0AF7A5"
        );
    }

    #[test]
    fn algorithms_differ_over_same_input() {
        let md5 = sign(&sample(), SignType::Md5, API_KEY);
        let hmac = sign(&sample(), SignType::HmacSha256, API_KEY);

        assert_eq!(md5.len(), 32);
        assert_eq!(hmac.len(), 64);
        assert_eq!(
            hmac,
            "5A0A58F651C1C97E1C7F0DD5399C58DD676E9435B3666399537D23CF125A25C2"
        );
    }

    #[test]
    fn existing_sign_field_is_ignored() {
        let signed = sample().with("sign", sign(&sample(), SignType::Md5, API_KEY));

        assert_eq!(
            sign(&signed, SignType::Md5, API_KEY),
            sign(&sample(), SignType::Md5, API_KEY)
        );
    }
}
