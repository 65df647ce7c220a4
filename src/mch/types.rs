use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::str::FromStr;

use rand::Rng as _;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::Error;

pub const FIELD_SIGN: &str = "sign";
pub const FIELD_SIGN_TYPE: &str = "sign_type";
pub const FIELD_APPID: &str = "appid";
pub const FIELD_MCH_ID: &str = "mch_id";
pub const FIELD_NONCE_STR: &str = "nonce_str";
pub const FIELD_RETURN_CODE: &str = "return_code";
pub const FIELD_RETURN_MSG: &str = "return_msg";

/// Flat string-to-string message exchanged with the gateway.
///
/// Keys are kept in byte order, so iteration order never depends on the
/// order fields were inserted in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, String>);

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Algorithm named by the `sign_type` field, [`SignType::Md5`] when absent.
    pub fn sign_type(&self) -> Result<SignType> {
        self.get(FIELD_SIGN_TYPE)
            .map_or(Ok(SignType::Md5), SignType::from_str)
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Payload {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl From<BTreeMap<String, String>> for Payload {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl IntoIterator for Payload {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Merchant identity and signing secret, fixed for the life of a client.
///
/// The API key only ever feeds local signing; it is never put on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct Credential {
    appid: String,
    mch_id: String,
    api_key: SecretString,
}

impl Credential {
    pub fn new<A, M, K>(appid: A, mch_id: M, api_key: K) -> Self
    where
        A: Into<String>,
        M: Into<String>,
        K: Into<String>,
    {
        Self {
            appid: appid.into(),
            mch_id: mch_id.into(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    #[must_use]
    pub fn appid(&self) -> &str {
        &self.appid
    }

    #[must_use]
    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Signature algorithms understood by the gateway, named as in `sign_type`.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, strum_macros::Display)]
pub enum SignType {
    #[default]
    #[strum(serialize = "MD5")]
    Md5,
    #[strum(serialize = "HMAC-SHA256")]
    HmacSha256,
}

impl SignType {
    pub fn parse(value: &str) -> Result<SignType> {
        match value {
            "MD5" => Ok(SignType::Md5),
            "HMAC-SHA256" => Ok(SignType::HmacSha256),
            other => Err(Error::unsupported_sign_type(other)),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SignType::Md5 => "MD5",
            SignType::HmacSha256 => "HMAC-SHA256",
        }
    }
}

impl FromStr for SignType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SignType::parse(s)
    }
}

/// Which of the client's two connections a call travels over.
///
/// Refunds, transfers, cash bonuses and other operations that move money
/// out of the merchant account require [`Channel::MutualTls`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Channel {
    #[default]
    Standard,
    MutualTls,
}

impl Channel {
    #[must_use]
    pub const fn from_sensitive(sensitive: bool) -> Self {
        if sensitive {
            Channel::MutualTls
        } else {
            Channel::Standard
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Standard => f.write_str("standard"),
            Channel::MutualTls => f.write_str("mutual-tls"),
        }
    }
}

/// Random alphanumeric string for `nonce_str`-style fields.
#[must_use]
pub fn nonce(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn sign_type_defaults_to_md5() {
        let payload = Payload::from_iter([("body", "test")]);

        assert_eq!(payload.sign_type().unwrap(), SignType::Md5);
    }

    #[test]
    fn sign_type_rejects_unknown_algorithm() {
        let payload = Payload::from_iter([(FIELD_SIGN_TYPE, "SHA1")]);

        let err = payload.sign_type().unwrap_err();
        assert_eq!(err.kind(), Kind::UnsupportedAlgorithm);
        assert!(err.to_string().contains("SHA1"));
    }

    #[test]
    fn sign_type_display_matches_wire_value() {
        assert_eq!(SignType::Md5.to_string(), "MD5");
        assert_eq!(SignType::HmacSha256.to_string(), SignType::HmacSha256.as_str());
        assert_eq!("HMAC-SHA256".parse::<SignType>().unwrap(), SignType::HmacSha256);
    }

    #[test]
    fn payload_iterates_in_key_order() {
        let payload = Payload::new()
            .with("nonce_str", "x")
            .with("body", "y")
            .with("appid", "z");

        let keys: Vec<_> = payload.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["appid", "body", "nonce_str"]);
    }

    #[test]
    fn credential_debug_redacts_api_key() {
        let credential = Credential::new("wx123", "1900000109", "super-secret");

        assert!(!format!("{credential:?}").contains("super-secret"));
        assert_eq!(credential.api_key(), "super-secret");
    }

    #[test]
    fn nonce_has_requested_length() {
        let value = nonce(16);

        assert_eq!(value.len(), 16);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(value, nonce(16));
    }

    #[test]
    fn channel_from_sensitivity() {
        assert_eq!(Channel::from_sensitive(true), Channel::MutualTls);
        assert_eq!(Channel::from_sensitive(false), Channel::Standard);
    }
}
