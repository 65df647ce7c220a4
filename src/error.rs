use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;

/// Coarse classification of every failure this crate can return.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
    /// Network, TLS or body-read failure reported by the HTTP stack.
    Transport,
    /// The gateway answered with a non-2xx HTTP status.
    Status,
    /// The gateway answered, but `return_code` was not `SUCCESS`.
    Gateway,
    /// A reply signature did not match the locally computed one.
    Signature,
    /// A reply carried an `appid` or `mch_id` that is not ours.
    Identity,
    /// A `sign_type` value this client does not know.
    UnsupportedAlgorithm,
    /// Loading or installing a mutual-TLS client identity failed.
    Certificate,
    /// Caller input or a reply field failed validation.
    Validation,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Returns the typed error behind this one, e.g. [`SignatureMismatch`].
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(reason: S) -> Self {
        Validation {
            reason: reason.into(),
        }
        .into()
    }

    pub fn status<S: Into<String>>(status_code: StatusCode, path: String, message: S) -> Self {
        Status {
            status_code,
            path,
            message: message.into(),
        }
        .into()
    }

    pub fn gateway<S: Into<String>>(message: S) -> Self {
        Gateway {
            message: message.into(),
        }
        .into()
    }

    pub fn signature_mismatch(expected: String, actual: String) -> Self {
        SignatureMismatch { expected, actual }.into()
    }

    pub fn identity_mismatch(field: &'static str, expected: &str, actual: &str) -> Self {
        IdentityMismatch {
            field,
            expected: expected.to_owned(),
            actual: actual.to_owned(),
        }
        .into()
    }

    pub fn unsupported_sign_type<S: Into<String>>(value: S) -> Self {
        UnsupportedSignType {
            value: value.into(),
        }
        .into()
    }

    pub fn certificate<S: Into<String>>(failure: CertificateFailure, message: S) -> Self {
        Certificate {
            failure,
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn internal<S: StdError + Send + Sync + 'static>(source: S) -> Self {
        Self::with_source(Kind::Internal, source)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {src}", self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub status_code: StatusCode,
    pub path: String,
    pub message: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) posting {}: {}",
            self.status_code, self.path, self.message
        )
    }
}

impl StdError for Status {}

/// Non-success `return_code`, carrying the gateway's `return_msg`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub message: String,
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gateway returned failure: {}", self.message)
    }
}

impl StdError for Gateway {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMismatch {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for SignatureMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signature verification failed, want: {}, got: {}",
            self.expected, self.actual
        )
    }
}

impl StdError for SignatureMismatch {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMismatch {
    /// Reply field that disagreed, `appid` or `mch_id`.
    pub field: &'static str,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for IdentityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatch, want: {}, got: {}",
            self.field, self.expected, self.actual
        )
    }
}

impl StdError for IdentityMismatch {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedSignType {
    pub value: String,
}

impl fmt::Display for UnsupportedSignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid sign type: {}", self.value)
    }
}

impl StdError for UnsupportedSignType {}

#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CertificateFailure {
    /// A certificate, key or archive file could not be read.
    Io,
    /// PEM or archive contents are malformed or incomplete.
    Format,
    /// The archive could not be unlocked with the merchant ID.
    Decode,
    /// The certificate's public key does not belong to the private key.
    KeypairMismatch,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub failure: CertificateFailure,
    pub message: String,
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "certificate {:?} error: {}", self.failure, self.message)
    }
}

impl StdError for Certificate {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

impl From<Status> for Error {
    fn from(err: Status) -> Self {
        Error::with_source(Kind::Status, err)
    }
}

impl From<Gateway> for Error {
    fn from(err: Gateway) -> Self {
        Error::with_source(Kind::Gateway, err)
    }
}

impl From<SignatureMismatch> for Error {
    fn from(err: SignatureMismatch) -> Self {
        Error::with_source(Kind::Signature, err)
    }
}

impl From<IdentityMismatch> for Error {
    fn from(err: IdentityMismatch) -> Self {
        Error::with_source(Kind::Identity, err)
    }
}

impl From<UnsupportedSignType> for Error {
    fn from(err: UnsupportedSignType) -> Self {
        Error::with_source(Kind::UnsupportedAlgorithm, err)
    }
}

impl From<Certificate> for Error {
    fn from(err: Certificate) -> Self {
        Error::with_source(Kind::Certificate, err)
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::with_source(Kind::Transport, err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}
