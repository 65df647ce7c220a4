//! Client identities for the mutual-TLS connection.
//!
//! The gateway issues merchants a PKCS#12 archive whose pass phrase is the
//! merchant ID. It can also be supplied as a separate certificate and key,
//! on disk or in memory. All three sources end up as a [`ClientIdentity`].

use std::fs;
use std::path::Path;

use p12::PFX;
use pem::Pem;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::{Error as TlsError, InconsistentKeys};
use secrecy::{ExposeSecret as _, SecretSlice};

use crate::Result;
use crate::error::{CertificateFailure, Error};

const CERTIFICATE_TAG: &str = "CERTIFICATE";
const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

/// A validated private key and certificate chain.
///
/// Only ever built whole: every constructor checks that the leaf
/// certificate belongs to the private key.
#[derive(Debug)]
pub struct ClientIdentity {
    certificates: Vec<CertificateDer<'static>>,
    pem: SecretSlice<u8>,
}

impl ClientIdentity {
    /// Unlocks a PKCS#12 archive with the merchant ID as pass phrase.
    pub fn from_p12(archive: &[u8], mch_id: &str) -> Result<Self> {
        let pfx = PFX::parse(archive).map_err(|e| {
            Error::certificate(
                CertificateFailure::Format,
                format!("unable to parse PKCS#12 archive: {e:?}"),
            )
        })?;

        if !pfx.verify_mac(mch_id) {
            return Err(Error::certificate(
                CertificateFailure::Decode,
                "PKCS#12 integrity check failed; the merchant ID does not unlock this archive",
            ));
        }

        let certificates = pfx.cert_x509_bags(mch_id).map_err(|e| {
            Error::certificate(
                CertificateFailure::Decode,
                format!("unable to decrypt archive certificates: {e:?}"),
            )
        })?;
        let keys = pfx.key_bags(mch_id).map_err(|e| {
            Error::certificate(
                CertificateFailure::Decode,
                format!("unable to decrypt archive private key: {e:?}"),
            )
        })?;

        if certificates.is_empty() || keys.is_empty() {
            return Err(Error::certificate(
                CertificateFailure::Format,
                format!(
                    "archive holds {} certificate(s) and {} key(s), need at least one of each",
                    certificates.len(),
                    keys.len()
                ),
            ));
        }

        let blocks: Vec<Pem> = certificates
            .into_iter()
            .map(|der| Pem::new(CERTIFICATE_TAG, der))
            .chain(keys.into_iter().map(|der| Pem::new(PRIVATE_KEY_TAG, der)))
            .collect();
        let bundle = pem::encode_many(&blocks);

        Self::from_pem(bundle.as_bytes(), bundle.as_bytes())
    }

    /// Reads a PEM certificate chain and PEM private key from disk.
    pub fn from_pem_files<C: AsRef<Path>, K: AsRef<Path>>(
        cert_file: C,
        key_file: K,
    ) -> Result<Self> {
        let cert_pem = read(cert_file.as_ref())?;
        let key_pem = read(key_file.as_ref())?;

        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Reads a PKCS#12 archive from disk, see [`ClientIdentity::from_p12`].
    pub fn from_p12_file<P: AsRef<Path>>(path: P, mch_id: &str) -> Result<Self> {
        let archive = read(path.as_ref())?;

        Self::from_p12(&archive, mch_id)
    }

    /// Parses PEM blocks. Either input may carry unrelated blocks; the first
    /// private key in `key_pem` and every certificate in `cert_pem` are used.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let certificates = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                Error::certificate(
                    CertificateFailure::Format,
                    format!("invalid certificate PEM: {e}"),
                )
            })?;
        if certificates.is_empty() {
            return Err(Error::certificate(
                CertificateFailure::Format,
                "no CERTIFICATE block found",
            ));
        }

        let key = rustls_pemfile::private_key(&mut &key_pem[..])
            .map_err(|e| {
                Error::certificate(
                    CertificateFailure::Format,
                    format!("invalid private key PEM: {e}"),
                )
            })?
            .ok_or_else(|| {
                Error::certificate(CertificateFailure::Format, "no private key block found")
            })?;

        ensure_keys_match(&certificates, key.clone_key())?;

        let mut normalised: Vec<Pem> = certificates
            .iter()
            .map(|der| Pem::new(CERTIFICATE_TAG, der.to_vec()))
            .collect();
        normalised.push(key_to_pem(&key));

        Ok(Self {
            certificates,
            pem: SecretSlice::from(pem::encode_many(&normalised).into_bytes()),
        })
    }

    /// Leaf certificate, DER encoded.
    #[must_use]
    pub fn certificate(&self) -> &CertificateDer<'static> {
        &self.certificates[0]
    }

    #[must_use]
    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    /// Normalised PEM text holding the chain followed by the private key.
    pub(crate) fn pem(&self) -> &[u8] {
        self.pem.expose_secret()
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        Error::certificate(
            CertificateFailure::Io,
            format!("unable to read {}: {e}", path.display()),
        )
    })
}

fn key_to_pem(key: &PrivateKeyDer<'_>) -> Pem {
    let tag = match key {
        PrivateKeyDer::Pkcs1(_) => "RSA PRIVATE KEY",
        PrivateKeyDer::Sec1(_) => "EC PRIVATE KEY",
        _ => PRIVATE_KEY_TAG,
    };
    Pem::new(tag, key.secret_der().to_vec())
}

fn ensure_keys_match(
    certificates: &[CertificateDer<'static>],
    key: PrivateKeyDer<'static>,
) -> Result<()> {
    let provider = rustls::crypto::ring::default_provider();
    let signing_key = provider.key_provider.load_private_key(key).map_err(|e| {
        Error::certificate(
            CertificateFailure::Format,
            format!("unsupported private key: {e}"),
        )
    })?;

    match CertifiedKey::new(certificates.to_vec(), signing_key).keys_match() {
        Ok(()) | Err(TlsError::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(()),
        Err(TlsError::InconsistentKeys(InconsistentKeys::KeyMismatch)) => Err(Error::certificate(
            CertificateFailure::KeypairMismatch,
            "private key does not match certificate public key",
        )),
        Err(e) => Err(Error::certificate(
            CertificateFailure::Format,
            format!("unable to compare certificate and key: {e}"),
        )),
    }
}
