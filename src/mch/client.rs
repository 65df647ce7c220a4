use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use url::Url;

use crate::error::Error;
use crate::mch::sign;
use crate::mch::types::{
    FIELD_MCH_ID, FIELD_NONCE_STR, FIELD_RETURN_CODE, FIELD_RETURN_MSG, FIELD_SIGN,
    FIELD_SIGN_TYPE, nonce,
};
use crate::mch::verify::verify_reply;
use crate::mch::{Channel, ClientIdentity, Config, Credential, Payload, SignType};
use crate::transport::{HttpTransport, Transport};
use crate::{RESULT_SUCCESS, RSA_PUBLIC_KEY_URL, Result, xml};

const NONCE_LEN: usize = 16;

/// Merchant API client holding one plain and one mutual-TLS connection.
///
/// Sharing a `Client` across tasks is fine: the credential never changes,
/// and replacing the mutual-TLS identity swaps the transport atomically.
/// Calls already in flight keep the transport they started with.
#[derive(Debug)]
pub struct Client {
    config: Config,
    credential: Credential,
    transport: Arc<dyn Transport>,
    tls_transport: RwLock<Arc<dyn Transport>>,
}

impl Client {
    /// Creates a client against the production host.
    ///
    /// The mutual-TLS connection presents no certificate until one of the
    /// `load_cert_*` methods succeeds.
    pub fn new(credential: Credential) -> Result<Self> {
        Self::with_config(credential, Config::default())
    }

    pub fn with_config(credential: Credential, config: Config) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        let tls_transport = Arc::new(HttpTransport::new(&config)?);

        Ok(Self::with_transports_inner(
            credential,
            config,
            transport,
            tls_transport,
        ))
    }

    /// Creates a client from caller-supplied transports.
    pub fn with_transports(
        credential: Credential,
        config: Config,
        transport: Arc<dyn Transport>,
        tls_transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self::with_transports_inner(
            credential,
            config,
            transport,
            tls_transport,
        ))
    }

    fn with_transports_inner(
        credential: Credential,
        config: Config,
        transport: Arc<dyn Transport>,
        tls_transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            credential,
            transport,
            tls_transport: RwLock::new(tls_transport),
        }
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Loads the PKCS#12 archive issued by the gateway, unlocking it with
    /// the merchant ID.
    pub fn load_cert_from_p12_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let identity = ClientIdentity::from_p12_file(path, self.credential.mch_id())?;
        self.install_identity(&identity)
    }

    pub fn load_cert_from_pem_file<C: AsRef<Path>, K: AsRef<Path>>(
        &self,
        cert_file: C,
        key_file: K,
    ) -> Result<()> {
        let identity = ClientIdentity::from_pem_files(cert_file, key_file)?;
        self.install_identity(&identity)
    }

    pub fn load_cert_from_pem_block(&self, cert_pem: &[u8], key_pem: &[u8]) -> Result<()> {
        let identity = ClientIdentity::from_pem(cert_pem, key_pem)?;
        self.install_identity(&identity)
    }

    /// Builds a mutual-TLS transport for `identity` and swaps it in.
    ///
    /// On error the previously installed transport stays in place.
    pub fn install_identity(&self, identity: &ClientIdentity) -> Result<()> {
        let transport = HttpTransport::with_identity(&self.config, identity)?;
        self.replace_tls_transport(Arc::new(transport));

        #[cfg(feature = "tracing")]
        tracing::info!(
            chain_len = identity.certificate_chain().len(),
            "installed mutual-TLS client identity"
        );

        Ok(())
    }

    /// Swaps the mutual-TLS transport, returning the previous one.
    pub fn replace_tls_transport(&self, transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
        let mut guard = self
            .tls_transport
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, transport)
    }

    fn transport_for(&self, channel: Channel) -> Arc<dyn Transport> {
        match channel {
            Channel::Standard => Arc::clone(&self.transport),
            Channel::MutualTls => Arc::clone(
                &self
                    .tls_transport
                    .read()
                    .unwrap_or_else(PoisonError::into_inner),
            ),
        }
    }

    /// Signs `payload`, sends it over `channel` and returns the verified reply.
    ///
    /// The payload is signed with the algorithm in its own `sign_type` field
    /// (MD5 when absent). A reply whose `return_code` is not `SUCCESS` is
    /// returned as a gateway error without checking its signature.
    pub async fn call(
        &self,
        path: &str,
        mut payload: Payload,
        channel: Channel,
    ) -> Result<Payload> {
        let url = self.config.endpoint(path)?;
        let sign_type = payload.sign_type()?;
        let signature = sign::sign(&payload, sign_type, self.credential.api_key());
        payload.insert(FIELD_SIGN, signature);

        let body = xml::to_string(&payload)?;
        let transport = self.transport_for(channel);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            url = %url,
            channel = %channel,
            sign_type = %sign_type,
            "posting to gateway"
        );

        let raw = transport.post(url, body).await?;
        let reply = xml::from_str(&raw)?;

        Self::ensure_success(&reply)?;

        if let Err(e) = verify_reply(&reply, &self.credential) {
            #[cfg(feature = "tracing")]
            tracing::warn!(path, error = %e, "gateway reply failed verification");
            return Err(e);
        }

        Ok(reply)
    }

    /// Sends `payload` over the plain connection.
    pub async fn post(&self, path: &str, payload: Payload) -> Result<Payload> {
        self.call(path, payload, Channel::Standard).await
    }

    /// Sends `payload` over the mutual-TLS connection.
    pub async fn post_tls(&self, path: &str, payload: Payload) -> Result<Payload> {
        self.call(path, payload, Channel::MutualTls).await
    }

    fn ensure_success(reply: &Payload) -> Result<()> {
        if reply.get(FIELD_RETURN_CODE) == Some(RESULT_SUCCESS) {
            return Ok(());
        }

        let message = reply.get(FIELD_RETURN_MSG).unwrap_or_default();

        #[cfg(feature = "tracing")]
        tracing::warn!(
            return_code = reply.get(FIELD_RETURN_CODE).unwrap_or_default(),
            return_msg = message,
            "gateway reported failure"
        );

        Err(Error::gateway(message))
    }

    /// Checks an inbound payload (a reply or an asynchronous notification)
    /// against this client's credential.
    pub fn verify_reply(&self, reply: &Payload) -> Result<()> {
        verify_reply(reply, &self.credential)
    }

    #[must_use]
    pub fn sign(&self, payload: &Payload, sign_type: SignType) -> String {
        sign::sign(payload, sign_type, self.credential.api_key())
    }

    /// Parameters an app hands to the payment SDK to open a prepaid order.
    #[must_use]
    pub fn app_pay_params(&self, prepay_id: &str) -> Payload {
        let mut params = Payload::from_iter([
            ("appid", self.credential.appid()),
            ("partnerid", self.credential.mch_id()),
            ("prepayid", prepay_id),
            ("package", "Sign=WXPay"),
        ])
        .with("noncestr", nonce(NONCE_LEN))
        .with("timestamp", Utc::now().timestamp().to_string());

        let signature = self.sign(&params, SignType::Md5);
        params.insert(FIELD_SIGN, signature);
        params
    }

    /// Parameters a web page passes to the in-page payment bridge.
    ///
    /// The signature lives under `paySign`, not `sign`.
    #[must_use]
    pub fn js_pay_params(&self, prepay_id: &str) -> Payload {
        let mut params = Payload::from_iter([
            ("appId", self.credential.appid()),
            ("signType", SignType::Md5.as_str()),
        ])
        .with("nonceStr", nonce(NONCE_LEN))
        .with("package", format!("prepay_id={prepay_id}"))
        .with("timeStamp", Utc::now().timestamp().to_string());

        let signature = self.sign(&params, SignType::Md5);
        params.insert("paySign", signature);
        params
    }

    /// Fetches the RSA public key used to encrypt bank card details.
    ///
    /// Goes over the mutual-TLS connection, so an identity must be loaded.
    pub async fn rsa_public_key(&self) -> Result<String> {
        let payload = Payload::from_iter([
            (FIELD_MCH_ID, self.credential.mch_id()),
            (FIELD_SIGN_TYPE, SignType::Md5.as_str()),
        ])
        .with(FIELD_NONCE_STR, nonce(NONCE_LEN));

        let mut reply = self
            .call(RSA_PUBLIC_KEY_URL, payload, Channel::MutualTls)
            .await?;

        reply
            .remove("pub_key")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::validation("empty pub_key"))
    }

    /// Resolves `path` the same way [`Client::call`] does.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.config.endpoint(path)
    }
}
