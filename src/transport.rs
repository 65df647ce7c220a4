//! HTTP seam between the signing layer and the network.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client as ReqwestClient, ClientBuilder, Identity};
use url::Url;

use crate::Result;
use crate::error::{CertificateFailure, Error};
use crate::mch::{ClientIdentity, Config};

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Posts a serialized XML body and returns the reply body.
///
/// Retries, if any, belong to implementations; the client never retries.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn post(&self, url: Url, body: String) -> Result<String>;
}

/// [`Transport`] over `reqwest`, optionally presenting a client certificate.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Self::builder(config).build()?;

        Ok(Self { client })
    }

    /// Builds a transport that authenticates with `identity` during the TLS
    /// handshake.
    pub fn with_identity(config: &Config, identity: &ClientIdentity) -> Result<Self> {
        let identity = Identity::from_pem(identity.pem()).map_err(|e| {
            Error::certificate(
                CertificateFailure::Format,
                format!("TLS stack rejected client identity: {e}"),
            )
        })?;
        let client = Self::builder(config).identity(identity).build()?;

        Ok(Self { client })
    }

    /// Wraps an already configured `reqwest` client.
    #[must_use]
    pub fn from_client(client: ReqwestClient) -> Self {
        Self { client }
    }

    fn builder(config: &Config) -> ClientBuilder {
        let builder = ReqwestClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout);

        match &config.user_agent {
            Some(user_agent) => builder.user_agent(user_agent.as_str()),
            None => builder,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: Url, body: String) -> Result<String> {
        let path = url.path().to_owned();
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE))
            .body(body)
            .send()
            .await?;

        let status_code = response.status();
        if !status_code.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "[Unable to read response body]".to_owned());
            return Err(Error::status(status_code, path, message));
        }

        Ok(response.text().await?)
    }
}
