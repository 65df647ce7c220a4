use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::error::Error;
use crate::{DEFAULT_HOST, Result};

/// Connection settings shared by both of a client's transports.
#[non_exhaustive]
#[derive(Clone, Debug, Builder)]
pub struct Config {
    /// Base URL that relative call paths are joined onto.
    #[builder(default = default_host())]
    pub host: Url,
    /// Whole-request timeout, including reading the reply body.
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,
    #[builder(default = Duration::from_secs(10))]
    pub connect_timeout: Duration,
    #[builder(into)]
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.cannot_be_a_base() {
            return Err(Error::validation(format!(
                "host `{}` cannot be used as a base URL",
                self.host
            )));
        }
        if !matches!(self.host.scheme(), "https" | "http") {
            return Err(Error::validation(format!(
                "host `{}` must use http or https",
                self.host
            )));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(Error::validation("timeouts must be non-zero"));
        }
        Ok(())
    }

    /// Resolves `path` against the host; absolute URLs are used as-is.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.host.join(path)?)
    }
}

#[expect(clippy::expect_used, reason = "DEFAULT_HOST is a constant, well-formed URL")]
fn default_host() -> Url {
    Url::parse(DEFAULT_HOST).expect("default host is a valid URL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RSA_PUBLIC_KEY_URL;
    use crate::error::Kind;

    #[test]
    fn defaults_point_at_production_host() {
        let config = Config::default();

        assert_eq!(config.host.as_str(), DEFAULT_HOST);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn relative_paths_join_host() {
        let config = Config::default();

        assert_eq!(
            config.endpoint("pay/unifiedorder").unwrap().as_str(),
            "https://api.mch.weixin.qq.com/pay/unifiedorder"
        );
    }

    #[test]
    fn absolute_urls_replace_host() {
        let config = Config::default();

        assert_eq!(
            config.endpoint(RSA_PUBLIC_KEY_URL).unwrap().as_str(),
            RSA_PUBLIC_KEY_URL
        );
    }

    #[test]
    fn rejects_non_http_host() {
        let config = Config::builder()
            .host(Url::parse("ftp://example.com/").unwrap())
            .build();

        assert_eq!(config.validate().unwrap_err().kind(), Kind::Validation);
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = Config::builder().timeout(Duration::ZERO).build();

        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_accepts_user_agent() {
        let config = Config::builder().user_agent("merchant-backend/1.0").build();

        assert_eq!(config.user_agent.as_deref(), Some("merchant-backend/1.0"));
    }
}
