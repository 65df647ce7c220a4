//! Client SDK for a merchant payment gateway's XML API.
//!
//! Every outbound payload is signed with the merchant API key, sent over
//! either a plain or a mutual-TLS connection, and every reply is checked
//! for a matching signature and merchant identity before it is returned.
//!
//! ```no_run
//! use mch_client_sdk::mch::{Client, Credential, Payload};
//!
//! # async fn run() -> mch_client_sdk::Result<()> {
//! let client = Client::new(Credential::new("wx2421b1c4370ec43b", "10000100", "api-key"))?;
//! client.load_cert_from_p12_file("apiclient_cert.p12")?;
//!
//! let refund = Payload::from_iter([
//!     ("appid", "wx2421b1c4370ec43b"),
//!     ("mch_id", "10000100"),
//!     ("out_trade_no", "1217752501201407033233368018"),
//! ]);
//! let reply = client.post_tls("secapi/pay/refund", refund).await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mch;
pub mod transport;
pub mod xml;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Production API host.
pub const DEFAULT_HOST: &str = "https://api.mch.weixin.qq.com/";

/// Risk-control endpoint serving the RSA key used for bank-card transfers.
pub const RSA_PUBLIC_KEY_URL: &str = "https://fraud.mch.weixin.qq.com/risk/getpublickey";

/// `return_code` / `result_code` value signalling success.
pub const RESULT_SUCCESS: &str = "SUCCESS";
