//! Merchant API: signing, reply verification and the two-connection client.
//!
//! - [`sign`] turns a [`Payload`] into its canonical string and signature
//! - [`verify_reply`] checks inbound signatures and merchant identity
//! - [`ClientIdentity`] loads the client certificate for mutual TLS
//! - [`Client`] ties the above to a plain and a mutual-TLS [`Transport`]
//!
//! [`Transport`]: crate::transport::Transport

mod cert;
mod client;
mod config;
pub mod sign;
mod types;
mod verify;

pub use cert::ClientIdentity;
pub use client::Client;
pub use config::Config;
pub use types::{
    Channel, Credential, FIELD_APPID, FIELD_MCH_ID, FIELD_NONCE_STR, FIELD_RETURN_CODE,
    FIELD_RETURN_MSG, FIELD_SIGN, FIELD_SIGN_TYPE, Payload, SignType, nonce,
};
pub use verify::verify_reply;
