//! EdgeGrid EG1-HMAC-SHA256 signer and client
//!
//! [`RequestSigner`] signs a request with a [`Credential`] and
//! [`Client`] wraps it into a pipeline of named stages around a transport.
//!
//! ```no_run
//! use edgegrid_eg1::{Client, RequestOptions};
//!
//! # async fn example() -> edgegrid_core::Result<()> {
//! let client = Client::from_edgerc(Some("papi"), None).await?;
//! let resp = client
//!     .get("/papi/v1/contracts", RequestOptions::new())
//!     .await?;
//! println!("{}", resp.status());
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::*;

mod sign_request;
pub use sign_request::{
    auth_header_prefix, canonicalize, sign, signing_key, CanonicalRequest, RequestSigner,
    SigningOverrides, Timestamp,
};

mod client;
pub use client::{
    Authentication, Client, ClientBuilder, DebugEcho, Log, MessageFormatter, RequestOptions,
    Sink, VerboseEcho,
};

mod constants;
