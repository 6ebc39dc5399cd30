#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! OAuth2 token acquisition for courier.
//!
//! [`OAuth2Client`] posts a form-encoded token request through any
//! [`courier_http::Transport`] and resolves once with an [`AccessToken`] or a
//! [`TokenError`]. Supported grants are `client_credentials` and `password`;
//! the client authenticates with HTTP Basic (default) or form fields.
//!
//! ```ignore
//! use courier_auth::{OAuth2Client, OAuthClientConfig, SecretString};
//!
//! let client = OAuth2Client::new(OAuthClientConfig {
//!     site: Some("https://auth.example.com".parse()?),
//!     client_id: "mobile".into(),
//!     client_secret: SecretString::new("s3cret"),
//!     ..Default::default()
//! })?;
//! let token = client.request_access_token(&http_client, &[], None).await?;
//! ```

mod basic;
mod client;
mod config;
mod error;
mod http_error;
mod secret;
mod types;

pub use basic::BasicCredentials;
pub use client::OAuth2Client;
pub use config::{DEFAULT_TOKEN_PATH, OAuthClientConfig};
pub use error::TokenError;
pub use http_error::format_http_error;
pub use secret::SecretString;
pub use types::{AccessToken, ClientAuthMethod, GrantType};
