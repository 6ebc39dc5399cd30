#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for courier
//!
//! A hyper-based client with:
//! - TLS via rustls (HTTPS only by default)
//! - Connection pooling and separate connect/request timeouts
//! - User-Agent injection and transparent response decompression
//! - Bounded redirect following
//! - Tag-based cancellation of in-flight requests
//! - Optional debug logging of every exchange, sensitive headers redacted
//!
//! Request pipelines talk to it through the [`Transport`] trait.
//!
//! # Example
//!
//! ```ignore
//! use courier_http::{HttpClient, OutgoingRequest, Transport};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .connect_timeout(Duration::from_secs(5))
//!     .timeout(Duration::from_secs(20))
//!     .debug_logging(true)
//!     .build()?;
//!
//! let request = OutgoingRequest::new(http::Method::GET, "https://example.com/api/status")
//!     .with_tag(Some("dashboard".to_owned()));
//! let body = client.submit(request).await?.bytes().await?;
//!
//! // Later, when the screen that issued it goes away:
//! client.cancel_tag("dashboard");
//! ```

mod builder;
mod cancel;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
pub mod security;
mod tls;
mod transport;

pub use builder::HttpClientBuilder;
pub use cancel::{CancelGuard, CancelRegistry};
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{LoggingLayer, LoggingService, UserAgentLayer, UserAgentService};
pub use request::RequestBuilder;
pub use response::{HttpResponse, LimitedBody, ResponseBody};
pub use transport::{OutgoingRequest, Transport};
