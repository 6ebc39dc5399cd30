#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Authenticated request dispatch with callbacks on a caller-owned context.
//!
//! A [`Dispatcher`] turns a [`Call`] and a [`CredentialModel`] into an HTTP
//! request, submits it over a [`Transport`](courier_http::Transport), decodes
//! the answer with the call's [`ResponseStrategy`] and reports the outcome to
//! a [`ResultCallback`] exactly once. Callbacks never run on the worker that
//! did the I/O; they are queued on a [`CallbackContext`] and run when its
//! owner drains it.
//!
//! Credentials come in three modes ([`AuthMode`]): none, Basic, and `OAuth2`.
//! In `OAuth2` mode a token exchange runs before each call and the token is
//! sent as `Authorization: Bearer <token>`.
//!
//! [`RestClient`] bundles a dispatcher with a credential template loaded from
//! [`RestClientConfig`].
//!
//! ```ignore
//! use courier::{CallbackContext, Outcome, RestClient};
//!
//! let mut context = CallbackContext::new();
//! let client = RestClient::builder().context(context.handle()).build()?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Outcome>();
//! let handle = client.get("https://api.example.com/status").send(tx);
//! context.run_until(handle.join()).await;
//! ```

mod call;
mod callback;
mod client;
mod config;
mod context;
mod credential;
mod dispatcher;
mod error;
mod params;
mod strategy;

pub use call::Call;
pub use callback::{ErrorKind, Outcome, ResultCallback};
pub use client::{CallBuilder, RestClient, RestClientBuilder};
pub use config::{ConfigError, ENV_PREFIX, GrantKind, HeaderEntry, RestClientConfig};
pub use context::{CallbackContext, ContextHandle};
pub use credential::{AuthMode, CredentialModel, HeaderMapping};
pub use dispatcher::{BuiltRequest, DEFAULT_PLATFORM, DispatchHandle, Dispatcher};
pub use error::{BuildError, DispatchError, HeaderFault};
pub use params::{ParamsError, RequestParams};
pub use strategy::{Body, DecodeError, Negotiation, Response, ResponseStrategy};
