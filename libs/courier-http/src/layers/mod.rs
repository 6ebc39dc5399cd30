//! Tower layers applied by [`HttpClientBuilder`](crate::HttpClientBuilder).

mod logging;
mod user_agent;

pub use logging::{LoggingLayer, LoggingService};
pub use user_agent::{UserAgentLayer, UserAgentService};
