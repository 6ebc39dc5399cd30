//! File and environment configuration for [`RestClient`](crate::RestClient).
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `COURIER_*` environment variables (`__` separates nested keys).
//!
//! ```yaml
//! auth_mode: oauth2
//! site: https://auth.example.com
//! client_id: mobile-app
//! client_secret: s3cr3t
//! scopes: [read, write]
//! request_timeout: 15s
//! headers:
//!   - name: X-App-Version
//!     value: "4.2"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use courier_auth::{
    ClientAuthMethod, DEFAULT_TOKEN_PATH, GrantType, OAuthClientConfig, SecretString,
};
use courier_http::{DEFAULT_USER_AGENT, HttpClientConfig, TransportSecurity};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::credential::{AuthMode, CredentialModel, HeaderMapping};
use crate::dispatcher::DEFAULT_PLATFORM;

/// Prefix of the environment variables read by [`RestClientConfig::load`].
pub const ENV_PREFIX: &str = "COURIER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Figment(#[source] Box<figment::Error>),

    #[error("invalid URL in '{field}': {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("'{0}' is required for the configured auth mode")]
    Missing(&'static str),
}

/// Grant requested in `OAuth2` mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    #[default]
    ClientCredentials,
    /// Uses `username` and `password`.
    Password,
}

/// A default header sent with every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// Client settings as read from configuration.
///
/// `Debug` redacts `client_secret`, `password` and `basic_token`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestClientConfig {
    pub auth_mode: AuthMode,

    /// Pre-encoded Basic secret, sent verbatim after `Basic `.
    pub basic_token: Option<String>,

    /// Authorization server base URL; joined with `token_path`.
    pub site: Option<String>,
    /// Full token endpoint URL, instead of `site`.
    pub token_endpoint: Option<String>,
    pub token_path: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: GrantKind,
    pub client_auth: ClientAuthMethod,
    pub scopes: Vec<String>,

    /// Resource owner for the password grant, or Basic user when no
    /// `basic_token` is set.
    pub username: Option<String>,
    pub password: Option<String>,

    /// Default headers, in emission order.
    pub headers: Vec<HeaderEntry>,

    /// Value of the `os` header.
    pub platform: String,

    #[serde(with = "humantime_duration")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    pub user_agent: Option<String>,
    pub debug_logging: bool,

    /// Permit plain `http://` URLs. Meant for local mock servers.
    pub allow_insecure_http: bool,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        let http = HttpClientConfig::default();
        Self {
            auth_mode: AuthMode::None,
            basic_token: None,
            site: None,
            token_endpoint: None,
            token_path: DEFAULT_TOKEN_PATH.to_owned(),
            client_id: String::new(),
            client_secret: String::new(),
            grant_type: GrantKind::ClientCredentials,
            client_auth: ClientAuthMethod::Basic,
            scopes: Vec::new(),
            username: None,
            password: None,
            headers: Vec::new(),
            platform: DEFAULT_PLATFORM.to_owned(),
            connect_timeout: http.connect_timeout,
            request_timeout: http.request_timeout,
            user_agent: None,
            debug_logging: false,
            allow_insecure_http: false,
        }
    }
}

impl fmt::Debug for RestClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClientConfig")
            .field("auth_mode", &self.auth_mode)
            .field("basic_token", &self.basic_token.as_ref().map(|_| "[REDACTED]"))
            .field("site", &self.site)
            .field("token_endpoint", &self.token_endpoint)
            .field("token_path", &self.token_path)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("grant_type", &self.grant_type)
            .field("client_auth", &self.client_auth)
            .field("scopes", &self.scopes)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("headers", &self.headers)
            .field("platform", &self.platform)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("debug_logging", &self.debug_logging)
            .field("allow_insecure_http", &self.allow_insecure_http)
            .finish()
    }
}

impl RestClientConfig {
    /// Load defaults, then `path` (if given), then `COURIER_*` variables.
    ///
    /// # Errors
    /// Returns `ConfigError` if `path` does not exist or a value has the
    /// wrong shape.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract from a caller-assembled figment.
    ///
    /// # Errors
    /// Returns `ConfigError::Figment` if extraction fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    /// Transport settings for the underlying HTTP client.
    #[must_use]
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
            transport: if self.allow_insecure_http {
                TransportSecurity::AllowInsecureHttp
            } else {
                TransportSecurity::TlsOnly
            },
            debug_logging: self.debug_logging,
            ..HttpClientConfig::default()
        }
    }

    /// The default header mapping.
    #[must_use]
    pub fn header_mapping(&self) -> HeaderMapping {
        self.headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect()
    }

    /// The credential template for the configured mode.
    ///
    /// # Errors
    /// Returns `ConfigError` if a value required by the mode is missing or
    /// a URL does not parse.
    pub fn credentials(&self) -> Result<CredentialModel, ConfigError> {
        let model = match self.auth_mode {
            AuthMode::None => CredentialModel::none(),
            AuthMode::Basic => self.basic_credentials()?,
            AuthMode::OAuth2 => CredentialModel::oauth2(self.oauth2_config()?),
        };
        Ok(model.with_headers(self.header_mapping()))
    }

    fn basic_credentials(&self) -> Result<CredentialModel, ConfigError> {
        if let Some(token) = non_empty(self.basic_token.as_deref()) {
            return Ok(CredentialModel::basic(token));
        }
        let user = non_empty(self.username.as_deref()).ok_or(ConfigError::Missing("basic_token"))?;
        Ok(CredentialModel::basic_from_user(
            user,
            self.password.as_deref().unwrap_or_default(),
        ))
    }

    /// The `OAuth2` client configuration.
    ///
    /// Consistency (id, secret, endpoint) is checked when a token is
    /// requested, not here.
    ///
    /// # Errors
    /// Returns `ConfigError` if a URL does not parse or the password grant
    /// has no username.
    pub fn oauth2_config(&self) -> Result<OAuthClientConfig, ConfigError> {
        let grant_type = match self.grant_type {
            GrantKind::ClientCredentials => GrantType::ClientCredentials,
            GrantKind::Password => GrantType::Password {
                username: non_empty(self.username.as_deref())
                    .ok_or(ConfigError::Missing("username"))?
                    .to_owned(),
                password: SecretString::new(self.password.clone().unwrap_or_default()),
            },
        };
        Ok(OAuthClientConfig {
            token_endpoint: parse_url("token_endpoint", self.token_endpoint.as_deref())?,
            site: parse_url("site", self.site.as_deref())?,
            token_path: self.token_path.clone(),
            client_id: self.client_id.clone(),
            client_secret: SecretString::new(self.client_secret.clone()),
            grant_type,
            scopes: self.scopes.clone(),
            auth_method: self.client_auth,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_url(field: &'static str, value: Option<&str>) -> Result<Option<Url>, ConfigError> {
    non_empty(value)
        .map(|raw| Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { field, source }))
        .transpose()
}

/// `Duration` as a humantime string (`30s`, `1m 30s`).
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_match_transport_defaults() {
        let config = RestClientConfig::default();
        assert_eq!(config.auth_mode, AuthMode::None);
        assert_eq!(config.connect_timeout, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.platform, "rust");
        assert_eq!(config.http_config().transport, TransportSecurity::TlsOnly);
    }

    #[test]
    fn loads_oauth2_settings_from_yaml() {
        let file = write_yaml(
            "auth_mode: oauth2\n\
             site: https://auth.example.com\n\
             client_id: app\n\
             client_secret: s3cr3t\n\
             client_auth: form\n\
             scopes: [read, write]\n\
             request_timeout: 5s\n\
             headers:\n  - name: X-App\n    value: demo\n",
        );

        let config = RestClientConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.auth_mode, AuthMode::OAuth2);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(60));

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.mode(), AuthMode::OAuth2);
        assert_eq!(credentials.headers().get("X-App"), Some("demo"));

        let oauth = credentials.oauth2_config().unwrap();
        assert_eq!(oauth.client_id, "app");
        assert_eq!(oauth.auth_method, ClientAuthMethod::Form);
        assert_eq!(oauth.scopes, ["read", "write"]);
        assert_eq!(
            oauth.resolve_token_endpoint().unwrap().as_str(),
            "https://auth.example.com/oauth/token"
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let err = RestClientConfig::load(Some(Path::new("/nonexistent/courier.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_yaml("auth_mod: basic\n");
        let err = RestClientConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let file = write_yaml("connect_timeout: soon\n");
        assert!(RestClientConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn basic_mode_from_token_or_user() {
        let config = RestClientConfig {
            auth_mode: AuthMode::Basic,
            basic_token: Some("dXNlcjpwYXNz".into()),
            ..RestClientConfig::default()
        };
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.basic_secret().unwrap().expose(), "dXNlcjpwYXNz");

        let config = RestClientConfig {
            auth_mode: AuthMode::Basic,
            username: Some("user".into()),
            password: Some("pass".into()),
            ..RestClientConfig::default()
        };
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.basic_secret().unwrap().expose(), "dXNlcjpwYXNz");

        let config = RestClientConfig {
            auth_mode: AuthMode::Basic,
            ..RestClientConfig::default()
        };
        assert!(matches!(
            config.credentials(),
            Err(ConfigError::Missing("basic_token"))
        ));
    }

    #[test]
    fn password_grant_needs_username() {
        let config = RestClientConfig {
            auth_mode: AuthMode::OAuth2,
            grant_type: GrantKind::Password,
            site: Some("https://auth.example.com".into()),
            ..RestClientConfig::default()
        };
        assert!(matches!(
            config.oauth2_config(),
            Err(ConfigError::Missing("username"))
        ));
    }

    #[test]
    fn bad_url_names_the_field() {
        let config = RestClientConfig {
            token_endpoint: Some("not a url".into()),
            ..RestClientConfig::default()
        };
        assert!(matches!(
            config.oauth2_config(),
            Err(ConfigError::InvalidUrl {
                field: "token_endpoint",
                ..
            })
        ));
    }

    #[test]
    fn http_config_carries_overrides() {
        let config = RestClientConfig {
            connect_timeout: Duration::from_secs(3),
            user_agent: Some("app/1.0".into()),
            allow_insecure_http: true,
            debug_logging: true,
            ..RestClientConfig::default()
        };
        let http = config.http_config();
        assert_eq!(http.connect_timeout, Duration::from_secs(3));
        assert_eq!(http.user_agent, "app/1.0");
        assert_eq!(http.transport, TransportSecurity::AllowInsecureHttp);
        assert!(http.debug_logging);
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = RestClientConfig {
            client_secret: "top-secret".into(),
            password: Some("hunter2".into()),
            ..RestClientConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("hunter2"));
    }
}
