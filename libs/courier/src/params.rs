use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("JSON body encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("form body encoding failed: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
}

/// Body of a dispatched request.
///
/// The body never sets `Content-Type`; that header comes from the
/// response strategy of the call.
#[derive(Debug, Clone, Default)]
pub enum RequestParams {
    #[default]
    Empty,
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
    /// URL-encoded `key=value` pairs, in order.
    Form(Vec<(String, String)>),
}

impl RequestParams {
    /// # Errors
    /// Returns `ParamsError::Json` if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ParamsError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn form<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Encode the body.
    ///
    /// # Errors
    /// Returns `ParamsError` if the JSON or form encoding fails.
    pub fn to_body(&self) -> Result<Bytes, ParamsError> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Text(text) => Ok(Bytes::from(text.clone())),
            Self::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Self::Form(fields) => Ok(Bytes::from(serde_urlencoded::to_string(fields)?)),
        }
    }
}
