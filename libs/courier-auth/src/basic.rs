use base64::{Engine as _, engine::general_purpose};
use zeroize::Zeroizing;

use crate::secret::SecretString;

/// HTTP Basic credentials.
pub struct BasicCredentials;

impl BasicCredentials {
    /// `base64(user:password)`, the token that follows `Basic ` in an
    /// `Authorization` header.
    #[must_use]
    pub fn encode(user: &str, password: &str) -> SecretString {
        let joined = Zeroizing::new(format!("{user}:{password}"));
        SecretString::new(general_purpose::STANDARD.encode(joined.as_bytes()))
    }
}
