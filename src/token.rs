//! OAuth token handling for the Yandex Music account.
//!
//! The token is a bearer secret: it grants full access to the account it
//! belongs to. It is therefore kept out of all log and debug output; only
//! its presence or absence may be reported.

use std::{fs, str::FromStr};

use veil::Redact;

use crate::error::{Error, Result};

/// OAuth bearer token for a Yandex Music account.
///
/// Debug output is redacted. There is intentionally no `Display`
/// implementation: the raw value is only reachable through
/// [`Token::as_str`] and [`Token::authorization`].
#[derive(Clone, Redact, PartialEq, Eq, Hash)]
pub struct Token {
    #[redact]
    token: String,
}

impl Token {
    /// Shortest token value that is accepted.
    ///
    /// Yandex OAuth tokens are several dozen characters; anything shorter
    /// is certain to be a copy-paste accident.
    const MIN_LENGTH: usize = 10;

    /// Longest token value that is accepted.
    const MAX_LENGTH: usize = 256;

    /// Creates a token after validating its shape.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the value is outside the accepted length bounds or
    /// contains characters that cannot appear in an OAuth token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();

        let chars = token.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&chars) {
            return Err(Error::unauthenticated(format!(
                "token length invalid ({chars} characters)"
            )));
        }

        if !token.chars().all(|chr| chr.is_ascii_graphic()) {
            return Err(Error::unauthenticated(
                "token contains illegal characters".to_string(),
            ));
        }

        Ok(Self { token })
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Returns the value for the `Authorization` header.
    ///
    /// The sync service and the catalog API both expect the `OAuth` scheme,
    /// not `Bearer`.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("OAuth {}", self.token)
    }

    /// Loads the token from a TOML secrets file with a `token` key.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file cannot be read, is unreasonably large, is
    /// not valid TOML, or does not contain a valid `token` entry.
    pub fn from_file(path: &str) -> Result<Self> {
        // Prevent out-of-memory conditions: the secrets file should be tiny.
        let attributes = fs::metadata(path)?;
        if attributes.len() > 1024 {
            return Err(Error::invalid_argument(format!("{path} is too large")));
        }

        let contents = fs::read_to_string(path)?;
        let value = contents
            .parse::<toml::Value>()
            .map_err(|e| Error::invalid_argument(format!("{path} format is invalid: {e}")))?;

        match value.get("token").and_then(toml::Value::as_str) {
            Some(token) => Self::new(token),
            None => Err(Error::invalid_argument(format!(
                "{path} does not contain a token"
            ))),
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
