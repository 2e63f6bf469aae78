use crate::error::ShortenerError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Number of digest bytes kept in a short code.
pub const CODE_BYTES: usize = 5;

/// Length of a short code once hex-encoded.
pub const CODE_LENGTH: usize = CODE_BYTES * 2;

/// A short code identifying a stored URL.
///
/// Short codes are exactly 10 lowercase hex characters. They are produced
/// by [`KeyDeriver`](crate::key::KeyDeriver) and are not globally unique:
/// two different URLs may derive the same code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortCode(String);

impl ShortCode {
    /// Parses a caller-supplied short code.
    ///
    /// Uppercase hex digits are accepted and normalised to lowercase.
    pub fn parse(code: impl Into<String>) -> std::result::Result<Self, ShortenerError> {
        let mut code = code.into();
        Self::validate(&code)?;
        code.make_ascii_lowercase();
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> std::result::Result<(), ShortenerError> {
        if code.len() != CODE_LENGTH {
            return Err(ShortenerError::InvalidShortCode(format!(
                "length must be {}, got {}",
                CODE_LENGTH,
                code.len()
            )));
        }

        if !code.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ShortenerError::InvalidShortCode(format!(
                "must contain only hex digits: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShortCode {
    type Error = ShortenerError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ShortCode> for String {
    fn from(value: ShortCode) -> Self {
        value.0
    }
}
