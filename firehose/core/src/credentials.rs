//! Basic-auth credentials for the streaming endpoints.

use std::fmt;

use base64::prelude::*;

/// Username/password pair used for every connection a client opens
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials. Nothing is validated here; empty values are
    /// rejected when a connection is attempted.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Both username and password are non-empty
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// `base64(username:password)`, the token of an `Authorization: Basic` header
    #[must_use]
    pub fn encoded(&self) -> String {
        BASE64_STANDARD.encode(format!("{}:{}", self.username, self.password))
    }

    /// Full `Authorization` header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", self.encoded())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
