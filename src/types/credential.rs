//! Credential material crossing the authorization boundary
//!
//! Both types are opaque to the transfer executor. Their `Debug` output is
//! redacted so that neither can end up in a log line.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Credential presented by a caller, e.g. a 4-digit PIN
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a presented credential
    pub fn new(value: impl Into<String>) -> Self {
        Credential(SecretString::from(value.into()))
    }

    /// Access the raw credential. Only the authorization gate calls this.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Credential::new(value)
    }
}

/// Stored hash of an account's credential
#[derive(Clone, PartialEq, Eq)]
pub struct SecretHash(String);

impl SecretHash {
    /// Wrap an already computed hash string
    pub fn new(hash: impl Into<String>) -> Self {
        SecretHash(hash.into())
    }

    /// The hash in its stored (PHC string) form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHash([REDACTED])")
    }
}

/// Result of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// The credential matches the account's stored hash
    Authorized,
    /// The credential does not match, or the account is unknown
    Denied,
    /// Too many recent failed attempts for this account
    RateLimited,
}

impl Authorization {
    /// Whether the caller may proceed
    pub fn is_authorized(self) -> bool {
        matches!(self, Authorization::Authorized)
    }
}
