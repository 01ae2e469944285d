//! Table access credentials.
//!
//! A credential lets a seated customer reach their table's tab without an
//! account. It is issued when a table becomes occupied and cleared when the
//! table is freed or reserved.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of characters in a token.
pub const TOKEN_LEN: usize = 6;

/// Smallest passcode value (six digits).
pub const PASSCODE_MIN: u32 = 100_000;

/// Largest passcode value (six digits).
pub const PASSCODE_MAX: u32 = 999_999;

/// Token and passcode pair granting access to an occupied table.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    token: String,
    passcode: u32,
}

impl Credential {
    /// Creates a credential from its parts.
    pub fn new(token: impl Into<String>, passcode: u32) -> Self {
        Self {
            token: token.into(),
            passcode,
        }
    }

    /// Returns the token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the passcode.
    pub fn passcode(&self) -> u32 {
        self.passcode
    }

    /// Returns true if both parts match exactly.
    pub fn matches(&self, token: &str, passcode: u32) -> bool {
        self.token == token && self.passcode == passcode
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token)
            .field("passcode", &"******")
            .finish()
    }
}

/// Source of fresh credentials.
///
/// Issuers are not responsible for uniqueness; the store rejects a token
/// already held by another table and the caller asks again.
pub trait CredentialIssuer: Send + Sync {
    /// Issues a new credential.
    fn issue(&self) -> Credential;
}

/// Issues credentials from a v4 UUID and a uniform six-digit passcode.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCredentialIssuer;

impl CredentialIssuer for RandomCredentialIssuer {
    fn issue(&self) -> Credential {
        let uuid = Uuid::new_v4().simple().to_string();
        let token = uuid[uuid.len() - TOKEN_LEN..].to_string();
        let passcode = rand::thread_rng().gen_range(PASSCODE_MIN..=PASSCODE_MAX);
        Credential { token, passcode }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_issued_credential_shape() {
        let issuer = RandomCredentialIssuer;
        for _ in 0..200 {
            let credential = issuer.issue();
            assert_eq!(credential.token().len(), TOKEN_LEN);
            assert!(credential.token().chars().all(|c| c.is_ascii_hexdigit()));
            assert!((PASSCODE_MIN..=PASSCODE_MAX).contains(&credential.passcode()));
        }
    }

    #[test]
    fn test_tokens_vary() {
        let issuer = RandomCredentialIssuer;
        let tokens: HashSet<_> = (0..50).map(|_| issuer.issue().token().to_string()).collect();
        assert!(tokens.len() > 40);
    }

    #[test]
    fn test_matches_requires_both_parts() {
        let credential = Credential::new("a1b2c3", 123_456);
        assert!(credential.matches("a1b2c3", 123_456));
        assert!(!credential.matches("a1b2c3", 123_457));
        assert!(!credential.matches("A1B2C3", 123_456));
    }

    #[test]
    fn test_debug_hides_passcode() {
        let credential = Credential::new("a1b2c3", 123_456);
        let debug = format!("{credential:?}");
        assert!(debug.contains("a1b2c3"));
        assert!(!debug.contains("123456"));
    }
}
