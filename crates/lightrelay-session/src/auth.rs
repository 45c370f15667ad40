//! Authentication hook for validating relay peers.
//!
//! A relay node only serves peers that know its shared secret. The check
//! itself lives behind the [`Authenticator`] trait so deployments can swap
//! the plain key comparison for something else (a key list, a rotating
//! secret) without touching the engine, and tests can plug in their own.

use std::fmt;
use std::str::FromStr;

use crate::SessionError;

/// Validates the key a peer presents in `AuthenticationResponse`.
///
/// Runs inline on the relay's event path, so implementations must not
/// block.
///
/// # Example
///
/// ```rust
/// use lightrelay_session::{Authenticator, SessionError};
///
/// /// Accepts any of a fixed set of keys.
/// struct KeyList(Vec<String>);
///
/// impl Authenticator for KeyList {
///     fn verify(&self, key: &str) -> Result<(), SessionError> {
///         if self.0.iter().any(|k| k == key) {
///             Ok(())
///         } else {
///             Err(SessionError::AuthFailed("unknown key".into()))
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns `Ok(())` if the key grants access.
    fn verify(&self, key: &str) -> Result<(), SessionError>;
}

/// Compares the presented key against one configured secret.
pub struct SharedKeyAuthenticator {
    key: String,
}

impl SharedKeyAuthenticator {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Authenticator for SharedKeyAuthenticator {
    fn verify(&self, key: &str) -> Result<(), SessionError> {
        if key == self.key {
            Ok(())
        } else {
            Err(SessionError::AuthFailed("key mismatch".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// AuthFailurePolicy
// ---------------------------------------------------------------------------

/// What the relay does with a peer that presents a wrong key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFailurePolicy {
    /// Close the connection.
    #[default]
    Disconnect,
    /// Leave the connection pending; the peer may try again.
    Ignore,
}

impl FromStr for AuthFailurePolicy {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disconnect" | "strict" => Ok(Self::Disconnect),
            "ignore" | "tolerant" => Ok(Self::Ignore),
            _ => Err(SessionError::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for AuthFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnect => f.write_str("disconnect"),
            Self::Ignore => f.write_str("ignore"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_key_verify_matching_key_accepts() {
        let auth = SharedKeyAuthenticator::new("Secret Auth Key");
        assert!(auth.verify("Secret Auth Key").is_ok());
    }

    #[test]
    fn test_shared_key_verify_is_exact_match() {
        let auth = SharedKeyAuthenticator::new("Secret");
        assert!(matches!(
            auth.verify("secret"),
            Err(SessionError::AuthFailed(_))
        ));
        assert!(auth.verify("Secret ").is_err());
        assert!(auth.verify("").is_err());
    }

    #[test]
    fn test_policy_parse_names() {
        assert_eq!(
            "Disconnect".parse::<AuthFailurePolicy>().unwrap(),
            AuthFailurePolicy::Disconnect
        );
        assert_eq!(
            "ignore".parse::<AuthFailurePolicy>().unwrap(),
            AuthFailurePolicy::Ignore
        );
        assert!("maybe".parse::<AuthFailurePolicy>().is_err());
    }
}
