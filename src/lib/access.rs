//! Shared-password gate in front of contract generation.
//!
//! The pipeline entry points take an [`Authorized`] token. The only way to
//! obtain one is [`PasswordGate::check`], so nothing can be generated without
//! passing the gate first.

use crate::ContractError;
use log::{debug, warn};
use subtle::ConstantTimeEq;

/// Proof that the password gate was passed.
#[derive(Debug)]
pub struct Authorized {
    _private: (),
}

#[derive(Clone)]
pub struct PasswordGate {
    expected: String,
}

impl std::fmt::Debug for PasswordGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGate")
            .field("expected", &"<redacted>")
            .finish()
    }
}

impl PasswordGate {
    /// Creates a gate for the given shared password.
    ///
    /// # Errors
    /// An empty password is a configuration error; the gate never opens for
    /// everyone.
    pub fn new(expected: impl Into<String>) -> Result<Self, ContractError> {
        let expected = expected.into();
        if expected.is_empty() {
            return Err(ContractError::ConfigError {
                message: "No access password is configured".to_string(),
                suggestion: "Set [access] password in the configuration file".to_string(),
            });
        }
        Ok(PasswordGate { expected })
    }

    /// Compares `candidate` with the configured password.
    ///
    /// # Errors
    /// Returns [`ContractError::AccessDenied`] on mismatch.
    pub fn check(&self, candidate: &str) -> Result<Authorized, ContractError> {
        let matches: bool = self.expected.as_bytes().ct_eq(candidate.as_bytes()).into();
        if matches {
            debug!("Password gate passed");
            Ok(Authorized { _private: () })
        } else {
            warn!("Password gate rejected a candidate");
            Err(ContractError::AccessDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_password_passes() {
        let gate = PasswordGate::new("geheim").unwrap();
        assert!(gate.check("geheim").is_ok());
    }

    #[test]
    fn test_wrong_password_is_denied() {
        let gate = PasswordGate::new("geheim").unwrap();
        for candidate in ["", "geheim ", "Geheim", "gehei", "geheim2"] {
            assert!(matches!(
                gate.check(candidate),
                Err(ContractError::AccessDenied)
            ));
        }
    }

    #[test]
    fn test_empty_password_is_config_error() {
        assert!(matches!(
            PasswordGate::new(""),
            Err(ContractError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_debug_does_not_leak_password() {
        let gate = PasswordGate::new("geheim").unwrap();
        assert!(!format!("{:?}", gate).contains("geheim"));
    }

    #[test]
    fn test_prefix_and_extension_are_denied() {
        let gate = PasswordGate::new("abc").unwrap();
        assert!(gate.check("abc").is_ok());
        assert!(gate.check("ab").is_err());
        assert!(gate.check("abcd").is_err());
        assert!(gate.check("abd").is_err());
    }
}
