//! Signals, scopes and the values derived from them.

use crate::error::ProtocolError;
use crate::utils::{hash_to_field, poseidon_hash};
use crate::MAX_SIGNAL_BYTES;
use pasta_curves::pallas;

const EXTERNAL_NULLIFIER_TAG: &[u8] = b"external_nullifier";

/// Longest accepted scope string.
pub const MAX_SCOPE_LEN: usize = 64;

/// The message being broadcast.
///
/// Length is checked when the witness is built or a submission is decoded,
/// not at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signal(Vec<u8>);

impl Signal {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the signal fits in one field element.
    #[must_use]
    pub fn is_encodable(&self) -> bool {
        self.0.len() <= MAX_SIGNAL_BYTES
    }

    /// The signal as a zero-padded 32-byte word.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedWitness`] if it exceeds
    /// [`MAX_SIGNAL_BYTES`].
    pub fn to_bytes32(&self) -> Result<[u8; 32], ProtocolError> {
        if !self.is_encodable() {
            return Err(ProtocolError::MalformedWitness(format!(
                "signal is {} bytes, at most {MAX_SIGNAL_BYTES} fit in one field element",
                self.0.len()
            )));
        }
        let mut word = [0u8; 32];
        word[..self.0.len()].copy_from_slice(&self.0);
        Ok(word)
    }

    /// Public signal hash bound into the proof.
    ///
    /// The length byte precedes the padded word, so signals that differ only
    /// in trailing NUL bytes hash differently.
    ///
    /// # Errors
    /// Same as [`Signal::to_bytes32`].
    pub fn hash(&self) -> Result<pallas::Base, ProtocolError> {
        let word = self.to_bytes32()?;
        let len = [self.0.len() as u8];
        Ok(hash_to_field(&[len.as_slice(), word.as_slice()]))
    }
}

impl From<&str> for Signal {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

/// Scope in which each identity may signal once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalNullifier {
    scope: String,
    value: pallas::Base,
}

impl ExternalNullifier {
    /// Validates a scope string and derives its field value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidScope`] if the scope is empty, longer
    /// than [`MAX_SCOPE_LEN`], or contains non-printable / non-ASCII bytes.
    pub fn from_scope(scope: &str) -> Result<Self, ProtocolError> {
        if scope.is_empty() {
            return Err(ProtocolError::InvalidScope("scope must not be empty".into()));
        }
        if scope.len() > MAX_SCOPE_LEN {
            return Err(ProtocolError::InvalidScope(format!(
                "scope is {} characters, at most {MAX_SCOPE_LEN} allowed",
                scope.len()
            )));
        }
        if !scope.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(ProtocolError::InvalidScope(
                "scope must be printable ASCII".into(),
            ));
        }

        Ok(Self {
            scope: scope.to_string(),
            value: hash_to_field(&[EXTERNAL_NULLIFIER_TAG, scope.as_bytes()]),
        })
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn value(&self) -> pallas::Base {
        self.value
    }
}

/// `H(nullifier_secret, external_nullifier)`.
#[must_use]
pub fn nullifier_hash(
    nullifier_secret: pallas::Base,
    external_nullifier: pallas::Base,
) -> pallas::Base {
    poseidon_hash(nullifier_secret, external_nullifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn signal_length_boundary() {
        let fits = Signal::new(vec![b'a'; MAX_SIGNAL_BYTES]);
        assert!(fits.hash().is_ok());

        let too_long = Signal::new(vec![b'a'; MAX_SIGNAL_BYTES + 1]);
        assert!(matches!(
            too_long.hash(),
            Err(ProtocolError::MalformedWitness(_))
        ));
    }

    #[test]
    fn signal_hash_depends_on_content() {
        let a = Signal::from("Hello world").hash().unwrap();
        let b = Signal::from("Hello world!").hash().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn trailing_nul_bytes_change_the_hash() {
        let plain = Signal::from("a").hash().unwrap();
        let padded = Signal::new(b"a\0".to_vec()).hash().unwrap();
        assert_ne!(plain, padded);
        assert_ne!(
            Signal::new(Vec::new()).hash().unwrap(),
            Signal::new(vec![0]).hash().unwrap()
        );
    }

    #[test]
    fn scope_validation() {
        assert!(ExternalNullifier::from_scope("greeting-2024").is_ok());
        assert!(ExternalNullifier::from_scope("").is_err());
        assert!(ExternalNullifier::from_scope(&"x".repeat(MAX_SCOPE_LEN + 1)).is_err());
        assert!(ExternalNullifier::from_scope("tab\tscope").is_err());
        assert!(ExternalNullifier::from_scope("épique").is_err());
    }

    #[test]
    fn nullifier_is_deterministic_per_scope() {
        let id = Identity::from_secret("alice").unwrap();
        let s2024 = ExternalNullifier::from_scope("greeting-2024").unwrap();
        let s2025 = ExternalNullifier::from_scope("greeting-2025").unwrap();

        let n1 = nullifier_hash(id.nullifier_secret(), s2024.value());
        let n2 = nullifier_hash(id.nullifier_secret(), s2024.value());
        let n3 = nullifier_hash(id.nullifier_secret(), s2025.value());
        assert_eq!(n1, n2);
        assert_ne!(n1, n3);

        let other = Identity::from_secret("bob").unwrap();
        assert_ne!(n1, nullifier_hash(other.nullifier_secret(), s2024.value()));
    }
}
