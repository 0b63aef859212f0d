//! Deterministic identity derivation from a user-held secret.
//!
//! The secret is typically a wallet signature over a fixed message, so the
//! same wallet always regenerates the same identity without storing it.

use crate::error::ProtocolError;
use crate::utils::{bytes_to_field, field_to_hex, poseidon_hash};
use pasta_curves::pallas;
use sha3::{Digest, Sha3_256};
use std::fmt;

const TRAPDOOR_TAG: &[u8] = b"identity_trapdoor";
const NULLIFIER_TAG: &[u8] = b"identity_nullifier";

/// A member's private identity.
///
/// Only the [`commitment`](Identity::commitment) is ever published.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    trapdoor: pallas::Base,
    nullifier_secret: pallas::Base,
    commitment: pallas::Base,
}

fn derive_secret(seed: &[u8; 32], tag: &[u8]) -> pallas::Base {
    let mut hasher = Sha3_256::new();
    hasher.update(seed);
    hasher.update(tag);
    let digest: [u8; 32] = hasher.finalize().into();
    bytes_to_field(&digest)
}

impl Identity {
    /// Derives an identity from an external secret string.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidSecret`] when the secret is empty or
    /// whitespace only (e.g. the user declined to sign).
    pub fn from_secret(secret: &str) -> Result<Self, ProtocolError> {
        if secret.trim().is_empty() {
            return Err(ProtocolError::InvalidSecret(
                "secret must not be empty".to_string(),
            ));
        }

        let seed: [u8; 32] = Sha3_256::digest(secret.as_bytes()).into();
        let trapdoor = derive_secret(&seed, TRAPDOOR_TAG);
        let nullifier_secret = derive_secret(&seed, NULLIFIER_TAG);

        Ok(Self::from_parts(trapdoor, nullifier_secret))
    }

    /// Builds an identity from already-derived secrets.
    #[must_use]
    pub fn from_parts(trapdoor: pallas::Base, nullifier_secret: pallas::Base) -> Self {
        Self {
            trapdoor,
            nullifier_secret,
            commitment: poseidon_hash(trapdoor, nullifier_secret),
        }
    }

    #[must_use]
    pub fn trapdoor(&self) -> pallas::Base {
        self.trapdoor
    }

    #[must_use]
    pub fn nullifier_secret(&self) -> pallas::Base {
        self.nullifier_secret
    }

    /// Public commitment `H(trapdoor, nullifier_secret)`.
    #[must_use]
    pub fn commitment(&self) -> pallas::Base {
        self.commitment
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("trapdoor", &"<redacted>")
            .field("nullifier_secret", &"<redacted>")
            .field("commitment", &field_to_hex(self.commitment))
            .finish()
    }
}
