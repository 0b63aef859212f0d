//! Assembly of prover inputs.
//!
//! The nullifier hash is computed here, before the prover runs, so the client
//! knows exactly which value the server will check.

use crate::error::ProtocolError;
use crate::identity::Identity;
use crate::merkle::{MerkleProof, Position};
use crate::signal::{nullifier_hash, ExternalNullifier, Signal};
use crate::utils::{field_to_hex, poseidon_hash};
use crate::TREE_DEPTH;
use pasta_curves::pallas;

/// Values the proof is checked against. Instance order is
/// `[root, nullifier_hash, signal_hash, external_nullifier]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    pub root: pallas::Base,
    pub nullifier_hash: pallas::Base,
    pub signal_hash: pallas::Base,
    pub external_nullifier: pallas::Base,
}

impl PublicInputs {
    pub const ROOT_ROW: usize = 0;
    pub const NULLIFIER_HASH_ROW: usize = 1;
    pub const SIGNAL_HASH_ROW: usize = 2;
    pub const EXTERNAL_NULLIFIER_ROW: usize = 3;

    /// Instance column layout expected by the circuit.
    #[must_use]
    pub fn to_instance(&self) -> Vec<pallas::Base> {
        vec![
            self.root,
            self.nullifier_hash,
            self.signal_hash,
            self.external_nullifier,
        ]
    }
}

impl std::fmt::Display for PublicInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "root={} nullifier_hash={} signal_hash={} external_nullifier={}",
            field_to_hex(self.root),
            field_to_hex(self.nullifier_hash),
            field_to_hex(self.signal_hash),
            field_to_hex(self.external_nullifier)
        )
    }
}

/// Private and public inputs for one signal.
///
/// Holds identity secrets, so it is neither `Debug` nor serializable.
#[derive(Clone)]
pub struct Witness {
    trapdoor: pallas::Base,
    nullifier_secret: pallas::Base,
    path: Vec<(pallas::Base, Position)>,
    public: PublicInputs,
}

impl Witness {
    /// Combines an identity, its inclusion proof, the signal and the scope.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedWitness`] if the proof depth is not
    /// [`TREE_DEPTH`], the signal does not fit a field element, the proof is
    /// for another commitment, or the path does not reach the proof's root.
    pub fn build(
        identity: &Identity,
        merkle_proof: &MerkleProof,
        signal: &Signal,
        external_nullifier: &ExternalNullifier,
    ) -> Result<Self, ProtocolError> {
        if merkle_proof.depth() != TREE_DEPTH {
            return Err(ProtocolError::MalformedWitness(format!(
                "merkle proof depth {} does not match circuit depth {TREE_DEPTH}",
                merkle_proof.depth()
            )));
        }
        if merkle_proof.leaf != identity.commitment() {
            return Err(ProtocolError::MalformedWitness(
                "merkle proof is for a different commitment".into(),
            ));
        }
        if !merkle_proof.verify() {
            return Err(ProtocolError::MalformedWitness(
                "merkle path does not recompute its root".into(),
            ));
        }

        let signal_hash = signal.hash()?;
        let public = PublicInputs {
            root: merkle_proof.root,
            nullifier_hash: nullifier_hash(identity.nullifier_secret(), external_nullifier.value()),
            signal_hash,
            external_nullifier: external_nullifier.value(),
        };

        Ok(Self {
            trapdoor: identity.trapdoor(),
            nullifier_secret: identity.nullifier_secret(),
            path: merkle_proof
                .path
                .iter()
                .map(|step| (step.sibling, step.position))
                .collect(),
            public,
        })
    }

    #[must_use]
    pub fn public_inputs(&self) -> &PublicInputs {
        &self.public
    }

    #[must_use]
    pub fn trapdoor(&self) -> pallas::Base {
        self.trapdoor
    }

    #[must_use]
    pub fn nullifier_secret(&self) -> pallas::Base {
        self.nullifier_secret
    }

    /// Sibling hashes and positions from leaf to root.
    #[must_use]
    pub fn path(&self) -> &[(pallas::Base, Position)] {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn with_public_inputs(mut self, public: PublicInputs) -> Self {
        self.public = public;
        self
    }

    /// Re-evaluates the statement natively.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedWitness`] naming the first relation
    /// that does not hold.
    pub fn check(&self) -> Result<(), ProtocolError> {
        if self.path.len() != TREE_DEPTH {
            return Err(ProtocolError::MalformedWitness(format!(
                "path has {} levels, circuit expects {TREE_DEPTH}",
                self.path.len()
            )));
        }

        let commitment = poseidon_hash(self.trapdoor, self.nullifier_secret);
        let root = self
            .path
            .iter()
            .fold(commitment, |node, (sibling, position)| match position {
                Position::Left => poseidon_hash(node, *sibling),
                Position::Right => poseidon_hash(*sibling, node),
            });
        if root != self.public.root {
            return Err(ProtocolError::MalformedWitness(
                "commitment is not included under the declared root".into(),
            ));
        }

        if nullifier_hash(self.nullifier_secret, self.public.external_nullifier)
            != self.public.nullifier_hash
        {
            return Err(ProtocolError::MalformedWitness(
                "nullifier hash does not match the identity and scope".into(),
            ));
        }

        Ok(())
    }
}
