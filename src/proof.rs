//! The prover/verifier boundary.
//!
//! Callers only see [`ProofSystem`]: a witness goes in, an opaque proof with
//! its declared public inputs comes out, and the verifier checks the pair.
//! [`crate::circuit::Halo2ProofSystem`] is the real backend;
//! [`MockProofSystem`] checks the statement natively and is used in tests.

use crate::error::ProtocolError;
use crate::utils::field_to_bytes;
use crate::witness::{PublicInputs, Witness};
use log::{debug, info};
use sha3::{Digest, Sha3_256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A proof together with the public inputs it claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub public_inputs: PublicInputs,
    pub bytes: Vec<u8>,
}

/// A prover and verifier for the membership statement.
pub trait ProofSystem: Send + Sync {
    /// Proves knowledge of an identity included under `witness`'s root.
    ///
    /// # Errors
    /// Returns [`ProtocolError::ProverFailure`] if the backend fails or the
    /// witness does not satisfy the statement. Implementations never return
    /// a proof for an unsatisfied witness.
    fn prove(&self, witness: &Witness) -> Result<Proof, ProtocolError>;

    /// Checks `proof.bytes` against `proof.public_inputs`.
    fn verify(&self, proof: &Proof) -> bool;
}

/// Runs the prover on the current thread.
///
/// # Errors
/// Propagates [`ProofSystem::prove`] failures.
pub fn generate_proof<P: ProofSystem + ?Sized>(
    system: &P,
    witness: &Witness,
) -> Result<Proof, ProtocolError> {
    debug!("Generating proof for {}", witness.public_inputs());
    let proof = system.prove(witness)?;
    info!("Proof generated, size: {} bytes", proof.bytes.len());
    Ok(proof)
}

/// Runs the prover on the blocking pool and gives up when `cancel` fires.
///
/// The witness moves into the prover task and is dropped with it; nothing is
/// written anywhere, so an abandoned flow leaves no state behind.
///
/// # Errors
/// Returns [`ProtocolError::Cancelled`] if the token is cancelled first, or
/// [`ProtocolError::ProverFailure`] if the prover fails or panics.
pub async fn generate_proof_cancellable<P>(
    system: Arc<P>,
    witness: Witness,
    cancel: CancellationToken,
) -> Result<Proof, ProtocolError>
where
    P: ProofSystem + ?Sized + 'static,
{
    if cancel.is_cancelled() {
        return Err(ProtocolError::Cancelled);
    }

    let task = tokio::task::spawn_blocking(move || generate_proof(&*system, &witness));

    tokio::select! {
        () = cancel.cancelled() => {
            info!("Proof generation cancelled");
            Err(ProtocolError::Cancelled)
        }
        joined = task => joined
            .map_err(|e| ProtocolError::ProverFailure(format!("prover task failed: {e}")))?,
    }
}

const MOCK_PROOF_TAG: &[u8] = b"mock-signal-proof";

/// Native stand-in for a proving backend.
///
/// `prove` evaluates the statement directly and emits a SHA3 binding of the
/// public inputs; `verify` recomputes the binding. It accepts every valid
/// witness and no tampered public input, but offers no zero knowledge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProofSystem;

impl MockProofSystem {
    fn binding(public: &PublicInputs) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        hasher.update(MOCK_PROOF_TAG);
        for value in public.to_instance() {
            hasher.update(field_to_bytes(value));
        }
        hasher.finalize().to_vec()
    }
}

impl ProofSystem for MockProofSystem {
    fn prove(&self, witness: &Witness) -> Result<Proof, ProtocolError> {
        witness
            .check()
            .map_err(|e| ProtocolError::ProverFailure(e.to_string()))?;

        let public_inputs = *witness.public_inputs();
        Ok(Proof {
            bytes: Self::binding(&public_inputs),
            public_inputs,
        })
    }

    fn verify(&self, proof: &Proof) -> bool {
        proof.bytes == Self::binding(&proof.public_inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::merkle::MembershipTree;
    use crate::signal::{ExternalNullifier, Signal};
    use pasta_curves::pallas;

    fn witness() -> Witness {
        let identity = Identity::from_secret("prover-test").unwrap();
        let tree = MembershipTree::build(vec![
            pallas::Base::from(1),
            identity.commitment(),
        ])
        .unwrap();
        let proof = tree.prove_membership(identity.commitment()).unwrap();
        let scope = ExternalNullifier::from_scope("unit").unwrap();
        Witness::build(&identity, &proof, &Signal::from("hi"), &scope).unwrap()
    }

    #[test]
    fn mock_proves_and_verifies() {
        let proof = generate_proof(&MockProofSystem, &witness()).unwrap();
        assert!(MockProofSystem.verify(&proof));
    }

    #[test]
    fn mock_rejects_other_root() {
        let mut proof = generate_proof(&MockProofSystem, &witness()).unwrap();
        proof.public_inputs.root = pallas::Base::from(42);
        assert!(!MockProofSystem.verify(&proof));
    }

    #[test]
    fn mock_refuses_unsatisfied_witness() {
        let w = witness();
        let mut public = *w.public_inputs();
        public.nullifier_hash = pallas::Base::from(5);
        let forged = w.with_public_inputs(public);

        assert!(matches!(
            MockProofSystem.prove(&forged),
            Err(ProtocolError::ProverFailure(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_token_stops_generation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result =
            generate_proof_cancellable(Arc::new(MockProofSystem), witness(), cancel).await;
        assert_eq!(result, Err(ProtocolError::Cancelled));
    }

    #[tokio::test]
    async fn uncancelled_generation_completes() {
        let proof = generate_proof_cancellable(
            Arc::new(MockProofSystem),
            witness(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(MockProofSystem.verify(&proof));
    }
}
