//! Server-side acceptance of anonymous signals.
//!
//! A submission moves through scope check, root check, proof check and the
//! atomic replay check. Only the last stage mutates state, and only on
//! success; every earlier rejection leaves the registry untouched.

use crate::error::Rejection;
use crate::events::{SignalBus, SignalEvent};
use crate::merkle::MembershipTree;
use crate::proof::{Proof, ProofSystem};
use crate::registry::{NullifierRegistry, RootHistory};
use crate::signal::{ExternalNullifier, Signal};
use crate::utils::field_to_hex;
use crate::witness::PublicInputs;
use log::{debug, info, warn};
use pasta_curves::pallas;
use std::sync::Arc;

/// A decoded submission: the signal, its scope, and the proof's claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub signal: Signal,
    pub external_nullifier: ExternalNullifier,
    pub root: pallas::Base,
    pub nullifier_hash: pallas::Base,
    pub proof: Vec<u8>,
}

impl Submission {
    /// Packages a freshly generated proof for sending.
    #[must_use]
    pub fn from_proof(signal: Signal, external_nullifier: ExternalNullifier, proof: Proof) -> Self {
        Self {
            signal,
            external_nullifier,
            root: proof.public_inputs.root,
            nullifier_hash: proof.public_inputs.nullifier_hash,
            proof: proof.bytes,
        }
    }

    /// Public inputs rebuilt from the submitted values. The signal hash and
    /// external nullifier are recomputed, never taken from the client.
    fn public_inputs(&self) -> Result<PublicInputs, Rejection> {
        Ok(PublicInputs {
            root: self.root,
            nullifier_hash: self.nullifier_hash,
            signal_hash: self.signal.hash()?,
            external_nullifier: self.external_nullifier.value(),
        })
    }
}

/// Receipt for an accepted signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub scope: String,
    pub root: pallas::Base,
    pub nullifier_hash: pallas::Base,
}

pub struct SignalVerifier {
    proof_system: Arc<dyn ProofSystem>,
    roots: RootHistory,
    registry: Arc<dyn NullifierRegistry>,
    bus: Arc<SignalBus>,
    allowed_scopes: Vec<String>,
}

impl SignalVerifier {
    #[must_use]
    pub fn new(
        proof_system: Arc<dyn ProofSystem>,
        registry: Arc<dyn NullifierRegistry>,
        root_history_size: usize,
    ) -> Self {
        Self {
            proof_system,
            roots: RootHistory::new(root_history_size),
            registry,
            bus: Arc::new(SignalBus::new()),
            allowed_scopes: Vec::new(),
        }
    }

    /// Restricts accepted scopes. An empty list accepts any valid scope.
    #[must_use]
    pub fn with_allowed_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_bus(mut self, bus: Arc<SignalBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Accepts proofs against `root` from now on.
    pub fn publish_root(&self, root: pallas::Base) {
        info!("Publishing group root {}", field_to_hex(root));
        self.roots.publish(root);
    }

    pub fn publish_group(&self, tree: &MembershipTree) {
        info!("Publishing group snapshot of {} members", tree.len());
        self.publish_root(tree.root());
    }

    /// Roots currently accepted, newest first.
    #[must_use]
    pub fn accepted_roots(&self) -> Vec<pallas::Base> {
        self.roots.roots()
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<dyn NullifierRegistry> {
        &self.registry
    }

    /// Verifies a submission and records its nullifier.
    ///
    /// # Errors
    /// Returns the first [`Rejection`] encountered. A rejected submission
    /// never changes the registry.
    pub fn submit(&self, submission: &Submission) -> Result<Accepted, Rejection> {
        let result = self.process(submission);
        match &result {
            Ok(accepted) => info!(
                "Signal accepted in scope '{}' (nullifier {})",
                accepted.scope,
                field_to_hex(accepted.nullifier_hash)
            ),
            Err(rejection) => warn!(
                "Signal rejected in scope '{}': {}",
                submission.external_nullifier.scope(),
                rejection.code()
            ),
        }
        result
    }

    fn process(&self, submission: &Submission) -> Result<Accepted, Rejection> {
        let scope = submission.external_nullifier.scope();
        debug!("Received submission for scope '{scope}'");

        if !self.allowed_scopes.is_empty() && !self.allowed_scopes.iter().any(|s| s == scope) {
            return Err(Rejection::ScopeNotAllowed(scope.to_string()));
        }
        debug!("Scope check passed");

        let public_inputs = submission.public_inputs()?;

        if !self.roots.contains(&submission.root) {
            return Err(Rejection::StaleOrUnknownRoot);
        }
        debug!("Root check passed");

        let proof = Proof {
            public_inputs,
            bytes: submission.proof.clone(),
        };
        if !self.proof_system.verify(&proof) {
            return Err(Rejection::InvalidProof);
        }
        debug!("Proof check passed");

        if !self
            .registry
            .insert_if_absent(public_inputs.external_nullifier, public_inputs.nullifier_hash)?
        {
            return Err(Rejection::DuplicateNullifier);
        }
        debug!("Nullifier committed");

        self.bus.publish(&SignalEvent {
            signal: submission.signal.clone(),
            scope: scope.to_string(),
            nullifier_hash: submission.nullifier_hash,
            root: submission.root,
        });

        Ok(Accepted {
            scope: scope.to_string(),
            root: submission.root,
            nullifier_hash: submission.nullifier_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::proof::{generate_proof, MockProofSystem};
    use crate::registry::MemoryNullifierRegistry;
    use crate::witness::Witness;

    struct Fixture {
        identity: Identity,
        tree: MembershipTree,
        verifier: SignalVerifier,
    }

    fn fixture() -> Fixture {
        let identity = Identity::from_secret("verifier-member").unwrap();
        let tree = MembershipTree::build(vec![
            Identity::from_secret("other").unwrap().commitment(),
            identity.commitment(),
        ])
        .unwrap();
        let verifier = SignalVerifier::new(
            Arc::new(MockProofSystem),
            Arc::new(MemoryNullifierRegistry::new()),
            2,
        );
        verifier.publish_group(&tree);
        Fixture {
            identity,
            tree,
            verifier,
        }
    }

    fn submission(f: &Fixture, signal: &str, scope: &str) -> Submission {
        let path = f.tree.prove_membership(f.identity.commitment()).unwrap();
        let scope = ExternalNullifier::from_scope(scope).unwrap();
        let signal = Signal::from(signal);
        let witness = Witness::build(&f.identity, &path, &signal, &scope).unwrap();
        let proof = generate_proof(&MockProofSystem, &witness).unwrap();
        Submission::from_proof(signal, scope, proof)
    }

    #[test]
    fn accepts_then_rejects_replay() {
        let f = fixture();
        let s = submission(&f, "vote yes", "poll-1");

        let accepted = f.verifier.submit(&s).unwrap();
        assert_eq!(accepted.scope, "poll-1");
        assert_eq!(f.verifier.submit(&s), Err(Rejection::DuplicateNullifier));
        assert_eq!(f.verifier.registry().len(), 1);
    }

    #[test]
    fn trailing_nul_bytes_fail_proof_check() {
        let f = fixture();
        let mut s = submission(&f, "Hello world", "greeting-2024");
        s.signal = Signal::new(b"Hello world\0\0".to_vec());

        assert_eq!(f.verifier.submit(&s), Err(Rejection::InvalidProof));
        assert!(f.verifier.registry().is_empty());
    }

    #[test]
    fn shared_bus_receives_accepted_signals() {
        let f = fixture();
        let bus = Arc::new(SignalBus::new());
        let mut subscription = bus.subscribe();
        let verifier = SignalVerifier::new(
            Arc::new(MockProofSystem),
            Arc::new(MemoryNullifierRegistry::new()),
            2,
        )
        .with_bus(Arc::clone(&bus));
        verifier.publish_group(&f.tree);

        verifier.submit(&submission(&f, "hi", "shared")).unwrap();
        assert!(Arc::ptr_eq(verifier.bus(), &bus));
        let event = subscription.try_recv().expect("event on the shared bus");
        assert_eq!(event.scope, "shared");
    }

    #[test]
    fn tampered_signal_fails_proof_check() {
        let f = fixture();
        let mut s = submission(&f, "vote yes", "poll-1");
        s.signal = Signal::from("vote no");

        assert_eq!(f.verifier.submit(&s), Err(Rejection::InvalidProof));
        assert!(f.verifier.registry().is_empty());
    }

    #[test]
    fn unknown_root_is_retriable() {
        let f = fixture();
        let mut s = submission(&f, "hi", "poll-1");
        s.root = pallas::Base::from(99);

        let rejection = f.verifier.submit(&s).unwrap_err();
        assert_eq!(rejection, Rejection::StaleOrUnknownRoot);
        assert!(rejection.is_retriable());
        assert!(f.verifier.registry().is_empty());
    }

    #[test]
    fn root_leaves_window_after_enough_publications() {
        let f = fixture();
        let s = submission(&f, "hi", "poll-1");

        f.verifier.publish_root(pallas::Base::from(1));
        assert_eq!(f.verifier.accepted_roots().len(), 2);
        f.verifier.publish_root(pallas::Base::from(2));

        assert_eq!(f.verifier.submit(&s), Err(Rejection::StaleOrUnknownRoot));
    }

    #[test]
    fn disallowed_scope_is_rejected_before_anything_else() {
        let f = fixture();
        let verifier = f.verifier.with_allowed_scopes(["poll-2"]);
        let f = Fixture { verifier, ..f };
        let s = submission(&f, "hi", "poll-1");

        assert_eq!(
            f.verifier.submit(&s),
            Err(Rejection::ScopeNotAllowed("poll-1".into()))
        );
    }

    #[test]
    fn acceptance_is_published_on_the_bus() {
        let f = fixture();
        let mut sub = f.verifier.bus().subscribe();
        let s = submission(&f, "hello", "poll-1");

        f.verifier.submit(&s).unwrap();
        let event = sub.try_recv().unwrap();
        assert_eq!(event.signal, Signal::from("hello"));
        assert_eq!(event.scope, "poll-1");
        assert_eq!(event.nullifier_hash, s.nullifier_hash);

        let _ = f.verifier.submit(&s);
        assert!(sub.try_recv().is_none());
    }
}
