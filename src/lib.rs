//! Anonymous group signalling
//!
//! A member of a registered group publishes a short message ("signal") with a
//! zero-knowledge proof that they belong to the group, without revealing
//! which member they are. A per-scope nullifier stops anyone from signalling
//! twice in the same scope.
//!
//! # Components
//!
//! - [`Identity`]: trapdoor, nullifier secret and public commitment derived
//!   from a user secret
//! - [`MembershipTree`]: depth-20 Poseidon Merkle tree of commitments
//! - [`Witness`]: private and public prover inputs
//! - [`ProofSystem`]: prover/verifier boundary, implemented by
//!   [`Halo2ProofSystem`] and [`MockProofSystem`]
//! - [`SignalVerifier`]: root check, proof check and atomic nullifier commit
//! - [`SignalBus`]: subscriptions to accepted signals
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zkp_anon_signal::{
//!     generate_proof, ExternalNullifier, Identity, MembershipTree, MemoryNullifierRegistry,
//!     MockProofSystem, Signal, SignalVerifier, Submission, Witness,
//! };
//!
//! let me = Identity::from_secret("my wallet signature").unwrap();
//! let tree = MembershipTree::build(vec![me.commitment()]).unwrap();
//!
//! let scope = ExternalNullifier::from_scope("greeting-2024").unwrap();
//! let signal = Signal::from("Hello world");
//! let path = tree.prove_membership(me.commitment()).unwrap();
//! let witness = Witness::build(&me, &path, &signal, &scope).unwrap();
//! let proof = generate_proof(&MockProofSystem, &witness).unwrap();
//!
//! let verifier = SignalVerifier::new(
//!     Arc::new(MockProofSystem),
//!     Arc::new(MemoryNullifierRegistry::new()),
//!     4,
//! );
//! verifier.publish_group(&tree);
//! assert!(verifier.submit(&Submission::from_proof(signal, scope, proof)).is_ok());
//! ```

pub mod circuit;
pub mod config;
pub mod error;
pub mod ethereum;
pub mod events;
pub mod identity;
pub mod merkle;
pub mod proof;
pub mod registry;
pub mod server;
pub mod signal;
pub mod types;
pub mod utils;
pub mod verifier;
pub mod witness;

#[cfg(test)]
mod merkle_tests;

pub use circuit::{Halo2ProofSystem, SignalCircuit};
pub use error::{ProtocolError, Rejection};
pub use events::{SignalBus, SignalEvent, Subscription};
pub use identity::Identity;
pub use merkle::{MembershipTree, MerkleProof};
pub use proof::{generate_proof, generate_proof_cancellable, MockProofSystem, Proof, ProofSystem};
pub use registry::{FileNullifierRegistry, MemoryNullifierRegistry, NullifierRegistry, RootHistory};
pub use signal::{nullifier_hash, ExternalNullifier, Signal};
pub use types::SignalSubmission;
pub use utils::{field_from_hex, field_to_hex, poseidon_hash};
pub use verifier::{Accepted, SignalVerifier, Submission};
pub use witness::{PublicInputs, Witness};

/// Depth of the membership tree, fixed by the circuit. Groups hold up to
/// 2^20 members.
pub const TREE_DEPTH: usize = 20;

/// Circuit size parameter: `2^k` rows.
///
/// The depth-20 path needs 22 Poseidon permutations of about 40 rows each,
/// which fits in 4096 rows. Prover and verifier must use the same value.
pub const CIRCUIT_K: u32 = 12;

/// Longest signal in bytes; a signal must fit in one field element.
pub const MAX_SIGNAL_BYTES: usize = 31;
