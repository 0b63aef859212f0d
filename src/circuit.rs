//! halo2 circuit for anonymous group signals.
//!
//! The circuit proves, for public `[root, nullifier_hash, signal_hash,
//! external_nullifier]`:
//!
//! 1. `commitment = Poseidon(trapdoor, nullifier_secret)`
//! 2. `commitment` is a leaf of a depth-[`TREE_DEPTH`] Poseidon Merkle tree
//!    with root `root`; each level orders `(node, sibling)` through a
//!    boolean conditional-swap gate
//! 3. `nullifier_hash = Poseidon(nullifier_secret, external_nullifier)`
//! 4. `signal_hash` and `external_nullifier` are copied from the instance
//!    column, binding the proof to the signal and scope
//!
//! Hashing uses the `P128Pow5T3` chip from `halo2_gadgets`, the same
//! instance as [`crate::utils::poseidon_hash`].

use crate::error::ProtocolError;
use crate::merkle::Position;
use crate::proof::{Proof, ProofSystem};
use crate::witness::{PublicInputs, Witness};
use crate::{CIRCUIT_K, TREE_DEPTH};
use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, SimpleFloorPlanner, Value},
    plonk::{
        create_proof, keygen_pk, keygen_vk, verify_proof, Advice, Circuit, Column,
        ConstraintSystem, Error, Expression, Instance, ProvingKey, Selector, SingleVerifier,
    },
    poly::{commitment::Params, Rotation},
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use log::{debug, info};
use pasta_curves::group::ff::Field;
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;

type Cell = AssignedCell<pallas::Base, pallas::Base>;

#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// `[node, sibling, position, left, right]` for the swap gate; the first
    /// four also hold the loaded secrets and scope.
    advice: [Column<Advice>; 5],
    instance: Column<Instance>,
    s_swap: Selector,
    poseidon: Pow5Config<pallas::Base, 3, 2>,
}

/// Private inputs of one signal. `Default` gives the witness-free circuit
/// used for key generation.
#[derive(Debug, Clone)]
pub struct SignalCircuit {
    trapdoor: Value<pallas::Base>,
    nullifier_secret: Value<pallas::Base>,
    siblings: [Value<pallas::Base>; TREE_DEPTH],
    /// 0 when the running node is a left child, 1 when it is a right child.
    positions: [Value<pallas::Base>; TREE_DEPTH],
}

impl Default for SignalCircuit {
    fn default() -> Self {
        Self {
            trapdoor: Value::unknown(),
            nullifier_secret: Value::unknown(),
            siblings: [Value::unknown(); TREE_DEPTH],
            positions: [Value::unknown(); TREE_DEPTH],
        }
    }
}

impl SignalCircuit {
    #[must_use]
    pub fn from_witness(witness: &Witness) -> Self {
        let mut circuit = Self {
            trapdoor: Value::known(witness.trapdoor()),
            nullifier_secret: Value::known(witness.nullifier_secret()),
            ..Self::default()
        };

        for (level, (sibling, position)) in witness.path().iter().take(TREE_DEPTH).enumerate() {
            circuit.siblings[level] = Value::known(*sibling);
            circuit.positions[level] = Value::known(match position {
                Position::Left => pallas::Base::ZERO,
                Position::Right => pallas::Base::ONE,
            });
        }

        circuit
    }
}

fn hash_pair(
    config: &CircuitConfig,
    mut layouter: impl Layouter<pallas::Base>,
    message: [Cell; 2],
) -> Result<Cell, Error> {
    let chip = Pow5Chip::construct(config.poseidon.clone());
    let hasher = PoseidonHash::<_, _, P128Pow5T3, ConstantLength<2>, 3, 2>::init(
        chip,
        layouter.namespace(|| "poseidon init"),
    )?;
    hasher.hash(layouter.namespace(|| "poseidon hash"), message)
}

impl Circuit<pallas::Base> for SignalCircuit {
    type Config = CircuitConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::default()
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let advice = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        let instance = meta.instance_column();
        meta.enable_equality(instance);
        for column in &advice {
            meta.enable_equality(*column);
        }

        let s_swap = meta.selector();
        meta.create_gate("conditional swap", |meta| {
            let s = meta.query_selector(s_swap);
            let node = meta.query_advice(advice[0], Rotation::cur());
            let sibling = meta.query_advice(advice[1], Rotation::cur());
            let bit = meta.query_advice(advice[2], Rotation::cur());
            let left = meta.query_advice(advice[3], Rotation::cur());
            let right = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(pallas::Base::ONE);

            vec![
                s.clone() * bit.clone() * (one - bit.clone()),
                s.clone()
                    * (left - (node.clone() + bit.clone() * (sibling.clone() - node.clone()))),
                s * (right - (sibling.clone() + bit * (node - sibling))),
            ]
        });

        let state = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        let partial_sbox = meta.advice_column();
        for column in &state {
            meta.enable_equality(*column);
        }

        let rc_a = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        let rc_b = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        meta.enable_constant(rc_b[0]);

        let poseidon =
            Pow5Chip::configure::<P128Pow5T3>(meta, state, partial_sbox, rc_a, rc_b);

        CircuitConfig {
            advice,
            instance,
            s_swap,
            poseidon,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> Result<(), Error> {
        let (trapdoor, nullifier_secret, external_nullifier) = layouter.assign_region(
            || "load identity and scope",
            |mut region| {
                let trapdoor =
                    region.assign_advice(|| "trapdoor", config.advice[0], 0, || self.trapdoor)?;
                let nullifier_secret = region.assign_advice(
                    || "nullifier secret",
                    config.advice[1],
                    0,
                    || self.nullifier_secret,
                )?;
                let external_nullifier = region.assign_advice_from_instance(
                    || "external nullifier",
                    config.instance,
                    PublicInputs::EXTERNAL_NULLIFIER_ROW,
                    config.advice[2],
                    0,
                )?;
                region.assign_advice_from_instance(
                    || "signal hash",
                    config.instance,
                    PublicInputs::SIGNAL_HASH_ROW,
                    config.advice[3],
                    0,
                )?;
                Ok((trapdoor, nullifier_secret, external_nullifier))
            },
        )?;

        let commitment = hash_pair(
            &config,
            layouter.namespace(|| "identity commitment"),
            [trapdoor, nullifier_secret.clone()],
        )?;
        let nullifier_hash = hash_pair(
            &config,
            layouter.namespace(|| "nullifier hash"),
            [nullifier_secret, external_nullifier],
        )?;

        let mut node = commitment;
        for level in 0..TREE_DEPTH {
            let (left, right) = layouter.assign_region(
                || format!("swap level {level}"),
                |mut region| {
                    config.s_swap.enable(&mut region, 0)?;

                    let current = node.copy_advice(|| "node", &mut region, config.advice[0], 0)?;
                    let sibling = region.assign_advice(
                        || "sibling",
                        config.advice[1],
                        0,
                        || self.siblings[level],
                    )?;
                    let bit = region.assign_advice(
                        || "position",
                        config.advice[2],
                        0,
                        || self.positions[level],
                    )?;

                    let ordered = current
                        .value()
                        .zip(sibling.value())
                        .zip(bit.value())
                        .map(|((node, sibling), bit)| {
                            if *bit == pallas::Base::ONE {
                                (*sibling, *node)
                            } else {
                                (*node, *sibling)
                            }
                        });

                    let left = region.assign_advice(
                        || "left",
                        config.advice[3],
                        0,
                        || ordered.map(|(left, _)| left),
                    )?;
                    let right = region.assign_advice(
                        || "right",
                        config.advice[4],
                        0,
                        || ordered.map(|(_, right)| right),
                    )?;
                    Ok((left, right))
                },
            )?;

            node = hash_pair(
                &config,
                layouter.namespace(|| format!("merkle level {level}")),
                [left, right],
            )?;
        }

        layouter.constrain_instance(node.cell(), config.instance, PublicInputs::ROOT_ROW)?;
        layouter.constrain_instance(
            nullifier_hash.cell(),
            config.instance,
            PublicInputs::NULLIFIER_HASH_ROW,
        )?;

        Ok(())
    }
}

fn prover_failure(context: &str, err: &Error) -> ProtocolError {
    ProtocolError::ProverFailure(format!("{context}: {err:?}"))
}

/// halo2 backend with parameters and keys generated once at setup.
pub struct Halo2ProofSystem {
    params: Params<vesta::Affine>,
    pk: ProvingKey<vesta::Affine>,
}

impl Halo2ProofSystem {
    /// Generates parameters for `2^CIRCUIT_K` rows and the circuit keys.
    ///
    /// # Errors
    /// Returns [`ProtocolError::ProverFailure`] if key generation fails.
    pub fn setup() -> Result<Self, ProtocolError> {
        Self::setup_with_k(CIRCUIT_K)
    }

    /// Same as [`Halo2ProofSystem::setup`] with an explicit size.
    ///
    /// # Errors
    /// Returns [`ProtocolError::ProverFailure`] if the circuit does not fit
    /// or key generation fails.
    pub fn setup_with_k(k: u32) -> Result<Self, ProtocolError> {
        info!("Generating halo2 parameters and keys (k = {k})");
        let params = Params::<vesta::Affine>::new(k);
        let empty = SignalCircuit::default();

        let vk = keygen_vk(&params, &empty).map_err(|e| prover_failure("keygen_vk", &e))?;
        let pk = keygen_pk(&params, vk, &empty).map_err(|e| prover_failure("keygen_pk", &e))?;

        Ok(Self { params, pk })
    }
}

impl ProofSystem for Halo2ProofSystem {
    fn prove(&self, witness: &Witness) -> Result<Proof, ProtocolError> {
        witness
            .check()
            .map_err(|e| ProtocolError::ProverFailure(e.to_string()))?;

        let public_inputs = *witness.public_inputs();
        let instance = public_inputs.to_instance();
        let instances: &[&[&[pallas::Base]]] = &[&[&instance]];
        let circuit = SignalCircuit::from_witness(witness);

        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
        create_proof(
            &self.params,
            &self.pk,
            &[circuit],
            instances,
            OsRng,
            &mut transcript,
        )
        .map_err(|e| prover_failure("create_proof", &e))?;

        Ok(Proof {
            public_inputs,
            bytes: transcript.finalize(),
        })
    }

    fn verify(&self, proof: &Proof) -> bool {
        let instance = proof.public_inputs.to_instance();
        let instances: &[&[&[pallas::Base]]] = &[&[&instance]];

        let strategy = SingleVerifier::new(&self.params);
        let mut transcript =
            Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(&proof.bytes[..]);

        match verify_proof(
            &self.params,
            self.pk.get_vk(),
            strategy,
            instances,
            &mut transcript,
        ) {
            Ok(()) => true,
            Err(e) => {
                debug!("halo2 verification failed: {e:?}");
                false
            }
        }
    }
}
