//! Fixed-depth Merkle tree over identity commitments.
//!
//! Nodes are Poseidon hashes of their children. Unused leaves hold the zero
//! value, and empty subtrees collapse to precomputed zero hashes, so building
//! a depth-20 tree only hashes the populated prefix of each level.
//!
//! A tree is an immutable snapshot of the group. Membership changes build a
//! new tree whose root is then published to verifiers.

use crate::error::ProtocolError;
use crate::utils::{field_to_hex, poseidon_hash};
use crate::TREE_DEPTH;
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;
use std::fmt;
use std::sync::OnceLock;

/// Value of an unused leaf.
pub const ZERO_LEAF: pallas::Base = pallas::Base::ZERO;

/// Which child of its parent a node on the path is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Left,
    Right,
}

impl Position {
    fn of(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Left
        } else {
            Self::Right
        }
    }
}

/// One level of an inclusion path: the sibling hash and the side the
/// running node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub sibling: pallas::Base,
    pub position: Position,
}

/// Inclusion proof for one leaf, ordered from leaf to root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf: pallas::Base,
    pub path: Vec<PathStep>,
    pub root: pallas::Base,
}

impl MerkleProof {
    /// Hashes `leaf` up the path.
    #[must_use]
    pub fn compute_root(&self) -> pallas::Base {
        self.path.iter().fold(self.leaf, |node, step| match step.position {
            Position::Left => poseidon_hash(node, step.sibling),
            Position::Right => poseidon_hash(step.sibling, node),
        })
    }

    /// True if the path recomputes the declared root and the positions
    /// agree with `leaf_index`.
    #[must_use]
    pub fn verify(&self) -> bool {
        let positions_match = self
            .path
            .iter()
            .enumerate()
            .all(|(level, step)| step.position == Position::of(self.leaf_index >> level));

        positions_match && self.compute_root() == self.root
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleProof:\n  Leaf: {}\n  Root: {}\n  Index: {}\n  Depth: {}",
            field_to_hex(self.leaf),
            field_to_hex(self.root),
            self.leaf_index,
            self.path.len()
        )
    }
}

fn zero_hashes() -> &'static [pallas::Base] {
    static ZEROS: OnceLock<Vec<pallas::Base>> = OnceLock::new();
    ZEROS.get_or_init(|| {
        let mut zeros = Vec::with_capacity(TREE_DEPTH + 1);
        zeros.push(ZERO_LEAF);
        for level in 0..TREE_DEPTH {
            zeros.push(poseidon_hash(zeros[level], zeros[level]));
        }
        zeros
    })
}

/// Root of an empty subtree of the given height.
///
/// Heights above [`TREE_DEPTH`] are computed on the fly.
#[must_use]
pub fn zero_hash(height: usize) -> pallas::Base {
    let cached = zero_hashes();
    if let Some(value) = cached.get(height) {
        return *value;
    }
    let mut node = cached[TREE_DEPTH];
    for _ in TREE_DEPTH..height {
        node = poseidon_hash(node, node);
    }
    node
}

/// Snapshot of the registered group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipTree {
    depth: usize,
    /// `levels[0]` are the leaves; `levels[i]` holds only the populated prefix
    /// of level `i`.
    levels: Vec<Vec<pallas::Base>>,
    root: pallas::Base,
}

impl MembershipTree {
    /// Builds a tree of depth [`TREE_DEPTH`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::TreeOverflow`] if there are more than
    /// `2^TREE_DEPTH` leaves.
    pub fn build(leaves: Vec<pallas::Base>) -> Result<Self, ProtocolError> {
        Self::build_with_depth(TREE_DEPTH, leaves)
    }

    /// Builds a tree of an arbitrary depth.
    ///
    /// # Errors
    /// Returns [`ProtocolError::TreeOverflow`] if `leaves` does not fit.
    pub fn build_with_depth(
        depth: usize,
        leaves: Vec<pallas::Base>,
    ) -> Result<Self, ProtocolError> {
        let capacity = u32::try_from(depth)
            .ok()
            .and_then(|shift| 1usize.checked_shl(shift))
            .ok_or(ProtocolError::TreeOverflow {
                len: leaves.len(),
                capacity: 0,
            })?;

        if leaves.len() > capacity {
            return Err(ProtocolError::TreeOverflow {
                len: leaves.len(),
                capacity,
            });
        }

        let mut levels = Vec::with_capacity(depth + 1);
        levels.push(leaves);

        for height in 0..depth {
            let current = &levels[height];
            let pad = zero_hash(height);
            let parents: Vec<pallas::Base> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => poseidon_hash(*left, *right),
                    [left] => poseidon_hash(*left, pad),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(parents);
        }

        let root = levels[depth].first().copied().unwrap_or_else(|| zero_hash(depth));

        Ok(Self {
            depth,
            levels,
            root,
        })
    }

    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.root
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn leaves(&self) -> &[pallas::Base] {
        &self.levels[0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// Position of the first leaf equal to `commitment`.
    #[must_use]
    pub fn index_of(&self, commitment: pallas::Base) -> Option<usize> {
        self.levels[0].iter().position(|leaf| *leaf == commitment)
    }

    /// Inclusion proof for `commitment`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::NotAMember`] if the commitment is not a leaf.
    pub fn prove_membership(&self, commitment: pallas::Base) -> Result<MerkleProof, ProtocolError> {
        let leaf_index = self.index_of(commitment).ok_or(ProtocolError::NotAMember)?;
        Ok(self.proof_at(leaf_index, commitment))
    }

    /// Inclusion proof for the leaf at `leaf_index`, if it is populated.
    #[must_use]
    pub fn generate_proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf = *self.levels[0].get(leaf_index)?;
        Some(self.proof_at(leaf_index, leaf))
    }

    fn proof_at(&self, leaf_index: usize, leaf: pallas::Base) -> MerkleProof {
        let path = (0..self.depth)
            .map(|height| {
                let index = leaf_index >> height;
                let sibling = self.levels[height]
                    .get(index ^ 1)
                    .copied()
                    .unwrap_or_else(|| zero_hash(height));
                PathStep {
                    sibling,
                    position: Position::of(index),
                }
            })
            .collect();

        MerkleProof {
            leaf_index,
            leaf,
            path,
            root: self.root,
        }
    }

    /// Checks a proof against this snapshot's root.
    #[must_use]
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        proof.root == self.root && proof.depth() == self.depth && proof.verify()
    }
}
