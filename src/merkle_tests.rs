#[cfg(test)]
mod tests {
    use crate::merkle::{zero_hash, MembershipTree, Position, ZERO_LEAF};
    use crate::utils::poseidon_hash;
    use crate::{ProtocolError, TREE_DEPTH};
    use pasta_curves::pallas;

    fn leaves(values: &[u64]) -> Vec<pallas::Base> {
        values.iter().copied().map(pallas::Base::from).collect()
    }

    #[test]
    fn test_merkle_tree_creation() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        assert_eq!(tree.depth(), TREE_DEPTH);
        assert_eq!(tree.len(), 4);
        assert_ne!(tree.root(), zero_hash(TREE_DEPTH));
    }

    #[test]
    fn test_small_tree_matches_manual_hashing() {
        let tree = MembershipTree::build_with_depth(2, leaves(&[1, 2, 3])).unwrap();

        let left = poseidon_hash(pallas::Base::from(1), pallas::Base::from(2));
        let right = poseidon_hash(pallas::Base::from(3), ZERO_LEAF);
        assert_eq!(tree.root(), poseidon_hash(left, right));
    }

    #[test]
    fn test_empty_tree_root_is_zero_hash() {
        let tree = MembershipTree::build(Vec::new()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), zero_hash(TREE_DEPTH));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let a = MembershipTree::build(leaves(&[10, 20, 30, 40])).unwrap();
        let b = MembershipTree::build(leaves(&[10, 20, 30, 40])).unwrap();
        assert_eq!(a.root(), b.root());
        assert_eq!(a, b);
    }

    #[test]
    fn test_changing_one_leaf_changes_root() {
        let base = MembershipTree::build(leaves(&[10, 20, 30, 40])).unwrap();
        let changed = MembershipTree::build(leaves(&[10, 20, 31, 40])).unwrap();
        assert_ne!(base.root(), changed.root());
    }

    #[test]
    fn test_appending_zero_leaf_changes_nothing_but_explicit_leaves_do() {
        // An explicit zero leaf occupies the same slot padding would.
        let short = MembershipTree::build(leaves(&[10, 20, 30])).unwrap();
        let padded = MembershipTree::build(vec![
            pallas::Base::from(10),
            pallas::Base::from(20),
            pallas::Base::from(30),
            ZERO_LEAF,
        ])
        .unwrap();
        assert_eq!(short.root(), padded.root());

        let extended = MembershipTree::build(leaves(&[10, 20, 30, 1])).unwrap();
        assert_ne!(short.root(), extended.root());
    }

    #[test]
    fn test_merkle_proof_verification() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        let proof = tree.prove_membership(pallas::Base::from(3)).unwrap();

        assert_eq!(proof.leaf_index, 2);
        assert_eq!(proof.depth(), TREE_DEPTH);
        assert_eq!(proof.path[0].position, Position::Left);
        assert_eq!(proof.path[1].position, Position::Right);
        assert!(tree.verify_proof(&proof));
    }

    #[test]
    fn test_every_leaf_proves() {
        let tree = MembershipTree::build_with_depth(4, leaves(&[5, 6, 7, 8, 9])).unwrap();
        for index in 0..tree.len() {
            let proof = tree.generate_proof(index).unwrap();
            assert!(tree.verify_proof(&proof), "leaf {index} should verify");
        }
    }

    #[test]
    fn test_non_member_is_rejected() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        assert_eq!(
            tree.prove_membership(pallas::Base::from(99)),
            Err(ProtocolError::NotAMember)
        );
    }

    #[test]
    fn test_merkle_proof_invalid_against_other_tree() {
        let tree1 = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        let tree2 = MembershipTree::build(leaves(&[5, 6, 7, 8])).unwrap();

        let proof = tree1.generate_proof(0).unwrap();
        assert!(!tree2.verify_proof(&proof));
    }

    #[test]
    fn test_tree_overflow_at_build_time() {
        let result = MembershipTree::build_with_depth(2, leaves(&[1, 2, 3, 4, 5]));
        assert_eq!(
            result,
            Err(ProtocolError::TreeOverflow {
                len: 5,
                capacity: 4
            })
        );
        assert!(MembershipTree::build_with_depth(2, leaves(&[1, 2, 3, 4])).is_ok());
    }

    #[test]
    fn test_merkle_proof_with_invalid_index() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        assert!(tree.generate_proof(999).is_none());
    }

    #[test]
    fn test_merkle_proof_with_tampered_root() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        let mut proof = tree.generate_proof(0).unwrap();
        proof.root = pallas::Base::from(0xFF);
        assert!(!proof.verify());
        assert!(!tree.verify_proof(&proof));
    }

    #[test]
    fn test_merkle_proof_with_tampered_leaf() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        let mut proof = tree.generate_proof(0).unwrap();
        proof.leaf = pallas::Base::from(0xFF);
        assert!(!tree.verify_proof(&proof));
    }

    #[test]
    fn test_merkle_proof_with_tampered_siblings() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        let mut proof = tree.generate_proof(0).unwrap();
        proof.path[0].sibling = pallas::Base::from(0xFF);
        assert!(!tree.verify_proof(&proof));
    }

    #[test]
    fn test_merkle_proof_with_flipped_position() {
        let tree = MembershipTree::build(leaves(&[1, 2, 3, 4])).unwrap();
        let mut proof = tree.generate_proof(1).unwrap();
        proof.path[0].position = Position::Left;
        assert!(!proof.verify());
    }

    #[test]
    fn test_large_tree() {
        let values: Vec<u64> = (0..1024).collect();
        let tree = MembershipTree::build(leaves(&values)).unwrap();
        let proof = tree.generate_proof(512).unwrap();
        assert!(tree.verify_proof(&proof));
    }
}
