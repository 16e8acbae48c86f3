//! Canonical cycle signatures.
//!
//! Two cycles are the same cycle when one is a rotation of the other, or a
//! rotation of the other traversed in the opposite direction. The signature
//! normalizes both degrees of freedom so equality of signatures is equality
//! of cycles.

use crate::model::Eid;

/// Computes the rotation- and reflection-invariant signature of a cycle's
/// edge-id sequence.
///
/// The sequence is rotated to begin at its minimum edge id, once forward and
/// once reversed, and the lexicographically smaller of the two rotations is
/// the signature. Edge ids are unique within a tenant, so the signature is a
/// faithful identity for cycles without duplicate edges.
pub fn canonical_signature(edge_ids: &[Eid]) -> Vec<Eid> {
    let Some(&min_eid) = edge_ids.iter().min() else {
        return Vec::new();
    };

    let k = edge_ids.iter().position(|&e| e == min_eid).unwrap_or(0);
    let forward: Vec<Eid> = edge_ids[k..]
        .iter()
        .chain(edge_ids[..k].iter())
        .copied()
        .collect();

    let reversed: Vec<Eid> = edge_ids.iter().rev().copied().collect();
    let k = reversed.iter().position(|&e| e == min_eid).unwrap_or(0);
    let backward: Vec<Eid> = reversed[k..]
        .iter()
        .chain(reversed[..k].iter())
        .copied()
        .collect();

    if forward <= backward {
        forward
    } else {
        backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rotate(ids: &[Eid], k: usize) -> Vec<Eid> {
        if ids.is_empty() {
            return Vec::new();
        }
        let k = k % ids.len();
        ids[k..].iter().chain(ids[..k].iter()).copied().collect()
    }

    #[test]
    fn test_signature_starts_at_minimum() {
        assert_eq!(canonical_signature(&[30, 10, 20]), vec![10, 20, 30]);
    }

    #[test]
    fn test_empty_sequence() {
        assert!(canonical_signature(&[]).is_empty());
    }

    #[test]
    fn test_single_edge() {
        assert_eq!(canonical_signature(&[7]), vec![7]);
    }

    #[test]
    fn test_rotations_collapse() {
        let base = [10, 20, 30, 40];
        let expected = canonical_signature(&base);
        for k in 1..base.len() {
            assert_eq!(canonical_signature(&rotate(&base, k)), expected);
        }
    }

    #[test]
    fn test_reflection_collapses() {
        let forward = [10, 20, 30, 40];
        let reversed: Vec<Eid> = forward.iter().rev().copied().collect();
        assert_eq!(
            canonical_signature(&forward),
            canonical_signature(&reversed)
        );
    }

    #[test]
    fn test_distinct_cycles_stay_distinct() {
        // Same edge set, different order: different cycles through the
        // same edges must not collapse.
        let a = canonical_signature(&[1, 2, 3, 4]);
        let b = canonical_signature(&[1, 3, 2, 4]);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_rotation_invariant(
            ids in prop::collection::hash_set(0i64..10_000, 1..12),
            k in 0usize..16,
        ) {
            let ids: Vec<Eid> = ids.into_iter().collect();
            prop_assert_eq!(
                canonical_signature(&rotate(&ids, k)),
                canonical_signature(&ids)
            );
        }

        #[test]
        fn prop_reflection_invariant(
            ids in prop::collection::hash_set(0i64..10_000, 1..12),
        ) {
            let ids: Vec<Eid> = ids.into_iter().collect();
            let reversed: Vec<Eid> = ids.iter().rev().copied().collect();
            prop_assert_eq!(
                canonical_signature(&reversed),
                canonical_signature(&ids)
            );
        }

        #[test]
        fn prop_signature_is_idempotent(
            ids in prop::collection::hash_set(0i64..10_000, 1..12),
        ) {
            let ids: Vec<Eid> = ids.into_iter().collect();
            let sig = canonical_signature(&ids);
            prop_assert_eq!(canonical_signature(&sig), sig.clone());
        }
    }
}
