//! Meet-point detection, cycle stitching, and validation.

use rustc_hash::FxHashSet;

use super::frontier::{Frontier, FrontierEntry};
use super::signature::canonical_signature;
use super::Direction;
use crate::model::{Edge, Eid, Vid};

/// Policy knobs the validator applies to a stitched candidate.
#[derive(Debug, Clone, Copy)]
pub struct CyclePolicy {
    /// Temporal direction of the query.
    pub direction: Direction,
    /// Tolerate a repeated interior vertex at the meet join.
    pub allow_dup_vertices: bool,
    /// Tolerate a repeated edge at the meet join.
    pub allow_dup_edges: bool,
}

/// Joins the two frontiers at every shared meet vertex and appends newly
/// discovered unique cycles to `cycles`, stopping once `limit` cycles have
/// been collected in total.
///
/// Meet vertices are visited in ascending id order so that a limit-truncated
/// result set is reproducible.
pub fn detect_cycles(
    forward: &Frontier,
    backward: &Frontier,
    start_vid: Vid,
    policy: CyclePolicy,
    limit: usize,
    seen: &mut FxHashSet<Vec<Eid>>,
    cycles: &mut Vec<Vec<Edge>>,
) {
    if cycles.len() >= limit {
        return;
    }

    let mut meets: Vec<Vid> = forward
        .keys()
        .filter(|&vid| vid != start_vid && backward.contains(vid))
        .collect();
    meets.sort_unstable();

    for meet_vid in meets {
        if cycles.len() >= limit {
            break;
        }
        let (Some(fwd), Some(bwd)) = (forward.entry(meet_vid), backward.entry(meet_vid)) else {
            continue;
        };

        let candidate = stitch(fwd, bwd);
        if !validate(&candidate, start_vid, policy) {
            continue;
        }

        let signature = canonical_signature(&candidate.iter().map(|e| e.eid).collect::<Vec<_>>());
        if seen.insert(signature) {
            cycles.push(candidate);
        }
    }
}

/// Concatenates the forward leg with the reversed backward leg.
///
/// The backward frontier stores its path from the start outwards along
/// incoming edges, so replaying its edges in reverse yields the cycle's
/// prefix in traversal order; every edge keeps its own src/dst orientation.
fn stitch(fwd: &FrontierEntry, bwd: &FrontierEntry) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(fwd.path_edges.len() + bwd.path_edges.len());
    edges.extend(fwd.path_edges.iter().cloned());
    edges.extend(bwd.path_edges.iter().rev().cloned());
    edges
}

/// Applies the simple-cycle rules to a stitched candidate.
fn validate(cycle: &[Edge], start_vid: Vid, policy: CyclePolicy) -> bool {
    let Some(last) = cycle.last() else {
        return false;
    };
    if last.dst_vid != start_vid {
        return false;
    }

    if !policy.allow_dup_vertices {
        let mut visited = vec![start_vid];
        for edge in cycle {
            if edge.dst_vid != start_vid && visited.contains(&edge.dst_vid) {
                return false;
            }
            visited.push(edge.dst_vid);
        }
    }

    if !policy.allow_dup_edges {
        let mut eids = FxHashSet::default();
        for edge in cycle {
            if !eids.insert(edge.eid) {
                return false;
            }
        }
    }

    // Each leg is monotone on its own, but nothing ties the forward leg's
    // last timestamp to the backward leg's at the meet vertex, so the
    // stitched sequence is re-checked as a whole.
    if policy.direction == Direction::Forward {
        for pair in cycle.windows(2) {
            if pair[1].occur_time <= pair[0].occur_time {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(eid: Eid, src: Vid, dst: Vid, at: i64) -> Edge {
        Edge::new(eid, src, dst, 1, at, "transfer")
    }

    fn policy() -> CyclePolicy {
        CyclePolicy {
            direction: Direction::Forward,
            allow_dup_vertices: false,
            allow_dup_edges: false,
        }
    }

    #[test]
    fn test_validate_accepts_simple_cycle() {
        let cycle = vec![edge(1, 1, 2, 100), edge(2, 2, 3, 110), edge(3, 3, 1, 120)];
        assert!(validate(&cycle, 1, policy()));
    }

    #[test]
    fn test_validate_rejects_open_walk() {
        let walk = vec![edge(1, 1, 2, 100), edge(2, 2, 3, 110)];
        assert!(!validate(&walk, 1, policy()));
        assert!(!validate(&[], 1, policy()));
    }

    #[test]
    fn test_validate_duplicate_vertex_policy() {
        // 1 -> 2 -> 3 -> 2 ... the interior revisit of 2 is only legal when
        // duplicates are allowed.
        let cycle = vec![
            edge(1, 1, 2, 100),
            edge(2, 2, 3, 110),
            edge(3, 3, 2, 120),
            edge(4, 2, 1, 130),
        ];
        assert!(!validate(&cycle, 1, policy()));

        let relaxed = CyclePolicy {
            allow_dup_vertices: true,
            ..policy()
        };
        assert!(validate(&cycle, 1, relaxed));
    }

    #[test]
    fn test_validate_duplicate_edge_policy() {
        let cycle = vec![edge(1, 1, 2, 100), edge(1, 2, 1, 110)];
        assert!(!validate(&cycle, 1, policy()));

        let relaxed = CyclePolicy {
            allow_dup_edges: true,
            ..policy()
        };
        assert!(validate(&cycle, 1, relaxed));
    }

    #[test]
    fn test_validate_rejects_non_monotone_join() {
        // Forward leg ends at 150, backward leg resumes at 120: legal for
        // each leg in isolation, not as a whole.
        let cycle = vec![edge(1, 1, 2, 100), edge(2, 2, 3, 150), edge(3, 3, 1, 120)];
        assert!(!validate(&cycle, 1, policy()));

        let any = CyclePolicy {
            direction: Direction::Any,
            ..policy()
        };
        assert!(validate(&cycle, 1, any));
    }
}
