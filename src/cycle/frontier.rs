//! Per-direction BFS state and one-hop expansion.

use rustc_hash::FxHashMap;

use super::snapshot::Snapshot;
use super::Direction;
use crate::model::{Edge, Vid};

/// State recorded for every vertex a BFS side has reached.
///
/// The entry holds the first path that reached its vertex, in expansion
/// order. `last_occur_time == 0` marks the seeded start entry: no
/// predecessor edge yet, so the first hop on either side is temporally
/// unconstrained.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Vertex this entry was expanded from; `None` for the start seed.
    pub parent_vid: Option<Vid>,
    /// Edge used to reach this vertex; `None` for the start seed.
    pub parent_edge: Option<Edge>,
    /// Hop count from the start vertex.
    pub depth: usize,
    /// Vertices along the path; begins at the start vertex, ends at this
    /// entry's vertex.
    pub path_vids: Vec<Vid>,
    /// Edges along the path; one shorter than `path_vids`.
    pub path_edges: Vec<Edge>,
    /// Timestamp of the last edge on the path, or the `0` sentinel.
    pub last_occur_time: i64,
}

/// One side of the bidirectional search.
#[derive(Debug)]
pub struct Frontier {
    entries: FxHashMap<Vid, FrontierEntry>,
    layer: Vec<Vid>,
}

impl Frontier {
    /// Creates a frontier holding the start vertex as its zero-depth entry.
    pub fn seeded(start_vid: Vid) -> Self {
        let mut entries = FxHashMap::default();
        entries.insert(
            start_vid,
            FrontierEntry {
                parent_vid: None,
                parent_edge: None,
                depth: 0,
                path_vids: vec![start_vid],
                path_edges: Vec::new(),
                last_occur_time: 0,
            },
        );
        Self {
            entries,
            layer: vec![start_vid],
        }
    }

    /// Looks up the entry recorded for `vid`, if the side reached it.
    pub fn entry(&self, vid: Vid) -> Option<&FrontierEntry> {
        self.entries.get(&vid)
    }

    /// True when this side has reached `vid`.
    pub fn contains(&self, vid: Vid) -> bool {
        self.entries.contains_key(&vid)
    }

    /// All reached vertex ids, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = Vid> + '_ {
        self.entries.keys().copied()
    }

    /// Advances the frontier one hop along outgoing edges.
    ///
    /// Under [`Direction::Forward`] a hop must move strictly forward in
    /// time relative to the path's last edge. A hop never re-enters a vertex
    /// already on its own path, and the first entry to claim a vertex wins;
    /// entries from shallower layers are never overwritten.
    ///
    /// Returns the number of newly reached vertices.
    pub fn expand_forward(&mut self, snapshot: &Snapshot, direction: Direction) -> usize {
        self.expand(snapshot, direction, false)
    }

    /// Advances the frontier one hop along incoming edges.
    ///
    /// Mirror of [`Frontier::expand_forward`]: this side walks the cycle's
    /// prefix backwards, so under [`Direction::Forward`] a hop must move
    /// strictly *earlier* in time, except from the start sentinel which
    /// admits any timestamp.
    pub fn expand_backward(&mut self, snapshot: &Snapshot, direction: Direction) -> usize {
        self.expand(snapshot, direction, true)
    }

    fn expand(&mut self, snapshot: &Snapshot, direction: Direction, backward: bool) -> usize {
        let mut next_layer = Vec::new();

        for vid in std::mem::take(&mut self.layer) {
            let Some(parent) = self.entries.get(&vid).cloned() else {
                continue;
            };

            let edges = if backward {
                snapshot.incoming(vid)
            } else {
                snapshot.outgoing(vid)
            };

            for edge in edges {
                let candidate = if backward { edge.src_vid } else { edge.dst_vid };

                if direction == Direction::Forward {
                    let admitted = if backward {
                        parent.last_occur_time == 0 || edge.occur_time < parent.last_occur_time
                    } else {
                        edge.occur_time > parent.last_occur_time
                    };
                    if !admitted {
                        continue;
                    }
                }
                if parent.path_vids.contains(&candidate) {
                    continue;
                }
                if self.entries.contains_key(&candidate) {
                    continue;
                }

                let mut path_vids = parent.path_vids.clone();
                path_vids.push(candidate);
                let mut path_edges = parent.path_edges.clone();
                path_edges.push(edge.clone());

                self.entries.insert(
                    candidate,
                    FrontierEntry {
                        parent_vid: Some(vid),
                        parent_edge: Some(edge.clone()),
                        depth: parent.depth + 1,
                        path_vids,
                        path_edges,
                        last_occur_time: edge.occur_time,
                    },
                );
                next_layer.push(candidate);
            }
        }

        let reached = next_layer.len();
        self.layer = next_layer;
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeFilter, Vertex, VertexFilter};
    use crate::source::MemoryGraph;

    fn snapshot_of(edges: &[(i64, Vid, Vid, i64)]) -> Snapshot {
        let mut graph = MemoryGraph::new();
        let mut vids: Vec<Vid> = edges
            .iter()
            .flat_map(|&(_, src, dst, _)| [src, dst])
            .collect();
        vids.sort_unstable();
        vids.dedup();
        for vid in vids {
            graph.add_vertex("t", Vertex::new(vid, "account", 0, 0));
        }
        for &(eid, src, dst, at) in edges {
            graph.add_edge("t", Edge::new(eid, src, dst, 1, at, "transfer"));
        }
        Snapshot::load(
            &graph,
            "t",
            &VertexFilter::default(),
            &EdgeFilter::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_forward_expansion_records_paths() {
        let snapshot = snapshot_of(&[(1, 1, 2, 100), (2, 2, 3, 110)]);
        let mut frontier = Frontier::seeded(1);

        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 1);
        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 1);

        let entry = frontier.entry(3).unwrap();
        assert_eq!(entry.depth, 2);
        assert_eq!(entry.parent_vid, Some(2));
        assert_eq!(entry.parent_edge.as_ref().unwrap().eid, 2);
        assert_eq!(entry.path_vids, vec![1, 2, 3]);
        assert_eq!(entry.path_edges.len(), 2);
        assert_eq!(entry.last_occur_time, 110);
    }

    #[test]
    fn test_forward_rejects_non_increasing_time() {
        // Second hop happens before the first; inadmissible under Forward.
        let snapshot = snapshot_of(&[(1, 1, 2, 100), (2, 2, 3, 90)]);
        let mut frontier = Frontier::seeded(1);

        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 1);
        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 0);

        let mut any = Frontier::seeded(1);
        assert_eq!(any.expand_forward(&snapshot, Direction::Any), 1);
        assert_eq!(any.expand_forward(&snapshot, Direction::Any), 1);
    }

    #[test]
    fn test_backward_walks_earlier_edges() {
        // Cycle prefix read backwards from vertex 1: the first backward hop
        // (any timestamp) lands on 3 via e3, the second must be earlier.
        let snapshot = snapshot_of(&[(2, 2, 3, 110), (3, 3, 1, 120)]);
        let mut frontier = Frontier::seeded(1);

        assert_eq!(frontier.expand_backward(&snapshot, Direction::Forward), 1);
        let entry = frontier.entry(3).unwrap();
        assert_eq!(entry.last_occur_time, 120);

        assert_eq!(frontier.expand_backward(&snapshot, Direction::Forward), 1);
        let entry = frontier.entry(2).unwrap();
        assert_eq!(entry.depth, 2);
        assert_eq!(entry.path_vids, vec![1, 3, 2]);
    }

    #[test]
    fn test_backward_rejects_later_edges_past_sentinel() {
        let snapshot = snapshot_of(&[(2, 2, 3, 200), (3, 3, 1, 120)]);
        let mut frontier = Frontier::seeded(1);

        assert_eq!(frontier.expand_backward(&snapshot, Direction::Forward), 1);
        // e2 at 200 is later than the path's last edge at 120.
        assert_eq!(frontier.expand_backward(&snapshot, Direction::Forward), 0);
    }

    #[test]
    fn test_simple_path_blocks_revisits() {
        let snapshot = snapshot_of(&[(1, 1, 2, 100), (2, 2, 1, 110)]);
        let mut frontier = Frontier::seeded(1);

        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 1);
        // The only edge out of 2 returns to 1, which is on the path.
        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 0);
    }

    #[test]
    fn test_first_writer_wins() {
        // Two same-depth routes into vertex 4; the first edge in adjacency
        // order claims it and the entry stays stable afterwards.
        let snapshot = snapshot_of(&[
            (1, 1, 2, 100),
            (2, 1, 3, 100),
            (3, 2, 4, 110),
            (4, 3, 4, 110),
        ]);
        let mut frontier = Frontier::seeded(1);

        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 2);
        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 1);

        let entry = frontier.entry(4).unwrap();
        assert_eq!(entry.depth, 2);
        assert_eq!(entry.path_vids, vec![1, 2, 4]);

        // A later layer must not overwrite the depth-2 entry either.
        assert_eq!(frontier.expand_forward(&snapshot, Direction::Forward), 0);
        assert_eq!(frontier.entry(4).unwrap().depth, 2);
    }
}
