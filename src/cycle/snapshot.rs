//! Per-query working graph.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::Result;
use crate::model::{Edge, EdgeFilter, Vertex, VertexFilter, Vid};
use crate::source::GraphSource;

/// Immutable filtered view of one tenant's graph, alive for the duration of
/// a single query.
///
/// Edges whose source or destination was removed by the vertex filter are
/// dropped, so every retained edge has both endpoints in `vertices`.
/// Adjacency lists keep the source's natural order, which keeps results
/// reproducible.
#[derive(Debug)]
pub struct Snapshot {
    vertices: FxHashMap<Vid, Vertex>,
    out_adj: FxHashMap<Vid, Vec<Edge>>,
    in_adj: FxHashMap<Vid, Vec<Edge>>,
    edge_count: usize,
}

impl Snapshot {
    /// Materializes the working graph with two filtered reads against the
    /// source.
    pub fn load<S: GraphSource + ?Sized>(
        source: &S,
        tenant: &str,
        vertex_filter: &VertexFilter,
        edge_filter: &EdgeFilter,
    ) -> Result<Self> {
        let vertex_rows = source.load_vertices(tenant, vertex_filter)?;
        let mut vertices =
            FxHashMap::with_capacity_and_hasher(vertex_rows.len(), Default::default());
        for vertex in vertex_rows {
            vertices.insert(vertex.vid, vertex);
        }

        let mut out_adj: FxHashMap<Vid, Vec<Edge>> = FxHashMap::default();
        let mut in_adj: FxHashMap<Vid, Vec<Edge>> = FxHashMap::default();
        let mut edge_count = 0usize;
        for edge in source.load_edges(tenant, edge_filter)? {
            if !vertices.contains_key(&edge.src_vid) || !vertices.contains_key(&edge.dst_vid) {
                continue;
            }
            in_adj.entry(edge.dst_vid).or_default().push(edge.clone());
            out_adj.entry(edge.src_vid).or_default().push(edge);
            edge_count += 1;
        }

        debug!(
            tenant,
            vertex_count = vertices.len(),
            edge_count,
            "snapshot loaded"
        );

        Ok(Self {
            vertices,
            out_adj,
            in_adj,
            edge_count,
        })
    }

    /// True when `vid` survived the vertex filter.
    pub fn contains_vertex(&self, vid: Vid) -> bool {
        self.vertices.contains_key(&vid)
    }

    /// Looks up a retained vertex.
    pub fn vertex(&self, vid: Vid) -> Option<&Vertex> {
        self.vertices.get(&vid)
    }

    /// Outgoing edges of `vid`, in source order.
    pub fn outgoing(&self, vid: Vid) -> &[Edge] {
        self.out_adj.get(&vid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges of `vid`, in source order.
    pub fn incoming(&self, vid: Vid) -> &[Edge] {
        self.in_adj.get(&vid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of retained vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of retained edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryGraph;

    #[test]
    fn test_dangling_edges_are_dropped() {
        let mut graph = MemoryGraph::new();
        graph.add_vertex("t", Vertex::new(1, "account", 0, 100));
        graph.add_vertex("t", Vertex::new(2, "account", 0, 5));
        // 1 -> 2 survives only if vertex 2 survives.
        graph.add_edge("t", Edge::new(1, 1, 2, 10, 100, "transfer"));
        // Edge to a vertex that never existed.
        graph.add_edge("t", Edge::new(2, 1, 99, 10, 110, "transfer"));

        let all = Snapshot::load(
            &graph,
            "t",
            &VertexFilter::default(),
            &EdgeFilter::default(),
        )
        .unwrap();
        assert_eq!(all.vertex_count(), 2);
        assert_eq!(all.edge_count(), 1);
        assert_eq!(all.outgoing(1).len(), 1);
        assert_eq!(all.incoming(2).len(), 1);

        let rich = VertexFilter {
            v_types: None,
            min_balance: Some(50),
        };
        let filtered = Snapshot::load(&graph, "t", &rich, &EdgeFilter::default()).unwrap();
        assert!(filtered.contains_vertex(1));
        assert!(!filtered.contains_vertex(2));
        assert_eq!(filtered.edge_count(), 0);
        assert!(filtered.outgoing(1).is_empty());
    }
}
