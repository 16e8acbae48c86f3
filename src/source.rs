//! Graph data sources consumed by the cycle engine.
//!
//! The engine never touches storage directly; it reads one tenant's filtered
//! vertex and edge sets through the [`GraphSource`] capability. The SQLite
//! store implements this trait for production use; [`MemoryGraph`] is the
//! in-memory reference implementation used by tests and examples.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::model::{Edge, EdgeFilter, Vertex, VertexFilter, Vid};

/// Read capability over one tenant's graph.
///
/// A query issues one bulk vertex read and one bulk edge read to build its
/// snapshot, plus a single unfiltered probe for the start vertex so that a
/// missing vertex and a filtered-out vertex can be told apart.
pub trait GraphSource {
    /// Fetches a single vertex regardless of any filter.
    fn load_vertex(&self, tenant: &str, vid: Vid) -> Result<Option<Vertex>>;

    /// Fetches every vertex of the tenant matching `filter`.
    fn load_vertices(&self, tenant: &str, filter: &VertexFilter) -> Result<Vec<Vertex>>;

    /// Fetches every edge of the tenant matching `filter`.
    fn load_edges(&self, tenant: &str, filter: &EdgeFilter) -> Result<Vec<Edge>>;
}

#[derive(Debug, Default)]
struct TenantGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

/// In-memory multi-tenant graph.
///
/// Insertion order is preserved, which keeps adjacency order and therefore
/// query output deterministic.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    tenants: FxHashMap<String, TenantGraph>,
}

impl MemoryGraph {
    /// Creates an empty graph with no tenants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex to `tenant`, creating the tenant on first use.
    pub fn add_vertex(&mut self, tenant: &str, vertex: Vertex) {
        self.tenants
            .entry(tenant.to_string())
            .or_default()
            .vertices
            .push(vertex);
    }

    /// Adds an edge to `tenant`, creating the tenant on first use.
    pub fn add_edge(&mut self, tenant: &str, edge: Edge) {
        self.tenants
            .entry(tenant.to_string())
            .or_default()
            .edges
            .push(edge);
    }
}

impl GraphSource for MemoryGraph {
    fn load_vertex(&self, tenant: &str, vid: Vid) -> Result<Option<Vertex>> {
        let Some(graph) = self.tenants.get(tenant) else {
            return Ok(None);
        };
        Ok(graph.vertices.iter().find(|v| v.vid == vid).cloned())
    }

    fn load_vertices(&self, tenant: &str, filter: &VertexFilter) -> Result<Vec<Vertex>> {
        let Some(graph) = self.tenants.get(tenant) else {
            return Ok(Vec::new());
        };
        Ok(graph
            .vertices
            .iter()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect())
    }

    fn load_edges(&self, tenant: &str, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        let Some(graph) = self.tenants.get(tenant) else {
            return Ok(Vec::new());
        };
        Ok(graph
            .edges
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}
