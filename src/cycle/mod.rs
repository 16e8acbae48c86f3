//! Temporal cycle enumeration over a tenant's transaction graph.
//!
//! The engine runs a meet-in-the-middle BFS: a forward frontier follows
//! outgoing edges from the start vertex while a backward frontier follows
//! incoming edges, and after every half-step the two are joined at shared
//! meet vertices. Splitting the depth between the two sides halves the
//! search depth per side; canonical signatures collapse the many rotations
//! and reflections in which the same cycle is rediscovered.

mod collide;
mod frontier;
mod signature;
mod snapshot;

use std::time::Instant;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeFilter, Vertex, VertexFilter, Vid};
use crate::source::GraphSource;

use collide::CyclePolicy;
pub use frontier::{Frontier, FrontierEntry};
pub use signature::canonical_signature;
pub use snapshot::Snapshot;

/// Deepest search the engine accepts.
pub const MAX_DEPTH: u32 = 20;

/// Largest result budget the engine accepts.
pub const MAX_LIMIT: usize = 1000;

/// Result budget used when the request leaves it unset.
pub const DEFAULT_LIMIT: usize = 10;

/// Temporal direction policy of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Timestamps must strictly increase along a reported cycle.
    Forward,
    /// No temporal constraint on either side.
    Any,
}

/// Parameters of one cycle-enumeration query.
#[derive(Debug, Clone)]
pub struct CycleQuery {
    /// Vertex every reported cycle passes through.
    pub start_vid: Vid,
    /// Longest cycle (in edges) the search may report.
    pub max_depth: u32,
    /// Temporal policy.
    pub direction: Direction,
    /// Vertex predicate for the snapshot.
    pub vertex_filter: VertexFilter,
    /// Edge predicate for the snapshot.
    pub edge_filter: EdgeFilter,
    /// Result budget.
    pub limit: usize,
    /// Tolerate repeated interior vertices at the meet join.
    pub allow_dup_vertices: bool,
    /// Tolerate repeated edges at the meet join.
    pub allow_dup_edges: bool,
}

impl CycleQuery {
    /// Creates a query with the default direction, limit, and policies.
    pub fn new(start_vid: Vid, max_depth: u32) -> Self {
        Self {
            start_vid,
            max_depth,
            direction: Direction::Forward,
            vertex_filter: VertexFilter::default(),
            edge_filter: EdgeFilter::default(),
            limit: DEFAULT_LIMIT,
            allow_dup_vertices: false,
            allow_dup_edges: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.start_vid <= 0 {
            return Err(GraphError::InvalidArgument(format!(
                "start_vid must be positive, got {}",
                self.start_vid
            )));
        }
        if self.max_depth < 1 || self.max_depth > MAX_DEPTH {
            return Err(GraphError::InvalidArgument(format!(
                "max_depth must be in [1, {MAX_DEPTH}], got {}",
                self.max_depth
            )));
        }
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(GraphError::InvalidArgument(format!(
                "limit must be in [1, {MAX_LIMIT}], got {}",
                self.limit
            )));
        }
        self.vertex_filter.validate()?;
        self.edge_filter.validate()?;
        Ok(())
    }
}

/// One reported cycle: its distinct vertices in traversal order (start
/// first) and its edges in traversal order.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    /// Distinct vertices along the cycle; the start vertex appears exactly
    /// once, at position 0.
    pub vertices: Vec<Vertex>,
    /// Edges in traversal order; the last edge returns to the start vertex.
    pub edges: Vec<Edge>,
}

/// Timing metadata attached to every successful response.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMeta {
    /// Wall-clock duration of the query.
    pub execution_time_ms: u64,
}

/// Outcome of a cycle query that did not fail.
#[derive(Debug, Clone, Serialize)]
pub struct CycleQueryOutcome {
    /// Whether at least one cycle was reported.
    pub found: bool,
    /// Number of reported cycles; never exceeds the query's limit.
    pub count: usize,
    /// The reported cycles.
    pub data: Vec<CycleRecord>,
    /// Timing metadata.
    pub meta: QueryMeta,
    /// Informational note, e.g. when the start vertex was filtered out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CycleQueryOutcome {
    fn not_found(started: Instant, message: Option<String>) -> Self {
        Self {
            found: false,
            count: 0,
            data: Vec::new(),
            meta: QueryMeta {
                execution_time_ms: started.elapsed().as_millis() as u64,
            },
            message,
        }
    }
}

/// Enumerates simple, temporally-monotone cycles through `start_vid`.
///
/// Fails with [`GraphError::InvalidArgument`] on out-of-domain parameters
/// and [`GraphError::NotFound`] when the start vertex does not exist for the
/// tenant. A start vertex that exists but fails the vertex predicates yields
/// a successful outcome with `found == false`.
pub fn query_cycles<S: GraphSource + ?Sized>(
    source: &S,
    tenant: &str,
    query: &CycleQuery,
) -> Result<CycleQueryOutcome> {
    let started = Instant::now();
    query.validate()?;

    let Some(start_vertex) = source.load_vertex(tenant, query.start_vid)? else {
        return Err(GraphError::NotFound(format!(
            "start vertex {}",
            query.start_vid
        )));
    };
    if !query.vertex_filter.matches(&start_vertex) {
        return Ok(CycleQueryOutcome::not_found(
            started,
            Some("start vertex does not match filters".to_string()),
        ));
    }

    let snapshot = Snapshot::load(source, tenant, &query.vertex_filter, &query.edge_filter)?;
    if !snapshot.contains_vertex(query.start_vid) {
        return Err(GraphError::Internal(format!(
            "start vertex {} passed the filter probe but is missing from the snapshot",
            query.start_vid
        )));
    }

    let cycles = enumerate(&snapshot, query);
    debug!(
        tenant,
        start_vid = query.start_vid,
        cycle_count = cycles.len(),
        "cycle query finished"
    );

    let data = cycles
        .iter()
        .map(|cycle| compose_record(&snapshot, query.start_vid, cycle))
        .collect::<Result<Vec<_>>>()?;

    Ok(CycleQueryOutcome {
        found: !data.is_empty(),
        count: data.len(),
        data,
        meta: QueryMeta {
            execution_time_ms: started.elapsed().as_millis() as u64,
        },
        message: None,
    })
}

/// Drives the alternating expansion rounds.
///
/// Rounds run to `ceil(max_depth / 2)`; within a round the forward side
/// advances first and collisions are checked against the backward side's
/// previous depth before the backward side advances, so every reachable
/// `(forward, backward)` depth pair is joined exactly once. For odd
/// `max_depth` the final round is forward-only, which is what makes
/// odd-length cycles up to `max_depth` reachable without ever stitching a
/// cycle longer than `max_depth`.
fn enumerate(snapshot: &Snapshot, query: &CycleQuery) -> Vec<Vec<Edge>> {
    let mut forward = Frontier::seeded(query.start_vid);
    let mut backward = Frontier::seeded(query.start_vid);
    let mut seen = FxHashSet::default();
    let mut cycles: Vec<Vec<Edge>> = Vec::new();

    let policy = CyclePolicy {
        direction: query.direction,
        allow_dup_vertices: query.allow_dup_vertices,
        allow_dup_edges: query.allow_dup_edges,
    };

    let backward_rounds = (query.max_depth / 2) as usize;
    let rounds = query.max_depth.div_ceil(2) as usize;

    for round in 1..=rounds {
        if cycles.len() >= query.limit {
            break;
        }
        if forward.expand_forward(snapshot, query.direction) == 0 {
            break;
        }
        collide::detect_cycles(
            &forward,
            &backward,
            query.start_vid,
            policy,
            query.limit,
            &mut seen,
            &mut cycles,
        );
        if cycles.len() >= query.limit || round > backward_rounds {
            break;
        }
        if backward.expand_backward(snapshot, query.direction) == 0 {
            break;
        }
        collide::detect_cycles(
            &forward,
            &backward,
            query.start_vid,
            policy,
            query.limit,
            &mut seen,
            &mut cycles,
        );
    }

    cycles
}

/// Builds the response record for one stitched cycle: the distinct vertex
/// sequence in traversal order and the edges as stitched.
fn compose_record(snapshot: &Snapshot, start_vid: Vid, cycle: &[Edge]) -> Result<CycleRecord> {
    let mut order = vec![start_vid];
    for edge in cycle {
        if edge.dst_vid != start_vid && !order.contains(&edge.dst_vid) {
            order.push(edge.dst_vid);
        }
    }

    let vertices = order
        .into_iter()
        .map(|vid| {
            snapshot.vertex(vid).cloned().ok_or_else(|| {
                GraphError::Internal(format!("cycle vertex {vid} missing from snapshot"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CycleRecord {
        vertices,
        edges: cycle.to_vec(),
    })
}
