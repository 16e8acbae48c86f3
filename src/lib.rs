//! # CycleGraph - Temporal Transaction-Graph Cycle Service
//!
//! CycleGraph stores a directed, attributed, temporally-stamped transaction
//! graph per tenant and answers temporal cycle-enumeration queries over it.
//! The engine runs a meet-in-the-middle (bidirectional) BFS anchored at a
//! start vertex, enumerating simple, temporally-monotone cycles under
//! vertex/edge predicates with canonical deduplication.
//!
//! ## Quick Start
//!
//! ```rust
//! use cyclegraph::{CycleQuery, Edge, MemoryGraph, Vertex, query_cycles};
//!
//! let mut graph = MemoryGraph::new();
//! graph.add_vertex("demo", Vertex::new(1, "account", 0, 100));
//! graph.add_vertex("demo", Vertex::new(2, "account", 0, 100));
//! graph.add_vertex("demo", Vertex::new(3, "account", 0, 100));
//! graph.add_edge("demo", Edge::new(1, 1, 2, 50, 100, "transfer"));
//! graph.add_edge("demo", Edge::new(2, 2, 3, 50, 110, "transfer"));
//! graph.add_edge("demo", Edge::new(3, 3, 1, 50, 120, "transfer"));
//!
//! let outcome = query_cycles(&graph, "demo", &CycleQuery::new(1, 3))?;
//! assert!(outcome.found);
//! assert_eq!(outcome.count, 1);
//! # Ok::<(), cyclegraph::GraphError>(())
//! ```
//!
//! ## Architecture
//!
//! - **Model layer**: vertices, edges, and the filter value objects.
//! - **Source layer**: the [`GraphSource`] capability plus the SQLite-backed
//!   multi-tenant store and an in-memory reference implementation.
//! - **Engine layer**: snapshot loading, bidirectional frontier expansion,
//!   collision detection, and canonical cycle signatures.
//! - **Service layer**: the `cgql` command grammar, token authentication,
//!   and the HTTP endpoint.

pub mod auth;
pub mod command;
pub mod config;
pub mod cycle;
pub mod error;
pub mod model;
pub mod server;
pub mod source;
pub mod store;

// Re-export the main public API
pub use crate::cycle::{
    canonical_signature, query_cycles, CycleQuery, CycleQueryOutcome, CycleRecord, Direction,
    QueryMeta,
};
pub use crate::error::{GraphError, Result};
pub use crate::model::{Edge, EdgeFilter, Eid, Vertex, VertexFilter, Vid};
pub use crate::source::{GraphSource, MemoryGraph};
pub use crate::store::SqliteStore;
