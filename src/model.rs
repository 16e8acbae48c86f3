//! Data model for the transaction graph.
//!
//! Vertices carry an account-like balance, edges carry a transfer amount and
//! the timestamp at which the transfer occurred. Filters are explicit value
//! objects with every recognized option enumerated; anything else is rejected
//! at the boundary.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Unique identifier for vertices within a tenant.
pub type Vid = i64;

/// Unique identifier for edges within a tenant.
pub type Eid = i64;

/// A vertex in the transaction graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    /// Unique id within the tenant.
    pub vid: Vid,
    /// Short type tag, e.g. `"account"`.
    pub v_type: String,
    /// Creation timestamp (opaque int64 supplied by the client).
    pub create_time: i64,
    /// Current balance; never negative.
    pub balance: i64,
}

impl Vertex {
    /// Creates a vertex record.
    pub fn new(vid: Vid, v_type: impl Into<String>, create_time: i64, balance: i64) -> Self {
        Self {
            vid,
            v_type: v_type.into(),
            create_time,
            balance,
        }
    }
}

/// A directed edge from `src_vid` to `dst_vid`.
///
/// Self-loops are permitted by the model but can never appear in a simple
/// cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique id within the tenant.
    pub eid: Eid,
    /// Source vertex id.
    pub src_vid: Vid,
    /// Destination vertex id.
    pub dst_vid: Vid,
    /// Transfer amount; never negative.
    pub amount: i64,
    /// Timestamp of the transfer; always positive, so `0` is free to act as
    /// the frontier sentinel.
    pub occur_time: i64,
    /// Short type tag, e.g. `"transfer"`.
    pub e_type: String,
}

impl Edge {
    /// Creates an edge record.
    pub fn new(
        eid: Eid,
        src_vid: Vid,
        dst_vid: Vid,
        amount: i64,
        occur_time: i64,
        e_type: impl Into<String>,
    ) -> Self {
        Self {
            eid,
            src_vid,
            dst_vid,
            amount,
            occur_time,
            e_type: e_type.into(),
        }
    }
}

/// Vertex predicate applied when materializing a query snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexFilter {
    /// Restrict to these vertex types; `None` admits every type.
    pub v_types: Option<Vec<String>>,
    /// Minimum balance, inclusive.
    pub min_balance: Option<i64>,
}

impl VertexFilter {
    /// Returns true when `vertex` satisfies every supplied predicate.
    pub fn matches(&self, vertex: &Vertex) -> bool {
        if let Some(types) = &self.v_types {
            if !types.iter().any(|t| t == &vertex.v_type) {
                return false;
            }
        }
        if let Some(min) = self.min_balance {
            if vertex.balance < min {
                return false;
            }
        }
        true
    }

    /// Validates the filter's own domain.
    pub fn validate(&self) -> Result<()> {
        if let Some(min) = self.min_balance {
            if min < 0 {
                return Err(GraphError::InvalidArgument(format!(
                    "min_balance must be non-negative, got {min}"
                )));
            }
        }
        Ok(())
    }

    /// True when no predicate is supplied.
    pub fn is_empty(&self) -> bool {
        self.v_types.is_none() && self.min_balance.is_none()
    }
}

/// Edge predicate applied when materializing a query snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeFilter {
    /// Restrict to these edge types; `None` admits every type.
    pub e_types: Option<Vec<String>>,
    /// Minimum amount, inclusive.
    pub min_amount: Option<i64>,
    /// Maximum amount, inclusive.
    pub max_amount: Option<i64>,
}

impl EdgeFilter {
    /// Returns true when `edge` satisfies every supplied predicate.
    pub fn matches(&self, edge: &Edge) -> bool {
        if let Some(types) = &self.e_types {
            if !types.iter().any(|t| t == &edge.e_type) {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if edge.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if edge.amount > max {
                return false;
            }
        }
        true
    }

    /// Validates the filter's own domain, including `min <= max`.
    pub fn validate(&self) -> Result<()> {
        if let Some(min) = self.min_amount {
            if min < 0 {
                return Err(GraphError::InvalidArgument(format!(
                    "min_amount must be non-negative, got {min}"
                )));
            }
        }
        if let Some(max) = self.max_amount {
            if max < 0 {
                return Err(GraphError::InvalidArgument(format!(
                    "max_amount must be non-negative, got {max}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(GraphError::InvalidArgument(format!(
                    "min_amount {min} exceeds max_amount {max}"
                )));
            }
        }
        Ok(())
    }

    /// True when no predicate is supplied.
    pub fn is_empty(&self) -> bool {
        self.e_types.is_none() && self.min_amount.is_none() && self.max_amount.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_filter_matches() {
        let vertex = Vertex::new(1, "account", 0, 500);

        assert!(VertexFilter::default().matches(&vertex));

        let typed = VertexFilter {
            v_types: Some(vec!["account".to_string()]),
            min_balance: None,
        };
        assert!(typed.matches(&vertex));

        let wrong_type = VertexFilter {
            v_types: Some(vec!["merchant".to_string()]),
            min_balance: None,
        };
        assert!(!wrong_type.matches(&vertex));

        let rich_only = VertexFilter {
            v_types: None,
            min_balance: Some(1000),
        };
        assert!(!rich_only.matches(&vertex));
    }

    #[test]
    fn test_edge_filter_matches() {
        let edge = Edge::new(1, 1, 2, 250, 100, "transfer");

        assert!(EdgeFilter::default().matches(&edge));

        let bounded = EdgeFilter {
            e_types: None,
            min_amount: Some(100),
            max_amount: Some(300),
        };
        assert!(bounded.matches(&edge));

        let too_low = EdgeFilter {
            e_types: None,
            min_amount: Some(300),
            max_amount: None,
        };
        assert!(!too_low.matches(&edge));

        let wrong_type = EdgeFilter {
            e_types: Some(vec!["refund".to_string()]),
            min_amount: None,
            max_amount: None,
        };
        assert!(!wrong_type.matches(&edge));
    }

    #[test]
    fn test_filter_validation() {
        let negative = VertexFilter {
            v_types: None,
            min_balance: Some(-1),
        };
        assert!(negative.validate().is_err());

        let contradictory = EdgeFilter {
            e_types: None,
            min_amount: Some(10),
            max_amount: Some(5),
        };
        assert!(contradictory.validate().is_err());

        let ok = EdgeFilter {
            e_types: None,
            min_amount: Some(5),
            max_amount: Some(10),
        };
        assert!(ok.validate().is_ok());
    }
}
