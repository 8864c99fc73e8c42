//! Topology generators
//!
//! Generated topologies only carry structure. Intersections cost nothing to
//! cross and every edge attribute is left to the configured defaults.

use anyhow::{ensure, Result};
use rand::Rng;

use crate::config::{EdgeSpec, NodeSpec, Topology};
use crate::simulation::{EdgeId, NodeId};

/// Every node connected to every other node in both directions.
/// Edge IDs are assigned in row-major order of (start, end).
pub fn complete_network(node_count: u64) -> Topology {
    connect_pairs(node_count, |_, _| true)
}

/// Erdős–Rényi network where each ordered pair of distinct nodes gets an
/// edge independently with the given probability.
pub fn erdos_renyi_network<R: Rng + ?Sized>(
    node_count: u64,
    probability: f64,
    rng: &mut R,
) -> Result<Topology> {
    ensure!(
        (0.0..=1.0).contains(&probability),
        "Edge probability must be between 0 and 1, got {probability}"
    );
    Ok(connect_pairs(node_count, |_, _| rng.random_bool(probability)))
}

fn connect_pairs(node_count: u64, mut joined: impl FnMut(u64, u64) -> bool) -> Topology {
    let node_list = (0..node_count)
        .map(|id| NodeSpec::new(NodeId(id)).with_cost(0.0))
        .collect();

    let mut edge_list = Vec::new();
    for start in 0..node_count {
        for end in 0..node_count {
            if start != end && joined(start, end) {
                let id = EdgeId(edge_list.len() as u64);
                edge_list.push(EdgeSpec::new(id, NodeId(start), NodeId(end)));
            }
        }
    }

    Topology {
        node_list,
        edge_list,
    }
}
