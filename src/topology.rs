use std::collections::{HashMap, HashSet, VecDeque};
use serde::Serialize;
use crate::graph::{NodeId, Snapshot};

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Residual cycle: {} node(s) could not be ordered ({})", .unresolved.len(), join_ids(.unresolved))]
    ResidualCycle { unresolved: Vec<NodeId> },
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub order: Vec<NodeId>,
    pub sources: Vec<NodeId>,
    pub sinks: Vec<NodeId>,
    pub has_residual_cycle: bool,
}

impl Topology {
    /// Nodes left out of `order` because they sit on or behind a cycle.
    pub fn unresolved(&self, snapshot: Snapshot<'_>) -> Vec<NodeId> {
        let ordered: HashSet<NodeId> = self.order.iter().copied().collect();
        snapshot.nodes.iter().map(|n| n.id).filter(|id| !ordered.contains(id)).collect()
    }
}

/// Kahn's algorithm with a FIFO queue seeded in node creation order, so ties between simultaneously
/// eligible nodes resolve by creation order. Edges naming unknown nodes are ignored.
///
/// On a cyclic graph the result is shorter than the node list.
pub fn sorted_order(snapshot: Snapshot<'_>) -> Vec<NodeId> {
    let mut in_degree: HashMap<NodeId, usize> = snapshot.nodes.iter().map(|n| (n.id, 0)).collect();
    let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for connection in snapshot.connections {
        let (from, to) = (connection.source.node, connection.target.node);
        if !in_degree.contains_key(&from) {
            continue;
        }
        let Some(degree) = in_degree.get_mut(&to) else { continue };
        *degree += 1;
        successors.entry(from).or_default().push(to);
    }

    let mut queue: VecDeque<NodeId> = snapshot.nodes.iter()
        .map(|n| n.id)
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(snapshot.nodes.len());
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for next in successors.get(&node).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }
    order
}

/// Nodes with no incoming edge, in creation order.
pub fn sources(snapshot: Snapshot<'_>) -> Vec<NodeId> {
    snapshot.nodes.iter()
        .map(|n| n.id)
        .filter(|id| snapshot.incoming(*id).next().is_none())
        .collect()
}

/// Nodes with no outgoing edge, in creation order.
pub fn sinks(snapshot: Snapshot<'_>) -> Vec<NodeId> {
    snapshot.nodes.iter()
        .map(|n| n.id)
        .filter(|id| snapshot.outgoing(*id).next().is_none())
        .collect()
}

pub fn resolve(snapshot: Snapshot<'_>) -> Topology {
    let order = sorted_order(snapshot);
    let has_residual_cycle = order.len() < snapshot.nodes.len();
    if has_residual_cycle {
        log::error!("Topological sort ordered {} of {} nodes", order.len(), snapshot.nodes.len());
    }
    Topology {
        order,
        sources: sources(snapshot),
        sinks: sinks(snapshot),
        has_residual_cycle,
    }
}

/// Topological order restricted to nodes attached to at least one edge.
pub fn connected_order(snapshot: Snapshot<'_>) -> Result<Vec<NodeId>, TopologyError> {
    let topology = resolve(snapshot);
    if topology.has_residual_cycle {
        return Err(TopologyError::ResidualCycle { unresolved: topology.unresolved(snapshot) });
    }
    Ok(topology.order.into_iter().filter(|id| snapshot.is_connected(*id)).collect())
}

/// Nodes without any edge, in creation order.
pub fn isolated(snapshot: Snapshot<'_>) -> Vec<NodeId> {
    snapshot.nodes.iter()
        .map(|n| n.id)
        .filter(|id| !snapshot.is_connected(*id))
        .collect()
}
