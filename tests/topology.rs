use nn_blueprint::graph::{Connection, ConnectionId};
use nn_blueprint::topology::{self, TopologyError};
use nn_blueprint::{Graph, NodeId, NodeKind};

mod common;
use common::{add, linear};

#[test]
fn ties_resolve_by_creation_order() {
    common::init_logging();
    let mut graph = Graph::new();
    let a = linear(&mut graph, 8, 8);
    let b = linear(&mut graph, 8, 8);
    let c = linear(&mut graph, 8, 8);
    graph.connect_nodes(b, a).unwrap();

    let topology = topology::resolve(graph.snapshot());
    assert_eq!(topology.order, vec![b, c, a]);
    assert_eq!(topology.sources, vec![b, c]);
    assert_eq!(topology.sinks, vec![a, c]);
    assert!(!topology.has_residual_cycle);
    assert_eq!(topology::isolated(graph.snapshot()), vec![c]);
    assert_eq!(topology::connected_order(graph.snapshot()).unwrap(), vec![b, a]);
}

#[test]
fn diamond_orders_branches_before_the_merge() {
    common::init_logging();
    let mut graph = Graph::new();
    let input = linear(&mut graph, 4, 8);
    let left = linear(&mut graph, 8, 8);
    let right = linear(&mut graph, 8, 8);
    let sum = add(&mut graph, NodeKind::Add, &[]);
    graph.connect_nodes(input, left).unwrap();
    graph.connect_nodes(input, right).unwrap();
    graph.connect_ports(right, sum, "input1").unwrap();
    graph.connect_ports(left, sum, "input2").unwrap();

    let order = topology::sorted_order(graph.snapshot());
    assert_eq!(order, vec![input, left, right, sum]);
    assert_eq!(order, topology::sorted_order(graph.snapshot()));
}

fn project(order: &[NodeId], subset: &[NodeId]) -> Vec<NodeId> {
    order.iter().copied().filter(|id| subset.contains(id)).collect()
}

#[test]
fn creation_order_only_breaks_ties() {
    common::init_logging();
    // Chain a -> b -> c and pair u -> v, with u created first in the second graph.
    let mut first = Graph::new();
    let (a1, b1, c1) = (linear(&mut first, 8, 8), linear(&mut first, 8, 8), linear(&mut first, 8, 8));
    let (u1, v1) = (linear(&mut first, 8, 8), linear(&mut first, 8, 8));

    let mut second = Graph::new();
    let u2 = linear(&mut second, 8, 8);
    let a2 = linear(&mut second, 8, 8);
    let v2 = linear(&mut second, 8, 8);
    let (b2, c2) = (linear(&mut second, 8, 8), linear(&mut second, 8, 8));

    for (graph, [a, b, c, u, v]) in [(&mut first, [a1, b1, c1, u1, v1]), (&mut second, [a2, b2, c2, u2, v2])] {
        graph.connect_nodes(a, b).unwrap();
        graph.connect_nodes(b, c).unwrap();
        graph.connect_nodes(u, v).unwrap();
    }

    let order1 = topology::sorted_order(first.snapshot());
    let order2 = topology::sorted_order(second.snapshot());
    assert_eq!(project(&order1, &[a1, b1, c1]), vec![a1, b1, c1]);
    assert_eq!(project(&order2, &[a2, b2, c2]), vec![a2, b2, c2]);
    assert_eq!(project(&order1, &[u1, v1]), vec![u1, v1]);
    assert_eq!(project(&order2, &[u2, v2]), vec![u2, v2]);

    // The two sources are eligible together and come out in creation order.
    assert_eq!(order1, vec![a1, u1, b1, v1, c1]);
    assert_eq!(order2, vec![u2, a2, v2, b2, c2]);
}

#[test]
fn residual_cycle_is_reported() {
    common::init_logging();
    let mut graph = Graph::new();
    let a = linear(&mut graph, 8, 8);
    let b = linear(&mut graph, 8, 8);
    let c = linear(&mut graph, 8, 8);
    graph.connect_nodes(a, b).unwrap();
    graph.connect_nodes(b, c).unwrap();

    let mut connections: Vec<Connection> = graph.connections().to_vec();
    let mut back = connections[1].clone();
    back.id = ConnectionId(99);
    std::mem::swap(&mut back.source, &mut back.target);
    connections.push(back);
    let cyclic = Graph::from_parts(graph.nodes().to_vec(), connections);

    let topology = topology::resolve(cyclic.snapshot());
    assert!(topology.has_residual_cycle);
    assert_eq!(topology.order, vec![a]);
    assert_eq!(topology.unresolved(cyclic.snapshot()), vec![b, c]);
    match topology::connected_order(cyclic.snapshot()) {
        Err(TopologyError::ResidualCycle { unresolved }) => assert_eq!(unresolved, vec![b, c]),
        other => panic!("expected a residual cycle, got {other:?}"),
    }
}

#[test]
fn empty_graph_has_empty_topology() {
    let graph = Graph::new();
    let topology = topology::resolve(graph.snapshot());
    assert!(topology.order.is_empty());
    assert!(topology.sources.is_empty());
    assert!(!topology.has_residual_cycle);
}
