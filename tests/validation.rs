use paste::paste;
use nn_blueprint::graph::{ConnectionRequest, Endpoint, GraphError, ParamValue};
use nn_blueprint::{topology, ConvRank, Graph, NodeId, NodeKind, Rejection};

mod common;
use common::{add, fingerprint, linear};

fn request(graph: &Graph, from: NodeId, to: NodeId) -> ConnectionRequest {
    let source = graph.node(from).unwrap().first_output().unwrap().clone();
    let target = graph.node(to).unwrap().first_input().unwrap().clone();
    ConnectionRequest::new(Endpoint::new(from, source), Endpoint::new(to, target))
}

fn self_connection() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 8);
    let request = request(&graph, dense, dense);
    (graph, request)
}

fn occupied_input() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let a = linear(&mut graph, 4, 16);
    let b = linear(&mut graph, 4, 16);
    let c = linear(&mut graph, 16, 2);
    graph.connect_nodes(a, c).unwrap();
    let request = request(&graph, b, c);
    (graph, request)
}

fn dense_feature_mismatch() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let a = linear(&mut graph, 4, 10);
    let b = linear(&mut graph, 20, 2);
    let request = request(&graph, a, b);
    (graph, request)
}

fn activation_without_upstream() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let relu = add(&mut graph, NodeKind::Relu, &[]);
    let dense = linear(&mut graph, 8, 2);
    let request = request(&graph, relu, dense);
    (graph, request)
}

fn conv_rank_into_pooling() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let first = add(&mut graph, NodeKind::Conv2d, &[]);
    let second = add(&mut graph, NodeKind::Conv2d, &[("in_channels", 64i64.into())]);
    let pool = add(&mut graph, NodeKind::MaxPool1d, &[]);
    graph.connect_nodes(first, second).unwrap();
    let request = request(&graph, second, pool);
    (graph, request)
}

fn cycle_back_edge() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let a = linear(&mut graph, 8, 8);
    let b = linear(&mut graph, 8, 8);
    graph.connect_nodes(a, b).unwrap();
    let request = request(&graph, b, a);
    (graph, request)
}

fn conv_into_dense() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let conv = add(&mut graph, NodeKind::Conv2d, &[]);
    let dense = linear(&mut graph, 64, 10);
    let request = request(&graph, conv, dense);
    (graph, request)
}

fn into_pretrained() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 8);
    let backbone = add(&mut graph, NodeKind::ResNet, &[]);
    let target = graph.node(backbone).unwrap().first_input().cloned().unwrap_or_else(|| "input".into());
    let request = ConnectionRequest::new(Endpoint::new(dense, "output"), Endpoint::new(backbone, target));
    (graph, request)
}

fn indivisible_heads() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 512);
    let attention = add(&mut graph, NodeKind::MultiheadAttention, &[("num_heads", 7i64.into())]);
    let request = ConnectionRequest::new(Endpoint::new(dense, "output"), Endpoint::new(attention, "query"));
    (graph, request)
}

fn stacked_activations() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 8);
    let relu = add(&mut graph, NodeKind::Relu, &[]);
    let tanh = add(&mut graph, NodeKind::Tanh, &[]);
    graph.connect_nodes(dense, relu).unwrap();
    let request = request(&graph, relu, tanh);
    (graph, request)
}

fn unknown_port() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let a = linear(&mut graph, 4, 8);
    let b = linear(&mut graph, 8, 2);
    let request = ConnectionRequest::new(Endpoint::new(a, "output"), Endpoint::new(b, "side"));
    (graph, request)
}

fn merge_with_one_input() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 8);
    let sum = add(&mut graph, NodeKind::Add, &[]);
    let head = linear(&mut graph, 8, 2);
    graph.connect_ports(dense, sum, "input1").unwrap();
    let request = request(&graph, sum, head);
    (graph, request)
}

fn norm_after_activation() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let conv = add(&mut graph, NodeKind::Conv1d, &[]);
    let relu = add(&mut graph, NodeKind::Relu, &[]);
    let norm = add(&mut graph, NodeKind::BatchNorm2d, &[]);
    graph.connect_nodes(conv, relu).unwrap();
    let request = request(&graph, relu, norm);
    (graph, request)
}

fn norm_after_dropout() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 32);
    let dropout = add(&mut graph, NodeKind::Dropout, &[]);
    let norm = add(&mut graph, NodeKind::BatchNorm3d, &[]);
    graph.connect_nodes(dense, dropout).unwrap();
    let request = request(&graph, dropout, norm);
    (graph, request)
}

fn conv_channel_mismatch() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let first = add(&mut graph, NodeKind::Conv2d, &[]);
    let second = add(&mut graph, NodeKind::Conv2d, &[("in_channels", 32i64.into())]);
    let request = request(&graph, first, second);
    (graph, request)
}

fn embedding_into_recurrent() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let embed = add(&mut graph, NodeKind::Embedding, &[("embedding_dim", 300i64.into())]);
    let lstm = add(&mut graph, NodeKind::Lstm, &[("input_size", 128i64.into())]);
    let request = request(&graph, embed, lstm);
    (graph, request)
}

fn attention_width_mismatch() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 256);
    let attention = add(&mut graph, NodeKind::MultiheadAttention, &[]);
    let request = ConnectionRequest::new(Endpoint::new(dense, "output"), Endpoint::new(attention, "query"));
    (graph, request)
}

fn duplicate_edge() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let a = linear(&mut graph, 4, 8);
    let b = linear(&mut graph, 8, 2);
    graph.connect_nodes(a, b).unwrap();
    let request = request(&graph, a, b);
    (graph, request)
}

fn pretrained_into_dense() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let backbone = add(&mut graph, NodeKind::ResNet, &[]);
    let dense = linear(&mut graph, 1000, 10);
    let request = request(&graph, backbone, dense);
    (graph, request)
}

fn missing_source() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 8);
    let request = ConnectionRequest::new(Endpoint::new(NodeId(99), "output"), Endpoint::new(dense, "input"));
    (graph, request)
}

fn missing_target() -> (Graph, ConnectionRequest) {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 8);
    let request = ConnectionRequest::new(Endpoint::new(dense, "output"), Endpoint::new(NodeId(99), "input"));
    (graph, request)
}

/// The request must be refused with a matching reason and leave the graph untouched.
fn assert_rejected(mut graph: Graph, request: ConnectionRequest, expected: impl Fn(&Rejection) -> bool) {
    let before = fingerprint(&graph);
    let result = graph.validate(&request);
    assert!(!result.accepted());
    assert!(result.contains(&expected), "unexpected reasons: {result}");
    assert!(result.messages().iter().all(|m| !m.is_empty()));
    match graph.connect(request) {
        Err(GraphError::Rejected(again)) => assert_eq!(again, result),
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(fingerprint(&graph), before);
}

macro_rules! rejection_test {
    ($scenario:ident, $expected:pat) => {
        paste! {
            #[test]
            fn [<rejects_ $scenario>]() {
                common::init_logging();
                let (graph, request) = $scenario();
                assert_rejected(graph, request, |reason| matches!(reason, $expected));
            }
        }
    };
}

rejection_test!(self_connection, Rejection::SelfConnection);
rejection_test!(occupied_input, Rejection::PortOccupied(_));
rejection_test!(dense_feature_mismatch, Rejection::FeatureMismatch { output: 10, input: 20, .. });
rejection_test!(activation_without_upstream, Rejection::NoUpstream { .. });
rejection_test!(conv_rank_into_pooling, Rejection::RankMismatch { .. });
rejection_test!(cycle_back_edge, Rejection::Cycle { .. });
rejection_test!(conv_into_dense, Rejection::NeedsFlatten { .. });
rejection_test!(into_pretrained, Rejection::PretrainedTarget { .. });
rejection_test!(indivisible_heads, Rejection::HeadsIndivisible { width: 512, heads: 7, .. });
rejection_test!(stacked_activations, Rejection::RedundantStacking(_));
rejection_test!(unknown_port, Rejection::UnknownInputPort { .. });
rejection_test!(merge_with_one_input, Rejection::NeedsMoreInputs { connected: 1, .. });
rejection_test!(norm_after_activation, Rejection::NormRankMismatch { rank: ConvRank::Two, .. });
rejection_test!(norm_after_dropout, Rejection::NormRankMismatch { rank: ConvRank::Three, .. });
rejection_test!(conv_channel_mismatch, Rejection::ChannelMismatch { output: 64, input: 32, .. });
rejection_test!(embedding_into_recurrent, Rejection::EmbeddingMismatch { embedding_dim: 300, input_size: 128, .. });
rejection_test!(attention_width_mismatch, Rejection::AttentionWidthMismatch { features: 256, width: 512, .. });
rejection_test!(duplicate_edge, Rejection::DuplicateConnection);
rejection_test!(pretrained_into_dense, Rejection::CategoryMismatch { from: "pretrained model", to: "basic layer", hint: Some(_) });
rejection_test!(missing_source, Rejection::MissingSource(NodeId(99)));
rejection_test!(missing_target, Rejection::MissingTarget(NodeId(99)));

#[test]
fn flatten_adapts_conv_output_for_dense_layers() {
    common::init_logging();
    let mut graph = Graph::new();
    let conv = add(&mut graph, NodeKind::Conv2d, &[]);
    let flatten = add(&mut graph, NodeKind::Flatten, &[]);
    let result = graph.validate(&request(&graph, conv, flatten));
    assert!(result.accepted(), "{result}");
}

#[test]
fn normalization_follows_a_layer_of_its_rank() {
    common::init_logging();
    let mut graph = Graph::new();
    let conv = add(&mut graph, NodeKind::Conv2d, &[]);
    let pool = add(&mut graph, NodeKind::MaxPool2d, &[]);
    let norm = add(&mut graph, NodeKind::BatchNorm2d, &[]);
    graph.connect_nodes(conv, pool).unwrap();
    let result = graph.validate(&request(&graph, pool, norm));
    assert!(result.accepted(), "{result}");
    assert!(graph.validate(&request(&graph, conv, norm)).accepted());

    let conv1d = add(&mut graph, NodeKind::Conv1d, &[]);
    let result = graph.validate(&request(&graph, conv1d, norm));
    assert_eq!(result.reasons.len(), 1, "{result}");
    assert!(matches!(result.reasons[0], Rejection::RankMismatch { .. }));
}

#[test]
fn category_hint_is_part_of_the_message() {
    let (graph, request) = pretrained_into_dense();
    let result = graph.validate(&request);
    assert!(result.messages().iter().any(|m| m.contains("already ends in its own classifier")), "{result}");
}

#[test]
fn unknown_parameter_values_disable_checks() {
    common::init_logging();
    let mut graph = Graph::new();
    let a = linear(&mut graph, 4, 10);
    let b = linear(&mut graph, 20, 2);
    graph.set_param(a, "out_features", ParamValue::Null).unwrap();
    assert!(graph.connect_nodes(a, b).is_ok());
}

#[test]
fn every_reason_is_reported() {
    common::init_logging();
    let mut graph = Graph::new();
    let relu = add(&mut graph, NodeKind::Relu, &[]);
    let sigmoid = add(&mut graph, NodeKind::Sigmoid, &[]);
    let result = graph.validate(&request(&graph, relu, sigmoid));
    assert!(result.contains(|r| matches!(r, Rejection::NoUpstream { .. })));
    assert!(result.contains(|r| matches!(r, Rejection::RedundantStacking(_))));
}

#[test]
fn add_operands_must_agree() {
    common::init_logging();
    let mut graph = Graph::new();
    let a = linear(&mut graph, 4, 8);
    let b = linear(&mut graph, 4, 16);
    let sum = add(&mut graph, NodeKind::Add, &[]);
    graph.connect_ports(a, sum, "input1").unwrap();
    let result = graph.validate(&ConnectionRequest::new(Endpoint::new(b, "output"), Endpoint::new(sum, "input2")));
    assert!(result.contains(|r| matches!(r, Rejection::OperandMismatch { found: 16, expected: 8, .. })), "{result}");
}

#[test]
fn accepted_edges_never_form_a_cycle() {
    common::init_logging();
    let mut graph = Graph::new();
    let nodes: Vec<_> = (0..5).map(|_| linear(&mut graph, 32, 32)).collect();
    for &from in &nodes {
        for &to in &nodes {
            let _ = graph.connect_nodes(from, to);
        }
    }
    assert!(!graph.connections().is_empty());
    let topology = topology::resolve(graph.snapshot());
    assert!(!topology.has_residual_cycle);
    assert_eq!(topology.order.len(), nodes.len());
}

#[test]
fn parameters_are_checked_on_edit() {
    let mut graph = Graph::new();
    let dense = linear(&mut graph, 4, 8);
    let conv = add(&mut graph, NodeKind::Conv2d, &[]);
    assert!(matches!(graph.set_param(dense, "in_features", 0i64), Err(GraphError::ParameterOutOfBounds { .. })));
    assert!(matches!(graph.set_param(dense, "bias", "yes"), Err(GraphError::ParameterType { .. })));
    assert!(matches!(graph.set_param(conv, "padding", "full"), Err(GraphError::InvalidChoice { .. })));
    assert!(matches!(graph.set_param(dense, "units", 3i64), Err(GraphError::UnknownParameter(..))));
    let reshape = add(&mut graph, NodeKind::Reshape, &[]);
    assert!(matches!(graph.set_param(reshape, "shape", "-1,\n64"), Err(GraphError::MultilineText { .. })));
    assert_eq!(graph.node(dense).unwrap().count("in_features"), Some(4));
}

#[test]
fn removing_a_node_drops_its_connections() {
    let mut graph = Graph::new();
    let a = linear(&mut graph, 4, 8);
    let b = linear(&mut graph, 8, 8);
    let c = linear(&mut graph, 8, 2);
    graph.connect_nodes(a, b).unwrap();
    let kept = graph.connect_nodes(b, c).unwrap();
    graph.remove_node(a).unwrap();
    assert_eq!(graph.connections().len(), 1);
    assert_eq!(graph.connections()[0].id, kept);
    let b = graph.node(b).unwrap();
    assert!(b.inputs.iter().all(|p| p.connections.is_empty()));
    assert_eq!(b.outputs[0].connections, vec![kept]);
}
