#![allow(dead_code)]

use std::sync::Once;
use nn_blueprint::{Catalog, Graph, NodeId, NodeKind, ParamValue};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Adds a catalog node and overrides the given parameters.
pub fn add(graph: &mut Graph, kind: NodeKind, params: &[(&str, ParamValue)]) -> NodeId {
    let catalog = Catalog::standard();
    let id = graph.add_node(&catalog, &kind).unwrap();
    for (key, value) in params {
        graph.set_param(id, key, value.clone()).unwrap();
    }
    id
}

pub fn linear(graph: &mut Graph, in_features: i64, out_features: i64) -> NodeId {
    add(graph, NodeKind::Linear, &[
        ("in_features", in_features.into()),
        ("out_features", out_features.into()),
    ])
}

/// Serialized form of a graph, for asserting that nothing changed.
pub fn fingerprint(graph: &Graph) -> String {
    serde_json::to_string(graph).unwrap()
}
