//! Table-driven readers for the feature sizes and channel counts a node declares.
//!
//! Every reader returns `None` when the value is not statically known, which disables the check that
//! would have used it.
use crate::graph::Node;
use crate::kind::NodeKind;

/// Where a dimension lives in a node's parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
struct DimSource {
    key: &'static str,
    /// Used only when the parameter is missing entirely, never when it is present but unset.
    fallback: Option<usize>,
}

const fn key(key: &'static str) -> Option<DimSource> {
    Some(DimSource { key, fallback: None })
}

fn output_features_source(kind: &NodeKind) -> Option<DimSource> {
    use NodeKind::*;
    match kind {
        Linear => key("out_features"),
        Embedding => key("embedding_dim"),
        ResNet | Vgg | MobileNetV2 | EfficientNet | DenseNet => Some(DimSource { key: "num_classes", fallback: Some(1000) }),
        _ => None,
    }
}

fn input_features_source(kind: &NodeKind) -> Option<DimSource> {
    use NodeKind::*;
    match kind {
        Linear => key("in_features"),
        Lstm | Gru | Rnn => key("input_size"),
        MultiheadAttention => key("embed_dim"),
        SelfAttention => key("hidden_size"),
        _ => None,
    }
}

fn output_channels_source(kind: &NodeKind) -> Option<DimSource> {
    use NodeKind::*;
    match kind {
        Conv1d | Conv2d | Conv3d | DepthwiseConv2d | TransposedConv2d => key("out_channels"),
        BatchNorm1d | BatchNorm2d | BatchNorm3d | InstanceNorm2d => key("num_features"),
        GroupNorm => key("num_channels"),
        _ => None,
    }
}

fn input_channels_source(kind: &NodeKind) -> Option<DimSource> {
    use NodeKind::*;
    match kind {
        Conv1d | Conv2d | Conv3d | DepthwiseConv2d | TransposedConv2d => key("in_channels"),
        BatchNorm1d | BatchNorm2d | BatchNorm3d | InstanceNorm2d => key("num_features"),
        GroupNorm => key("num_channels"),
        _ => None,
    }
}

fn read(node: &Node, source: Option<DimSource>) -> Option<usize> {
    let source = source?;
    match node.param(source.key) {
        Some(value) => value.as_usize(),
        None => source.fallback,
    }
}

pub fn output_features(node: &Node) -> Option<usize> {
    read(node, output_features_source(&node.kind))
}

pub fn input_features(node: &Node) -> Option<usize> {
    read(node, input_features_source(&node.kind))
}

pub fn output_channels(node: &Node) -> Option<usize> {
    read(node, output_channels_source(&node.kind))
}

pub fn input_channels(node: &Node) -> Option<usize> {
    read(node, input_channels_source(&node.kind))
}

/// Width and head count of an attention node, as parameter keys.
pub fn attention_heads(kind: &NodeKind) -> Option<(&'static str, &'static str)> {
    match kind {
        NodeKind::MultiheadAttention => Some(("embed_dim", "num_heads")),
        NodeKind::SelfAttention => Some(("hidden_size", "num_attention_heads")),
        _ => None,
    }
}
