use std::collections::HashSet;
use crate::graph::{ConnectionRequest, Node, NodeId, Snapshot};
use crate::kind::{Category, ConvRank, NodeKind};
use super::features::{attention_heads, input_channels, input_features, output_channels, output_features};
use super::Rejection;

pub(super) struct RuleContext<'a> {
    snapshot: Snapshot<'a>,
    request: &'a ConnectionRequest,
    source: Option<&'a Node>,
    target: Option<&'a Node>,
}

impl<'a> RuleContext<'a> {
    pub(super) fn new(snapshot: Snapshot<'a>, request: &'a ConnectionRequest) -> Self {
        Self {
            snapshot,
            request,
            source: snapshot.node(request.source.node),
            target: snapshot.node(request.target.node),
        }
    }

    /// Both endpoints, when both exist and are distinct.
    fn pair(&self) -> Option<(&'a Node, &'a Node)> {
        match (self.source, self.target) {
            (Some(source), Some(target)) if source.id != target.id => Some((source, target)),
            _ => None,
        }
    }
}

pub(super) type Rule = fn(&RuleContext<'_>, &mut Vec<Rejection>);

pub(super) const PIPELINE: &[(&str, Rule)] = &[
    ("structural", structural),
    ("upstream_required", upstream_required),
    ("multi_input_arity", multi_input_arity),
    ("pretrained_entry", pretrained_entry),
    ("category_matrix", category_matrix),
    ("category_redundancy", category_redundancy),
    ("conv_rank", conv_rank),
    ("norm_rank", norm_rank),
    ("dimensions", dimensions),
];

fn label(node: &Node) -> String {
    format!("{} ({})", node.name, node.id)
}

fn structural(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let request = ctx.request;
    if request.source.node == request.target.node {
        reasons.push(Rejection::SelfConnection);
    }
    match ctx.source {
        None => reasons.push(Rejection::MissingSource(request.source.node)),
        Some(node) if node.output_port(&request.source.port).is_none() => {
            reasons.push(Rejection::UnknownOutputPort { node: label(node), port: request.source.port.clone() });
        }
        Some(_) => {}
    }
    match ctx.target {
        None => reasons.push(Rejection::MissingTarget(request.target.node)),
        Some(node) if node.input_port(&request.target.port).is_none() => {
            reasons.push(Rejection::UnknownInputPort { node: label(node), port: request.target.port.clone() });
        }
        Some(_) => {}
    }

    let connections = ctx.snapshot.connections;
    if connections.iter().any(|c| c.source == request.source && c.target == request.target) {
        reasons.push(Rejection::DuplicateConnection);
    }
    if connections.iter().any(|c| c.target == request.target) {
        reasons.push(Rejection::PortOccupied(request.target.clone()));
    }

    if let Some((source, target)) = ctx.pair() {
        if reaches(ctx.snapshot, target.id, source.id) {
            reasons.push(Rejection::Cycle { from: label(source), to: label(target) });
        }
    }
}

/// Whether `to` is reachable from `from` along existing edges.
fn reaches(snapshot: Snapshot<'_>, from: NodeId, to: NodeId) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        stack.extend(snapshot.outgoing(node).map(|c| c.target.node));
    }
    false
}

fn upstream_required(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some(source) = ctx.source else { return };
    if source.category.requires_upstream() && ctx.snapshot.in_degree(source.id) == 0 {
        reasons.push(Rejection::NoUpstream { node: label(source), category: source.category.label() });
    }
}

fn multi_input_arity(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some(source) = ctx.source else { return };
    let connected = ctx.snapshot.in_degree(source.id);
    if source.kind.is_multi_input() && connected < 2 {
        reasons.push(Rejection::NeedsMoreInputs { node: label(source), connected });
    }
}

fn pretrained_entry(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some(target) = ctx.target else { return };
    if target.kind.is_pretrained() {
        reasons.push(Rejection::PretrainedTarget { node: label(target) });
    }
}

fn transition_hint(from: Category, to: Category) -> Option<&'static str> {
    use Category::*;
    match (from, to) {
        (Models, BasicLayers) => Some("a pretrained model already ends in its own classifier, attach an activation or utility instead"),
        (Models, ConvLayers | PoolingLayers | NormalizationLayers) => Some("the pretrained backbone already contains its own feature extractor"),
        (Models, RecurrentLayers | AttentionLayers) => Some("a pretrained model emits a fixed feature vector, not a sequence"),
        (Models, Models) => Some("two pretrained models cannot be chained directly"),
        (BasicLayers, ConvLayers | PoolingLayers) => Some("a dense layer emits a flat vector, reshape it before spatial layers"),
        (BasicLayers, NormalizationLayers) => Some("dense features need a 1-D normalization placed through a utility adapter"),
        (ConvLayers | PoolingLayers | NormalizationLayers, RecurrentLayers) => Some("reshape spatial features into a sequence before a recurrent layer"),
        (ConvLayers | PoolingLayers | NormalizationLayers, AttentionLayers) => Some("reshape spatial features into a sequence before an attention layer"),
        _ => None,
    }
}

fn category_matrix(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some((source, target)) = ctx.pair() else { return };
    if source.category.is_spatial() && target.category == Category::BasicLayers {
        if target.kind != NodeKind::Flatten {
            reasons.push(Rejection::NeedsFlatten { from: label(source), to: label(target) });
        }
        return;
    }
    if !source.category.can_feed(target.category) {
        reasons.push(Rejection::CategoryMismatch {
            from: source.category.label(),
            to: target.category.label(),
            hint: transition_hint(source.category, target.category),
        });
    }
}

fn category_redundancy(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some((source, target)) = ctx.pair() else { return };
    if source.category == target.category && source.category.rejects_stacking() {
        reasons.push(Rejection::RedundantStacking(source.category.label()));
    }
}

fn conv_rank(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some((source, target)) = ctx.pair() else { return };
    if let (Some(from_rank), Some(to_rank)) = (source.kind.conv_rank(), target.kind.conv_rank()) {
        if from_rank != to_rank {
            reasons.push(Rejection::RankMismatch { from: label(source), from_rank, to: label(target), to_rank });
        }
    }
}

/// Dense and embedding layers produce the flat or sequence features a 1-D normalization expects.
fn produces_flat_features(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Linear | NodeKind::Embedding)
}

fn norm_rank(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some((source, target)) = ctx.pair() else { return };
    if !target.kind.is_ranked_norm() {
        return;
    }
    let Some(rank) = target.kind.conv_rank() else { return };
    // A ranked source of another rank is reported by conv_rank.
    if source.kind.conv_rank().is_some() {
        return;
    }
    if rank == ConvRank::One && produces_flat_features(&source.kind) {
        return;
    }
    reasons.push(Rejection::NormRankMismatch { from: label(source), to: label(target), rank });
}

fn dimensions(ctx: &RuleContext<'_>, reasons: &mut Vec<Rejection>) {
    let Some((source, target)) = ctx.pair() else { return };

    if let Some((width_key, heads_key)) = attention_heads(&target.kind) {
        let width = target.count(width_key);
        if let (Some(width), Some(heads)) = (width, target.count(heads_key)) {
            if heads > 0 && width % heads != 0 {
                reasons.push(Rejection::HeadsIndivisible { node: label(target), width, heads });
            }
        }
        if let (Some(features), Some(width)) = (output_features(source), width) {
            if features != width {
                reasons.push(Rejection::AttentionWidthMismatch { from: label(source), to: label(target), features, width });
            }
        }
    } else if source.kind == NodeKind::Embedding && target.kind.is_recurrent() {
        if let (Some(embedding_dim), Some(input_size)) = (source.count("embedding_dim"), target.count("input_size")) {
            if embedding_dim != input_size {
                reasons.push(Rejection::EmbeddingMismatch { from: label(source), to: label(target), embedding_dim, input_size });
            }
        }
    } else if let (Some(output), Some(input)) = (output_features(source), input_features(target)) {
        if output != input {
            reasons.push(Rejection::FeatureMismatch { from: label(source), to: label(target), output, input });
        }
    }

    if let (Some(output), Some(input)) = (output_channels(source), input_channels(target)) {
        if output != input {
            reasons.push(Rejection::ChannelMismatch { from: label(source), to: label(target), output, input });
        }
    }

    if matches!(target.kind, NodeKind::Add | NodeKind::Multiply) {
        for existing in ctx.snapshot.incoming(target.id) {
            let Some(other) = ctx.snapshot.node(existing.source.node) else { continue };
            let mismatch = match (output_features(source), output_features(other)) {
                (Some(found), Some(expected)) => (found != expected).then_some(("features", found, expected)),
                _ => match (output_channels(source), output_channels(other)) {
                    (Some(found), Some(expected)) => (found != expected).then_some(("channels", found, expected)),
                    _ => None,
                },
            };
            if let Some((unit, found, expected)) = mismatch {
                reasons.push(Rejection::OperandMismatch { from: label(source), to: label(target), unit, found, expected });
            }
        }
    }
}
