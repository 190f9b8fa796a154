//! Connection validation.
//!
//! A proposed edge is checked by every rule of [`rules::PIPELINE`] in order. Rules do not short-circuit:
//! each violated rule adds its reasons, and the edge is accepted only when no reason was collected.
pub mod features;
mod rules;

use std::fmt;
use crate::graph::{ConnectionRequest, Endpoint, NodeId, PortId, Snapshot};
use crate::kind::ConvRank;

/// One reason a proposed connection was refused. `Display` is the user-facing message.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("A node cannot be connected to itself")]
    SelfConnection,
    #[error("Source node {0} does not exist")]
    MissingSource(NodeId),
    #[error("Target node {0} does not exist")]
    MissingTarget(NodeId),
    #[error("{node} has no output port \"{port}\"")]
    UnknownOutputPort { node: String, port: PortId },
    #[error("{node} has no input port \"{port}\"")]
    UnknownInputPort { node: String, port: PortId },
    #[error("This connection already exists")]
    DuplicateConnection,
    #[error("Input port {0} already has an incoming connection")]
    PortOccupied(Endpoint),
    #[error("Connecting {from} to {to} would create a cycle")]
    Cycle { from: String, to: String },
    #[error("{node} is a {category} and cannot originate data; connect an upstream layer to it first")]
    NoUpstream { node: String, category: &'static str },
    #[error("{node} needs at least two inputs before its output can be used ({connected} connected)")]
    NeedsMoreInputs { node: String, connected: usize },
    #[error("{node} is a complete pretrained network and cannot take an input")]
    PretrainedTarget { node: String },
    #[error("{from} outputs a multi-dimensional tensor; insert a Flatten layer before {to}")]
    NeedsFlatten { from: String, to: String },
    #[error("A {from} cannot feed a {to}{}", hint_suffix(.hint))]
    CategoryMismatch {
        from: &'static str,
        to: &'static str,
        hint: Option<&'static str>,
    },
    #[error("Stacking a {0} directly after another {0} is redundant")]
    RedundantStacking(&'static str),
    #[error("{from} is {from_rank} but {to} is {to_rank}")]
    RankMismatch {
        from: String,
        from_rank: ConvRank,
        to: String,
        to_rank: ConvRank,
    },
    #[error("{to} normalizes {rank} inputs and must directly follow a {rank} layer, not {from}")]
    NormRankMismatch { from: String, to: String, rank: ConvRank },
    #[error("{from} outputs {output} features but {to} expects {input}")]
    FeatureMismatch {
        from: String,
        to: String,
        output: usize,
        input: usize,
    },
    #[error("{from} outputs {output} channels but {to} expects {input}")]
    ChannelMismatch {
        from: String,
        to: String,
        output: usize,
        input: usize,
    },
    #[error("Embedding dimension {embedding_dim} of {from} does not match input_size {input_size} of {to}")]
    EmbeddingMismatch {
        from: String,
        to: String,
        embedding_dim: usize,
        input_size: usize,
    },
    #[error("Width {width} of {node} is not divisible by its {heads} heads")]
    HeadsIndivisible { node: String, width: usize, heads: usize },
    #[error("{from} outputs {features} features but {to} has width {width}")]
    AttentionWidthMismatch {
        from: String,
        to: String,
        features: usize,
        width: usize,
    },
    #[error("{from} carries {found} {unit} but the other input of {to} carries {expected}")]
    OperandMismatch {
        from: String,
        to: String,
        unit: &'static str,
        found: usize,
        expected: usize,
    },
}

fn hint_suffix(hint: &Option<&'static str>) -> String {
    hint.map(|h| format!(": {h}")).unwrap_or_default()
}

/// Outcome of validating one proposed connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationResult {
    pub reasons: Vec<Rejection>,
}

impl ValidationResult {
    pub fn accepted(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.reasons.iter().map(|r| r.to_string()).collect()
    }

    pub fn contains(&self, predicate: impl Fn(&Rejection) -> bool) -> bool {
        self.reasons.iter().any(predicate)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.accepted() {
            return f.write_str("accepted");
        }
        f.write_str(&self.messages().join("; "))
    }
}

/// Runs every rule against `request`. Never mutates anything.
pub fn validate(snapshot: Snapshot<'_>, request: &ConnectionRequest) -> ValidationResult {
    let context = rules::RuleContext::new(snapshot, request);
    let mut reasons = Vec::new();
    for (name, rule) in rules::PIPELINE {
        let before = reasons.len();
        rule(&context, &mut reasons);
        if reasons.len() > before {
            log::trace!("Rule {name} rejected {} -> {}", request.source, request.target);
        }
    }
    ValidationResult { reasons }
}
