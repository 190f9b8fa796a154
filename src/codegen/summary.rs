//! Human-readable model summary and parameter estimates.
use std::fmt::Write;
use crate::graph::Node;
use crate::kind::{Category, NodeKind};
use super::python::ParamReader;

/// Rough parameter count of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParameterEstimate {
    pub count: u64,
    /// The kind has no formula and `count` is the configured nominal value.
    pub nominal: bool,
}

fn exact(count: u64) -> Option<ParameterEstimate> {
    Some(ParameterEstimate { count, nominal: false })
}

/// Multiplies the factors, saturating at `u64::MAX`. Adopted graphs carry unbounded counts.
fn product(factors: &[u64]) -> u64 {
    factors.iter().fold(1u64, |acc, f| acc.saturating_mul(*f))
}

fn count(node: &Node, key: &str) -> Option<u64> {
    node.count(key).map(|c| c as u64)
}

fn formula(node: &Node) -> Option<ParameterEstimate> {
    let p = ParamReader::new(node);
    let bias = p.truthy("bias", true);
    match node.category {
        Category::BasicLayers if node.kind == NodeKind::Linear => {
            let (input, output) = (count(node, "in_features")?, count(node, "out_features")?);
            exact(product(&[input, output]).saturating_add(if bias { output } else { 0 }))
        }
        Category::ConvLayers => {
            let (input, output, kernel) = (count(node, "in_channels")?, count(node, "out_channels")?, count(node, "kernel_size")?);
            exact(product(&[input, output, kernel, kernel]).saturating_add(if bias { output } else { 0 }))
        }
        Category::NormalizationLayers => {
            let features = match node.kind {
                NodeKind::LayerNorm => count(node, "normalized_shape")?,
                NodeKind::GroupNorm => count(node, "num_channels")?,
                _ => count(node, "num_features")?,
            };
            exact(features.saturating_mul(2))
        }
        Category::RecurrentLayers => {
            let (input, hidden) = (count(node, "input_size")?, count(node, "hidden_size")?);
            let layers = count(node, "num_layers").unwrap_or(1);
            let directions = if p.truthy("bidirectional", false) { 2 } else { 1 };
            exact(product(&[4, input.saturating_add(hidden), hidden, layers, directions]))
        }
        _ => None,
    }
}

/// Estimates `node`, using `nominal` where no formula applies or its parameters are not numeric.
pub fn estimate_parameters(node: &Node, nominal: u64) -> ParameterEstimate {
    formula(node).unwrap_or(ParameterEstimate { count: nominal, nominal: true })
}

/// Groups digits by thousands, `1234567` becomes `1,234,567`.
pub fn with_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Size of `count` float32 parameters in megabytes.
pub fn megabytes(count: u64) -> f64 {
    count as f64 * 4.0 / (1024.0 * 1024.0)
}

pub(super) struct SummaryRow<'a> {
    pub name: &'a str,
    pub display: &'a str,
    pub node: &'a Node,
    pub estimate: ParameterEstimate,
}

pub(super) struct SummaryInput<'a> {
    pub rows: &'a [SummaryRow<'a>],
    pub inputs: &'a [&'a str],
    pub outputs: &'a [&'a str],
    pub isolated: &'a [&'a Node],
}

pub(super) fn render(model_name: &str, summary: &SummaryInput<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model: {model_name}");
    let _ = writeln!(out, "{:<24} {:<32} {:>14}", "Layer", "Type", "Params (est.)");
    let _ = writeln!(out, "{}", "-".repeat(72));
    for row in summary.rows {
        let marker = if row.estimate.nominal { "~" } else { "" };
        let _ = writeln!(out, "{:<24} {:<32} {:>14}",
            row.name, row.display, format!("{marker}{}", with_thousands(row.estimate.count)));
    }
    let _ = writeln!(out, "{}", "-".repeat(72));

    let total = summary.rows.iter().fold(0u64, |acc, r| acc.saturating_add(r.estimate.count));
    let trainable = summary.rows.iter().filter(|r| r.node.category != Category::Models).count();
    let _ = writeln!(out, "Total layers: {}", summary.rows.len());
    let _ = writeln!(out, "Trainable layers: {trainable}");
    let _ = writeln!(out, "Parameter estimate (approximate): {}", with_thousands(total));
    let _ = writeln!(out, "Estimated size: {:.2} MB (float32)", megabytes(total));
    if summary.rows.iter().any(|r| r.estimate.nominal) {
        let _ = writeln!(out, "Layers marked ~ use a nominal estimate.");
    }
    if !summary.inputs.is_empty() {
        let _ = writeln!(out, "Input layers: {}", summary.inputs.join(", "));
    }
    if !summary.outputs.is_empty() {
        let _ = writeln!(out, "Output layers: {}", summary.outputs.join(", "));
    }
    if !summary.isolated.is_empty() {
        let names: Vec<String> = summary.isolated.iter().map(|n| format!("{} ({})", n.name, n.id)).collect();
        let _ = writeln!(out, "Unconnected components: {}", names.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::graph::{NodeId, ParamValue};

    fn node(kind: NodeKind) -> Node {
        Catalog::standard().entry(&kind).unwrap().instantiate(NodeId(0))
    }

    #[test]
    fn dense_and_conv_formulas() {
        assert_eq!(estimate_parameters(&node(NodeKind::Linear), 1000).count, 512 * 256 + 256);
        assert_eq!(estimate_parameters(&node(NodeKind::Conv2d), 1000).count, 3 * 64 * 9 + 64);
        assert_eq!(estimate_parameters(&node(NodeKind::BatchNorm2d), 1000).count, 128);
    }

    #[test]
    fn recurrent_formula() {
        let lstm = node(NodeKind::Lstm);
        assert_eq!(estimate_parameters(&lstm, 1000).count, 4 * (128 + 256) * 256);
    }

    #[test]
    fn other_kinds_are_nominal() {
        let estimate = estimate_parameters(&node(NodeKind::Relu), 1000);
        assert!(estimate.nominal);
        assert_eq!(estimate.count, 1000);
    }

    #[test]
    fn huge_counts_saturate() {
        let mut dense = node(NodeKind::Linear);
        for param in dense.params.iter_mut().filter(|p| p.key.ends_with("_features")) {
            param.value = ParamValue::Int(1_000_000_000_000);
        }
        let estimate = estimate_parameters(&dense, 1000);
        assert_eq!(estimate.count, u64::MAX);
        assert!(!estimate.nominal);
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(with_thousands(0), "0");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1000), "1,000");
        assert_eq!(with_thousands(1234567), "1,234,567");
    }
}
