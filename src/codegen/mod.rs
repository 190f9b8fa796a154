//! PyTorch source emission.
//!
//! Nodes attached to at least one edge are written in topological order: each becomes a
//! `{prefix}_{index}` attribute declared in `__init__` and a statement in `forward()` producing
//! `x{index}`. Nodes without edges are listed commented out and never take part in `forward()`.
mod declarations;
mod forward;
pub mod python;
pub mod registry;
pub mod summary;
pub mod template;

use std::collections::HashMap;
use serde::Serialize;
use crate::config::EmitterConfig;
use crate::graph::{Node, NodeId, Snapshot};
use crate::topology::{self, TopologyError};
use self::forward::ForwardStep;
use self::python::{py_string, single_line, ParamReader};
use self::registry::{EmitRule, EmitterRegistry};
use self::summary::{estimate_parameters, SummaryInput, SummaryRow};

pub const UNCONNECTED_HEADER: &str = "# ===== Unconnected components (not part of forward) =====";
const TORCHVISION_DEPENDENCY: &str = "torchvision>=0.10.0";
const TRANSFORMERS_DEPENDENCY: &str = "transformers>=4.0.0";

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Something emitted in degraded form. Emission still succeeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum EmitWarning {
    #[error("{node} has kind \"{kind}\" without a code template; emitted an nn.Identity placeholder")]
    UnknownKind { node: NodeId, kind: String },
    #[error("The {template} template leaves {{{{{placeholder}}}}} unresolved")]
    UnresolvedPlaceholder { template: &'static str, placeholder: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneratedCode {
    /// `__init__` body, unindented.
    pub declarations: String,
    /// `forward()` body, unindented.
    pub forward_body: String,
    pub model_source: String,
    pub training_scaffold: String,
    pub inference_scaffold: String,
    pub summary: String,
    pub dependencies: Vec<String>,
    pub warnings: Vec<EmitWarning>,
}

struct Planned<'a> {
    node: &'a Node,
    rule: &'a EmitRule,
    name: String,
}

pub struct Emitter {
    registry: EmitterRegistry,
    config: EmitterConfig,
}

impl Emitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self::with_registry(EmitterRegistry::standard(), config)
    }

    pub fn with_registry(registry: EmitterRegistry, config: EmitterConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    fn plan<'a>(&'a self, node: &'a Node, index: usize, warnings: &mut Vec<EmitWarning>) -> Planned<'a> {
        let (rule, fallback) = self.registry.lookup(&node.kind);
        if fallback {
            log::warn!("No emission rule for kind {} of node {}", node.kind, node.id);
            warnings.push(EmitWarning::UnknownKind { node: node.id, kind: node.kind.to_string() });
        }
        Planned { node, rule, name: format!("{}_{index}", rule.prefix) }
    }

    /// Emits the model for `snapshot`. Fails only when the graph contains a cycle.
    pub fn emit(&self, snapshot: Snapshot<'_>) -> Result<GeneratedCode, CodegenError> {
        let order = topology::connected_order(snapshot)?;
        let mut warnings = Vec::new();

        let connected: Vec<Planned<'_>> = order.iter()
            .filter_map(|id| snapshot.node(*id))
            .enumerate()
            .map(|(i, node)| self.plan(node, i + 1, &mut warnings))
            .collect();
        let isolated: Vec<Planned<'_>> = topology::isolated(snapshot).iter()
            .filter_map(|id| snapshot.node(*id))
            .enumerate()
            .map(|(i, node)| self.plan(node, connected.len() + i + 1, &mut warnings))
            .collect();
        log::debug!("Emitting {} connected and {} unconnected nodes", connected.len(), isolated.len());

        let declarations = Self::declarations(&connected, &isolated);
        let forward_body = self.forward_body(snapshot, &connected);
        let dependencies = self.dependencies(&connected);
        let summary = self.summary(snapshot, &connected, &isolated);

        let uses_torchvision = connected.iter().any(|p| p.node.kind.is_vision_backbone());
        let level2 = self.config.indent(2);
        let layers = template::indent(&declarations, &level2);
        let forward_code = template::indent(&forward_body, &level2);
        let model_summary = template::indent(&self.summary_prints(&connected), &level2);
        let values = [
            ("MODEL_NAME", self.config.model_name.as_str()),
            ("INPUT", self.config.input_symbol.as_str()),
            ("TORCHVISION_IMPORT", if uses_torchvision { "import torchvision.models as models" } else { "" }),
            ("LAYERS", layers.as_str()),
            ("FORWARD_CODE", forward_code.as_str()),
            ("MODEL_SUMMARY", model_summary.as_str()),
        ];

        let templates = &self.config.templates;
        let mut render = |name: &'static str, custom: &Option<String>, bundled: &str| {
            let source = custom.as_deref().unwrap_or(bundled);
            let known = |placeholder: &String| values.iter().any(|(key, _)| *key == placeholder.as_str());
            for placeholder in template::unresolved(source).into_iter().filter(|p| !known(p)) {
                log::warn!("Template {name} leaves {{{{{placeholder}}}}} unresolved");
                warnings.push(EmitWarning::UnresolvedPlaceholder { template: name, placeholder });
            }
            template::render(source, &values)
        };
        let model_source = render("model", &templates.model, template::MODEL_TEMPLATE);
        let training_scaffold = render("training", &templates.training, template::TRAINING_TEMPLATE);
        let inference_scaffold = render("inference", &templates.inference, template::INFERENCE_TEMPLATE);

        Ok(GeneratedCode {
            declarations,
            forward_body,
            model_source,
            training_scaffold,
            inference_scaffold,
            summary,
            dependencies,
            warnings,
        })
    }

    fn declarations(connected: &[Planned<'_>], isolated: &[Planned<'_>]) -> String {
        let mut lines: Vec<String> = connected.iter()
            .filter_map(|p| p.rule.declare.map(|declare| declare(&ParamReader::new(p.node), &p.name)))
            .collect();
        if !isolated.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(UNCONNECTED_HEADER.to_string());
            for planned in isolated {
                let text = match planned.rule.declare {
                    Some(declare) => declare(&ParamReader::new(planned.node), &planned.name),
                    None => format!("{}: inline {} operation", planned.name, planned.rule.display),
                };
                lines.extend(text.lines().map(|line| format!("# {line}")));
            }
        }
        lines.join("\n")
    }

    fn forward_body(&self, snapshot: Snapshot<'_>, connected: &[Planned<'_>]) -> String {
        let input = &self.config.input_symbol;
        let mut outputs: HashMap<NodeId, String> = HashMap::new();
        let mut blocks: Vec<String> = Vec::new();
        for (i, planned) in connected.iter().enumerate() {
            let output = format!("x{}", i + 1);
            let mut inputs: Vec<String> = snapshot.incoming(planned.node.id)
                .filter_map(|c| outputs.get(&c.source.node).cloned())
                .collect();
            if inputs.is_empty() {
                inputs.push(input.clone());
            }
            let step = ForwardStep {
                name: &planned.name,
                inputs: &inputs,
                output: &output,
                params: ParamReader::new(planned.node),
            };
            let mut block = vec![format!("# {}", single_line(&planned.node.name))];
            block.extend((planned.rule.forward)(&step));
            blocks.push(block.join("\n"));
            outputs.insert(planned.node.id, output);
        }

        let sinks: Vec<&str> = connected.iter()
            .filter(|p| snapshot.outgoing(p.node.id).next().is_none())
            .filter_map(|p| outputs.get(&p.node.id).map(String::as_str))
            .collect();
        let returned = match sinks.as_slice() {
            [] => connected.last()
                .and_then(|p| outputs.get(&p.node.id).cloned())
                .unwrap_or_else(|| input.clone()),
            [sink] => sink.to_string(),
            many => format!("({})", many.join(", ")),
        };
        blocks.push(format!("return {returned}"));
        blocks.join("\n\n")
    }

    fn dependencies(&self, connected: &[Planned<'_>]) -> Vec<String> {
        let mut dependencies = self.config.base_dependencies.clone();
        let mut require = |dependency: &str| {
            if !dependencies.iter().any(|d| d == dependency) {
                dependencies.push(dependency.to_string());
            }
        };
        if connected.iter().any(|p| p.node.kind.is_vision_backbone()) {
            require(TORCHVISION_DEPENDENCY);
        }
        if connected.iter().any(|p| p.node.kind.is_transformers_model()) {
            require(TRANSFORMERS_DEPENDENCY);
        }
        dependencies
    }

    fn summary(&self, snapshot: Snapshot<'_>, connected: &[Planned<'_>], isolated: &[Planned<'_>]) -> String {
        if connected.is_empty() && isolated.is_empty() {
            return format!("Model: {}\nThe model is empty. Add layers to the canvas to generate code.\n", self.config.model_name);
        }
        let nominal = self.config.nominal_parameter_estimate;
        let rows: Vec<SummaryRow<'_>> = connected.iter()
            .map(|p| SummaryRow {
                name: &p.name,
                display: p.rule.display,
                node: p.node,
                estimate: estimate_parameters(p.node, nominal),
            })
            .collect();
        let inputs: Vec<&str> = connected.iter()
            .filter(|p| snapshot.in_degree(p.node.id) == 0)
            .map(|p| p.name.as_str())
            .collect();
        let outputs: Vec<&str> = connected.iter()
            .filter(|p| snapshot.outgoing(p.node.id).next().is_none())
            .map(|p| p.name.as_str())
            .collect();
        let isolated: Vec<&Node> = isolated.iter().map(|p| p.node).collect();
        summary::render(&self.config.model_name, &SummaryInput {
            rows: &rows,
            inputs: &inputs,
            outputs: &outputs,
            isolated: &isolated,
        })
    }

    fn summary_prints(&self, connected: &[Planned<'_>]) -> String {
        let mut lines = vec![format!("print({})", py_string(&format!("Model: {}", self.config.model_name)))];
        if connected.is_empty() {
            lines.push(format!("print({})", py_string("The model is empty.")));
        }
        for planned in connected {
            lines.push(format!("print({})", py_string(&format!("  {}: {}", planned.name, planned.rule.display))));
        }
        lines.join("\n")
    }
}

/// Emits `snapshot` with the standard registry.
pub fn emit(snapshot: Snapshot<'_>, config: &EmitterConfig) -> Result<GeneratedCode, CodegenError> {
    Emitter::new(config.clone()).emit(snapshot)
}
