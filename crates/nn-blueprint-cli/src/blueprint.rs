//! JSON description of a graph, replayed through the editing API.
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use nn_blueprint::{Catalog, Category, Graph, GraphError, NodeId, NodeKind, ParamValue, ValidationResult};

#[derive(Debug, Deserialize)]
pub struct NodeSpec {
    /// Handle used by `connections`.
    pub id: String,
    pub kind: NodeKind,
    /// Display name, defaults to the catalog name of the kind.
    #[serde(default)]
    pub name: Option<String>,
    /// Required for kinds the catalog does not know.
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionSpec {
    pub from: String,
    pub to: String,
    /// Target input port, defaults to the first declared input.
    #[serde(default)]
    pub port: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

pub struct Rejected {
    pub from: String,
    pub to: String,
    pub result: ValidationResult,
}

pub struct Built {
    pub graph: Graph,
    pub rejected: Vec<Rejected>,
}

impl Blueprint {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Adds every node, then offers every connection to the validator in file order.
    /// Refused connections are collected rather than treated as errors.
    pub fn build(&self, catalog: &Catalog) -> Result<Built> {
        let mut graph = Graph::new();
        let mut handles: HashMap<&str, NodeId> = HashMap::new();
        for spec in &self.nodes {
            let id = match (&spec.kind, spec.category) {
                (NodeKind::Custom(kind), Some(category)) => graph.add_custom_node(kind, category),
                (NodeKind::Custom(kind), None) => bail!("node \"{}\" has unknown kind \"{kind}\" and no category", spec.id),
                (kind, _) => graph.add_node(catalog, kind)?,
            };
            for (key, value) in &spec.params {
                graph.set_param(id, key, value.clone())
                    .with_context(|| format!("setting {key} on node \"{}\"", spec.id))?;
            }
            if handles.insert(&spec.id, id).is_some() {
                bail!("duplicate node id \"{}\"", spec.id);
            }
            if let Some(name) = &spec.name {
                graph.rename(id, name)?;
            }
        }

        let mut rejected = Vec::new();
        for spec in &self.connections {
            let lookup = |handle: &str| handles.get(handle).copied().ok_or_else(|| anyhow!("unknown node id \"{handle}\""));
            let (source, target) = (lookup(&spec.from)?, lookup(&spec.to)?);
            let attempt = match &spec.port {
                Some(port) => graph.connect_ports(source, target, port),
                None => graph.connect_nodes(source, target),
            };
            match attempt {
                Ok(_) => {}
                Err(GraphError::Rejected(result)) => rejected.push(Rejected {
                    from: spec.from.clone(),
                    to: spec.to.clone(),
                    result,
                }),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(Built { graph, rejected })
    }
}
