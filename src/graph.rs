//! Node and connection records plus the editable graph aggregate.
//!
//! The validator, the topology resolver and the emitter never hold on to a [`Graph`]; they work on a
//! borrowed [`Snapshot`] of its two collections, so an external canvas can hand over its own
//! node/connection arrays without going through the mutation API.
use std::fmt;
use serde::{Deserialize, Serialize};
use crate::catalog::{Catalog, CatalogError};
use crate::kind::{Category, NodeKind};
use crate::validator::{self, ValidationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Port name, unique within one side of a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub String);

impl From<&str> for PortId {
    fn from(value: &str) -> Self {
        PortId(value.to_string())
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParamType {
    Number,
    Text,
    Boolean,
    Choice,
    Range,
}

/// A parameter value as edited on the canvas. `Null` means the value is not statically known.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Numeric reading of the value. Numeric text is accepted, non-finite values are not.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            ParamValue::Int(i) => *i as f64,
            ParamValue::Float(x) => *x,
            ParamValue::Text(s) => s.trim().parse::<f64>().ok()?,
            ParamValue::Null | ParamValue::Bool(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Non-negative integral reading, used for feature and channel counts.
    pub fn as_usize(&self) -> Option<usize> {
        let value = self.as_f64()?;
        (value >= 0.0 && value.fract() == 0.0).then_some(value as usize)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("null"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub param_type: ParamType,
    pub value: ParamValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Parameter {
    /// Checks a candidate value against this parameter's type, options and bounds.
    fn check(&self, node: NodeId, value: &ParamValue) -> Result<ParamValue, GraphError> {
        if value.is_null() {
            return Ok(ParamValue::Null);
        }
        let type_error = || GraphError::ParameterType {
            node,
            key: self.key.clone(),
            expected: self.param_type,
            value: value.clone(),
        };
        match self.param_type {
            ParamType::Number | ParamType::Range => {
                let number = match value {
                    ParamValue::Int(_) | ParamValue::Float(_) => value.as_f64().ok_or_else(type_error)?,
                    _ => return Err(type_error()),
                };
                let below = self.min.is_some_and(|min| number < min);
                let above = self.max.is_some_and(|max| number > max);
                if below || above {
                    return Err(GraphError::ParameterOutOfBounds {
                        node,
                        key: self.key.clone(),
                        value: number,
                        min: self.min,
                        max: self.max,
                    });
                }
                Ok(value.clone())
            }
            ParamType::Boolean => value.as_bool().map(ParamValue::Bool).ok_or_else(type_error),
            ParamType::Text => {
                let text = value.as_text().ok_or_else(type_error)?;
                if text.contains(['\n', '\r']) {
                    return Err(GraphError::MultilineText { node, key: self.key.clone() });
                }
                Ok(ParamValue::from(text))
            }
            ParamType::Choice => {
                let choice = match value {
                    ParamValue::Text(s) => s.clone(),
                    ParamValue::Int(i) => i.to_string(),
                    _ => return Err(type_error()),
                };
                if !self.options.is_empty() && !self.options.contains(&choice) {
                    return Err(GraphError::InvalidChoice {
                        node,
                        key: self.key.clone(),
                        value: choice,
                    });
                }
                Ok(ParamValue::Text(choice))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub name: String,
    /// Declared tensor shape, `None` entries are free dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<Option<i64>>>,
    /// Connections currently attached to this port.
    #[serde(default)]
    pub connections: Vec<ConnectionId>,
}

impl Port {
    pub fn new(name: &str) -> Self {
        Self {
            id: PortId::from(name),
            name: name.to_string(),
            shape: None,
            connections: vec![],
        }
    }

    pub fn with_shape(mut self, shape: &[Option<i64>]) -> Self {
        self.shape = Some(shape.to_vec());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub category: Category,
    /// Display name shown on the canvas.
    pub name: String,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
}

impl Node {
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.param(key).and_then(ParamValue::as_f64)
    }

    pub fn count(&self, key: &str) -> Option<usize> {
        self.param(key).and_then(ParamValue::as_usize)
    }

    pub fn input_port(&self, id: &PortId) -> Option<&Port> {
        self.inputs.iter().find(|p| &p.id == id)
    }

    pub fn output_port(&self, id: &PortId) -> Option<&Port> {
        self.outputs.iter().find(|p| &p.id == id)
    }

    /// First declared input port, the usual target of a single wire.
    pub fn first_input(&self) -> Option<&PortId> {
        self.inputs.first().map(|p| &p.id)
    }

    pub fn first_output(&self) -> Option<&PortId> {
        self.outputs.first().map(|p| &p.id)
    }

    fn port_mut(&mut self, port: &PortId, input: bool) -> Option<&mut Port> {
        let ports = if input { &mut self.inputs } else { &mut self.outputs };
        ports.iter_mut().find(|p| &p.id == port)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: PortId,
}

impl Endpoint {
    pub fn new(node: NodeId, port: impl Into<PortId>) -> Self {
        Self { node, port: port.into() }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// A proposed edge, not yet committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub source: Endpoint,
    pub target: Endpoint,
}

impl ConnectionRequest {
    pub fn new(source: Endpoint, target: Endpoint) -> Self {
        Self { source, target }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowKind {
    Filled,
    Open,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStyle {
    pub color: String,
    pub width: u32,
    pub dashed: bool,
    pub arrow: ArrowKind,
}

impl ConnectionStyle {
    pub fn for_category(category: Category) -> Self {
        let color = match category {
            Category::Activations => "#67c23a",
            Category::Models => "#e6a23c",
            Category::Utilities => "#909399",
            _ => "#409eff",
        };
        Self {
            color: color.to_string(),
            width: 2,
            dashed: false,
            arrow: ArrowKind::Filled,
        }
    }
}

/// Best-effort description of the tensor carried by a wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMeta {
    pub data_type: String,
    pub shape: Vec<Option<i64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: Endpoint,
    pub target: Endpoint,
    pub style: ConnectionStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensor: Option<TensorMeta>,
}

impl Connection {
    pub fn involves(&self, node: NodeId) -> bool {
        self.source.node == node || self.target.node == node
    }
}

/// Read-only borrowed view of a graph's node and connection collections.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    pub nodes: &'a [Node],
    pub connections: &'a [Connection],
}

impl<'a> Snapshot<'a> {
    pub fn new(nodes: &'a [Node], connections: &'a [Connection]) -> Self {
        Self { nodes, connections }
    }

    pub fn node(&self, id: NodeId) -> Option<&'a Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges ending at `node`, in acceptance order.
    pub fn incoming(self, node: NodeId) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| c.target.node == node)
    }

    /// Edges leaving `node`, in acceptance order.
    pub fn outgoing(self, node: NodeId) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| c.source.node == node)
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.incoming(node).count()
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.connections.iter().any(|c| c.involves(node))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),
    #[error("Node {0} has no parameter \"{1}\"")]
    UnknownParameter(NodeId, String),
    #[error("Parameter \"{key}\" of node {node} expects a {expected} value, got {value}")]
    ParameterType {
        node: NodeId,
        key: String,
        expected: ParamType,
        value: ParamValue,
    },
    #[error("Parameter \"{key}\" of node {node} is out of bounds: {value} not in {}", format_bounds(.min, .max))]
    ParameterOutOfBounds {
        node: NodeId,
        key: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    #[error("\"{value}\" is not an option of parameter \"{key}\" of node {node}")]
    InvalidChoice {
        node: NodeId,
        key: String,
        value: String,
    },
    #[error("Parameter \"{key}\" of node {node} must fit on one line")]
    MultilineText { node: NodeId, key: String },
    #[error("Connection rejected: {0}")]
    Rejected(ValidationResult),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn format_bounds(min: &Option<f64>, max: &Option<f64>) -> String {
    let min = min.map_or("-inf".to_string(), |m| m.to_string());
    let max = max.map_or("inf".to_string(), |m| m.to_string());
    format!("[{min}, {max}]")
}

/// The editable graph owned by a single editing session.
///
/// Connections only enter through [`Graph::connect`], which consults the validator first, so a graph
/// built through this API is acyclic and every input port has at most one wire.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    next_node_id: u32,
    next_connection_id: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts externally owned collections as-is. Nothing is validated.
    pub fn from_parts(nodes: Vec<Node>, connections: Vec<Connection>) -> Self {
        let next_node_id = nodes.iter().map(|n| n.id.0 + 1).max().unwrap_or(0);
        let next_connection_id = connections.iter().map(|c| c.id.0 + 1).max().unwrap_or(0);
        Self {
            nodes,
            connections,
            next_node_id,
            next_connection_id,
        }
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(&self.nodes, &self.connections)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.iter_mut().find(|n| n.id == id).ok_or(GraphError::UnknownNode(id))
    }

    fn get_next_node_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        NodeId(id)
    }

    fn get_next_connection_id(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        ConnectionId(id)
    }

    /// Instantiates `kind` from the catalog with its default parameters.
    pub fn add_node(&mut self, catalog: &Catalog, kind: &NodeKind) -> Result<NodeId, GraphError> {
        let entry = catalog.entry(kind)?;
        let id = self.get_next_node_id();
        self.nodes.push(entry.instantiate(id));
        Ok(id)
    }

    /// Adds a node of a kind the catalog does not describe, with one input and one output port.
    pub fn add_custom_node(&mut self, kind: &str, category: Category) -> NodeId {
        let id = self.get_next_node_id();
        self.nodes.push(Node {
            id,
            kind: NodeKind::Custom(kind.to_string()),
            category,
            name: kind.to_string(),
            params: vec![],
            inputs: vec![Port::new("input")],
            outputs: vec![Port::new("output")],
        });
        id
    }

    pub fn set_param(&mut self, node: NodeId, key: &str, value: impl Into<ParamValue>) -> Result<(), GraphError> {
        let value = value.into();
        let target = self.node_mut(node)?;
        let param = target.params.iter_mut().find(|p| p.key == key)
            .ok_or_else(|| GraphError::UnknownParameter(node, key.to_string()))?;
        param.value = param.check(node, &value)?;
        Ok(())
    }

    /// Sets the display name shown in messages and generated comments.
    pub fn rename(&mut self, node: NodeId, name: &str) -> Result<(), GraphError> {
        let target = self.node_mut(node)?;
        log::debug!("Renaming {node} from {} to {name}", target.name);
        target.name = name.to_string();
        Ok(())
    }

    /// Removes a node together with every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let index = self.nodes.iter().position(|n| n.id == id).ok_or(GraphError::UnknownNode(id))?;
        let touching: Vec<ConnectionId> = self.connections.iter()
            .filter(|c| c.involves(id))
            .map(|c| c.id)
            .collect();
        for connection in touching {
            self.disconnect(connection)?;
        }
        log::debug!("Removed node {id}");
        Ok(self.nodes.remove(index))
    }

    pub fn validate(&self, request: &ConnectionRequest) -> ValidationResult {
        validator::validate(self.snapshot(), request)
    }

    /// Validates `request` and commits it only when every rule passes.
    pub fn connect(&mut self, request: ConnectionRequest) -> Result<ConnectionId, GraphError> {
        let result = self.validate(&request);
        if !result.accepted() {
            log::debug!("Rejected {} -> {}: {}", request.source, request.target, result);
            return Err(GraphError::Rejected(result));
        }

        let source = self.node(request.source.node).ok_or(GraphError::UnknownNode(request.source.node))?;
        let style = ConnectionStyle::for_category(source.category);
        let tensor = source.output_port(&request.source.port)
            .and_then(|p| p.shape.clone())
            .map(|shape| TensorMeta { data_type: "tensor".to_string(), shape });

        let id = self.get_next_connection_id();
        if let Some(port) = self.node_mut(request.source.node)?.port_mut(&request.source.port, false) {
            port.connections.push(id);
        }
        if let Some(port) = self.node_mut(request.target.node)?.port_mut(&request.target.port, true) {
            port.connections.push(id);
        }
        log::debug!("Connected {} -> {} as {id}", request.source, request.target);
        self.connections.push(Connection {
            id,
            source: request.source,
            target: request.target,
            style,
            tensor,
        });
        Ok(id)
    }

    /// Convenience for the common case of wiring the first output of `source` to a named input of `target`.
    pub fn connect_ports(&mut self, source: NodeId, target: NodeId, target_port: &str) -> Result<ConnectionId, GraphError> {
        let source_port = self.node(source)
            .ok_or(GraphError::UnknownNode(source))?
            .first_output()
            .cloned()
            .unwrap_or_else(|| PortId::from("output"));
        self.connect(ConnectionRequest::new(Endpoint::new(source, source_port), Endpoint::new(target, target_port)))
    }

    /// Wires the first output of `source` to the first input of `target`.
    pub fn connect_nodes(&mut self, source: NodeId, target: NodeId) -> Result<ConnectionId, GraphError> {
        let target_port = self.node(target)
            .ok_or(GraphError::UnknownNode(target))?
            .first_input()
            .cloned()
            .unwrap_or_else(|| PortId::from("input"));
        self.connect_ports(source, target, &target_port.0)
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> Result<Connection, GraphError> {
        let index = self.connections.iter().position(|c| c.id == id).ok_or(GraphError::UnknownConnection(id))?;
        let connection = self.connections.remove(index);
        for (endpoint, input) in [(&connection.source, false), (&connection.target, true)] {
            if let Ok(node) = self.node_mut(endpoint.node) {
                if let Some(port) = node.port_mut(&endpoint.port, input) {
                    port.connections.retain(|c| *c != id);
                }
            }
        }
        log::debug!("Disconnected {id}");
        Ok(connection)
    }
}
