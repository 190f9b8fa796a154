pub mod kind;
pub mod graph;
pub mod catalog;
pub mod validator;
pub mod topology;
pub mod codegen;
pub mod config;

pub use kind::{Category, ConvRank, NodeKind};
pub use graph::{Connection, ConnectionId, ConnectionRequest, Endpoint, Graph, GraphError, Node, NodeId, ParamValue, PortId, Snapshot};
pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use validator::{validate, Rejection, ValidationResult};
pub use topology::{Topology, TopologyError};
pub use codegen::{emit, CodegenError, EmitWarning, Emitter, GeneratedCode};
pub use config::{ConfigError, EmitterConfig};
