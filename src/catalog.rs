use std::collections::HashMap;
use crate::graph::{Node, NodeId, ParamType, ParamValue, Parameter, Port};
use crate::kind::{Category, NodeKind};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Kind \"{0}\" is not registered in the catalog")]
    UnknownKind(NodeKind),
}

/// Static description of one node kind: its parameters with defaults and its declared ports.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub kind: NodeKind,
    pub category: Category,
    pub name: String,
    pub params: Vec<Parameter>,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl CatalogEntry {
    pub fn new(kind: NodeKind, category: Category, name: &str) -> Self {
        Self {
            kind,
            category,
            name: name.to_string(),
            params: vec![],
            inputs: vec![Port::new("input")],
            outputs: vec![Port::new("output")],
        }
    }

    fn known(kind: NodeKind, name: &str) -> Self {
        let category = kind.category().unwrap_or(Category::Utilities);
        Self::new(kind, category, name)
    }

    pub fn with_params(mut self, params: Vec<Parameter>) -> Self {
        self.params = params;
        self
    }

    pub fn with_inputs(mut self, names: &[&str]) -> Self {
        self.inputs = names.iter().map(|name| Port::new(name)).collect();
        self
    }

    fn with_shapes(mut self, input: &[Option<i64>], output: &[Option<i64>]) -> Self {
        for port in &mut self.inputs {
            port.shape = Some(input.to_vec());
        }
        for port in &mut self.outputs {
            port.shape = Some(output.to_vec());
        }
        self
    }

    /// Fresh node carrying a copy of the default parameters.
    pub fn instantiate(&self, id: NodeId) -> Node {
        Node {
            id,
            kind: self.kind.clone(),
            category: self.category,
            name: self.name.clone(),
            params: self.params.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

fn param(key: &str, param_type: ParamType, value: ParamValue) -> Parameter {
    Parameter {
        key: key.to_string(),
        param_type,
        value,
        min: None,
        max: None,
        options: vec![],
    }
}

fn int(key: &str, default: i64, min: i64, max: i64) -> Parameter {
    Parameter {
        min: Some(min as f64),
        max: Some(max as f64),
        ..param(key, ParamType::Number, ParamValue::Int(default))
    }
}

fn float(key: &str, default: f64, min: f64, max: f64) -> Parameter {
    Parameter {
        min: Some(min),
        max: Some(max),
        ..param(key, ParamType::Number, ParamValue::Float(default))
    }
}

/// Optional number, unset by default.
fn optional(key: &str, min: f64, max: f64) -> Parameter {
    Parameter {
        min: Some(min),
        max: Some(max),
        ..param(key, ParamType::Number, ParamValue::Null)
    }
}

fn ratio(key: &str, default: f64) -> Parameter {
    Parameter {
        min: Some(0.0),
        max: Some(1.0),
        ..param(key, ParamType::Range, ParamValue::Float(default))
    }
}

fn flag(key: &str, default: bool) -> Parameter {
    param(key, ParamType::Boolean, ParamValue::Bool(default))
}

fn text(key: &str, default: &str) -> Parameter {
    param(key, ParamType::Text, ParamValue::from(default))
}

fn choice(key: &str, default: &str, options: &[&str]) -> Parameter {
    Parameter {
        options: options.iter().map(|o| o.to_string()).collect(),
        ..param(key, ParamType::Choice, ParamValue::from(default))
    }
}

fn eps() -> Parameter {
    float("eps", 1e-5, 1e-8, 1e-1)
}

/// Registry of node kinds, looked up by tag.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: HashMap<NodeKind, CatalogEntry>,
    order: Vec<NodeKind>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces an entry. Replacing keeps the original palette position.
    pub fn register(&mut self, entry: CatalogEntry) {
        if !self.entries.contains_key(&entry.kind) {
            self.order.push(entry.kind.clone());
        }
        self.entries.insert(entry.kind.clone(), entry);
    }

    pub fn entry(&self, kind: &NodeKind) -> Result<&CatalogEntry, CatalogError> {
        self.entries.get(kind).ok_or_else(|| CatalogError::UnknownKind(kind.clone()))
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.order.iter().filter_map(|kind| self.entries.get(kind))
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &CatalogEntry> {
        self.entries().filter(move |e| e.category == category)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The built-in palette.
    pub fn standard() -> Self {
        use NodeKind::*;
        let mut catalog = Self::new();
        let conv_padding = ["valid", "same", "custom"];
        let entries = vec![
            CatalogEntry::known(Linear, "Linear").with_params(vec![
                int("in_features", 512, 1, 65536),
                int("out_features", 256, 1, 65536),
                flag("bias", true),
            ]).with_shapes(&[None, Some(512)], &[None, Some(256)]),
            CatalogEntry::known(Flatten, "Flatten").with_params(vec![
                int("start_dim", 1, 0, 10),
                int("end_dim", -1, -1, 10),
            ]),
            CatalogEntry::known(Embedding, "Embedding").with_params(vec![
                int("num_embeddings", 10000, 1, 1000000),
                int("embedding_dim", 300, 1, 2048),
                optional("padding_idx", 0.0, 1000000.0),
                flag("sparse", false),
            ]),
            CatalogEntry::known(Conv1d, "Conv1d").with_params(vec![
                int("in_channels", 1, 1, 1024),
                int("out_channels", 64, 1, 1024),
                int("kernel_size", 3, 1, 32),
                int("stride", 1, 1, 10),
                choice("padding", "valid", &conv_padding),
                int("dilation", 1, 1, 10),
                int("groups", 1, 1, 1024),
                flag("bias", true),
            ]).with_shapes(&[None, Some(1), Some(128)], &[None, Some(64), Some(126)]),
            CatalogEntry::known(Conv2d, "Conv2d").with_params(vec![
                int("in_channels", 3, 1, 1024),
                int("out_channels", 64, 1, 1024),
                int("kernel_size", 3, 1, 11),
                int("stride", 1, 1, 10),
                choice("padding", "same", &["same", "valid"]),
                int("dilation", 1, 1, 10),
                int("groups", 1, 1, 1024),
                flag("bias", true),
            ]).with_shapes(&[None, Some(3), Some(32), Some(32)], &[None, Some(64), Some(32), Some(32)]),
            CatalogEntry::known(Conv3d, "Conv3d").with_params(vec![
                int("in_channels", 1, 1, 512),
                int("out_channels", 32, 1, 512),
                int("kernel_size", 3, 1, 7),
                int("stride", 1, 1, 5),
                int("padding", 1, 0, 5),
                int("dilation", 1, 1, 5),
                flag("bias", true),
            ]),
            CatalogEntry::known(DepthwiseConv2d, "DepthwiseSeparableConv2d").with_params(vec![
                int("in_channels", 32, 1, 1024),
                int("out_channels", 64, 1, 1024),
                int("kernel_size", 3, 1, 7),
                int("stride", 1, 1, 4),
                int("padding", 1, 0, 3),
                int("depth_multiplier", 1, 1, 32),
            ]),
            CatalogEntry::known(TransposedConv2d, "ConvTranspose2d").with_params(vec![
                int("in_channels", 64, 1, 1024),
                int("out_channels", 32, 1, 1024),
                int("kernel_size", 4, 1, 11),
                int("stride", 2, 1, 4),
                int("padding", 1, 0, 5),
                int("output_padding", 0, 0, 3),
                int("dilation", 1, 1, 5),
                flag("bias", true),
            ]),
            CatalogEntry::known(MaxPool1d, "MaxPool1d").with_params(vec![
                int("kernel_size", 2, 2, 16),
                int("stride", 2, 1, 8),
                int("padding", 0, 0, 8),
                int("dilation", 1, 1, 5),
                flag("ceil_mode", false),
            ]),
            CatalogEntry::known(AvgPool1d, "AvgPool1d").with_params(vec![
                int("kernel_size", 2, 2, 16),
                int("stride", 2, 1, 8),
                int("padding", 0, 0, 8),
                flag("ceil_mode", false),
            ]),
            CatalogEntry::known(MaxPool2d, "MaxPool2d").with_params(vec![
                int("kernel_size", 2, 2, 8),
                int("stride", 2, 1, 4),
                int("padding", 0, 0, 2),
                int("dilation", 1, 1, 5),
                flag("ceil_mode", false),
            ]).with_shapes(&[None, Some(64), Some(32), Some(32)], &[None, Some(64), Some(16), Some(16)]),
            CatalogEntry::known(AvgPool2d, "AvgPool2d").with_params(vec![
                int("kernel_size", 2, 2, 8),
                int("stride", 2, 1, 4),
                int("padding", 0, 0, 2),
                flag("ceil_mode", false),
            ]),
            CatalogEntry::known(MaxPool3d, "MaxPool3d").with_params(vec![
                int("kernel_size", 2, 2, 8),
                int("stride", 2, 1, 4),
                int("padding", 0, 0, 2),
            ]),
            CatalogEntry::known(AvgPool3d, "AvgPool3d").with_params(vec![
                int("kernel_size", 2, 2, 8),
                int("stride", 2, 1, 4),
                int("padding", 0, 0, 2),
            ]),
            CatalogEntry::known(AdaptiveMaxPool2d, "AdaptiveMaxPool2d").with_params(vec![
                int("output_size", 1, 1, 100),
            ]),
            CatalogEntry::known(GlobalAvgPool, "AdaptiveAvgPool2d"),
            CatalogEntry::known(BatchNorm1d, "BatchNorm1d").with_params(vec![
                int("num_features", 64, 1, 4096),
                eps(),
                float("momentum", 0.1, 0.0, 1.0),
                flag("affine", true),
                flag("track_running_stats", true),
            ]),
            CatalogEntry::known(BatchNorm2d, "BatchNorm2d").with_params(vec![
                int("num_features", 64, 1, 4096),
                eps(),
                float("momentum", 0.1, 0.0, 1.0),
                flag("affine", true),
                flag("track_running_stats", true),
            ]),
            CatalogEntry::known(BatchNorm3d, "BatchNorm3d").with_params(vec![
                int("num_features", 32, 1, 4096),
                eps(),
                float("momentum", 0.1, 0.0, 1.0),
                flag("affine", true),
                flag("track_running_stats", true),
            ]),
            CatalogEntry::known(LayerNorm, "LayerNorm").with_params(vec![
                int("normalized_shape", 512, 1, 65536),
                eps(),
                flag("elementwise_affine", true),
            ]),
            CatalogEntry::known(InstanceNorm2d, "InstanceNorm2d").with_params(vec![
                int("num_features", 64, 1, 1024),
                eps(),
                float("momentum", 0.1, 0.0, 1.0),
                flag("affine", true),
                flag("track_running_stats", true),
            ]),
            CatalogEntry::known(GroupNorm, "GroupNorm").with_params(vec![
                int("num_groups", 32, 1, 1024),
                int("num_channels", 64, 1, 4096),
                eps(),
                flag("affine", true),
            ]),
            CatalogEntry::known(Lstm, "LSTM").with_params(recurrent_params(None)),
            CatalogEntry::known(Gru, "GRU").with_params(recurrent_params(None)),
            CatalogEntry::known(Rnn, "RNN").with_params(recurrent_params(Some(choice("nonlinearity", "tanh", &["tanh", "relu"])))),
            CatalogEntry::known(MultiheadAttention, "MultiheadAttention").with_params(vec![
                int("embed_dim", 512, 1, 4096),
                int("num_heads", 8, 1, 64),
                ratio("dropout", 0.1),
                flag("bias", true),
                flag("add_bias_kv", false),
                flag("add_zero_attn", false),
                optional("kdim", 1.0, 4096.0),
                optional("vdim", 1.0, 4096.0),
            ]).with_inputs(&["query", "key", "value"]),
            CatalogEntry::known(SelfAttention, "SelfAttention").with_params(vec![
                int("hidden_size", 512, 1, 4096),
                int("num_attention_heads", 8, 1, 64),
                ratio("attention_dropout", 0.1),
                ratio("hidden_dropout", 0.1),
            ]),
            CatalogEntry::known(ScaledDotProductAttention, "ScaledDotProductAttention").with_params(vec![
                ratio("dropout", 0.1),
                optional("scale", 0.1, 10.0),
            ]).with_inputs(&["query", "key", "value"]),
            CatalogEntry::known(Relu, "ReLU").with_params(vec![flag("inplace", false)]),
            CatalogEntry::known(Sigmoid, "Sigmoid"),
            CatalogEntry::known(Tanh, "Tanh"),
            CatalogEntry::known(LeakyRelu, "LeakyReLU").with_params(vec![
                float("negative_slope", 0.01, 0.0, 1.0),
                flag("inplace", false),
            ]),
            CatalogEntry::known(Elu, "ELU").with_params(vec![
                float("alpha", 1.0, 0.1, 10.0),
                flag("inplace", false),
            ]),
            CatalogEntry::known(Selu, "SELU").with_params(vec![flag("inplace", false)]),
            CatalogEntry::known(Prelu, "PReLU").with_params(vec![
                int("num_parameters", 1, 1, 100),
                float("init", 0.25, 0.0, 1.0),
            ]),
            CatalogEntry::known(Mish, "Mish").with_params(vec![flag("inplace", false)]),
            CatalogEntry::known(Swish, "SiLU").with_params(vec![flag("inplace", false)]),
            CatalogEntry::known(ResNet, "ResNet").with_params(vec![
                choice("num_layers", "18", &["18", "34", "50", "101", "152"]),
                flag("pretrained", false),
                int("num_classes", 1000, 1, 10000),
            ]).with_shapes(&[Some(1), Some(3), Some(224), Some(224)], &[Some(1), Some(1000)]),
            CatalogEntry::known(Vgg, "VGG").with_params(vec![
                choice("version", "16", &["11", "13", "16", "19"]),
                flag("batch_norm", false),
                flag("pretrained", false),
                int("num_classes", 1000, 1, 10000),
            ]),
            CatalogEntry::known(MobileNetV2, "MobileNetV2").with_params(vec![
                flag("pretrained", false),
                int("num_classes", 1000, 1, 10000),
                float("width_mult", 1.0, 0.1, 2.0),
            ]),
            CatalogEntry::known(EfficientNet, "EfficientNet").with_params(vec![
                choice("variant", "b0", &["b0", "b1", "b2", "b3", "b4", "b5", "b6", "b7"]),
                flag("pretrained", false),
                int("num_classes", 1000, 1, 10000),
            ]),
            CatalogEntry::known(DenseNet, "DenseNet").with_params(vec![
                choice("num_layers", "121", &["121", "161", "169", "201"]),
                flag("pretrained", false),
                int("num_classes", 1000, 1, 10000),
            ]),
            CatalogEntry::known(Bert, "BERT").with_params(vec![
                text("model_name", "bert-base-uncased"),
                int("num_labels", 2, 1, 1000),
                flag("from_pretrained", true),
            ]),
            CatalogEntry::known(Gpt2, "GPT2").with_params(vec![
                text("model_name", "gpt2"),
                choice("task_type", "language_modeling", &["language_modeling", "sequence_classification"]),
                flag("from_pretrained", true),
            ]),
            CatalogEntry::known(Transformer, "Transformer").with_params(vec![
                int("d_model", 512, 64, 4096),
                int("nhead", 8, 1, 64),
                int("num_encoder_layers", 6, 1, 24),
                int("num_decoder_layers", 6, 0, 24),
                int("dim_feedforward", 2048, 128, 8192),
                ratio("dropout", 0.1),
                choice("activation", "relu", &["relu", "gelu"]),
                flag("batch_first", true),
            ]).with_inputs(&["src", "tgt"]),
            CatalogEntry::known(Dropout, "Dropout").with_params(vec![
                ratio("p", 0.5),
                flag("inplace", false),
            ]),
            CatalogEntry::known(Reshape, "Reshape").with_params(vec![text("shape", "-1, 128")]),
            CatalogEntry::known(Concatenate, "Concatenate")
                .with_params(vec![int("dim", 1, 0, 10)])
                .with_inputs(&["input1", "input2"]),
            CatalogEntry::known(Add, "Add").with_inputs(&["input1", "input2"]),
            CatalogEntry::known(Multiply, "Multiply").with_inputs(&["input1", "input2"]),
            CatalogEntry::known(Identity, "Identity"),
            CatalogEntry::known(ZeroPadding2d, "ZeroPad2d").with_params(vec![int("padding", 1, 0, 10)]),
            CatalogEntry::known(Lambda, "Lambda").with_params(vec![text("function", "lambda x: x * 2")]),
        ];
        for entry in entries {
            catalog.register(entry);
        }
        catalog
    }
}

fn recurrent_params(nonlinearity: Option<Parameter>) -> Vec<Parameter> {
    let mut params = vec![
        int("input_size", 128, 1, 4096),
        int("hidden_size", 256, 1, 4096),
        int("num_layers", 1, 1, 10),
    ];
    params.extend(nonlinearity);
    params.extend([
        flag("batch_first", true),
        ratio("dropout", 0.0),
        flag("bidirectional", false),
        flag("bias", true),
    ]);
    params
}
