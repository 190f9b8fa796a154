use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Broad node families used by the connection matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    strum_macros::Display, strum_macros::EnumIter, strum_macros::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    BasicLayers,
    ConvLayers,
    PoolingLayers,
    NormalizationLayers,
    RecurrentLayers,
    AttentionLayers,
    Activations,
    Models,
    Utilities,
}

impl Category {
    /// Categories this one may feed directly.
    pub fn allowed_targets(&self) -> &'static [Category] {
        use Category::*;
        match self {
            BasicLayers | RecurrentLayers | AttentionLayers => &[BasicLayers, RecurrentLayers, AttentionLayers, Activations, Utilities],
            ConvLayers => &[ConvLayers, PoolingLayers, NormalizationLayers, Activations, Utilities],
            PoolingLayers => &[ConvLayers, NormalizationLayers, Activations, Utilities],
            NormalizationLayers => &[ConvLayers, PoolingLayers, Activations, Utilities],
            Activations => &[BasicLayers, ConvLayers, PoolingLayers, NormalizationLayers, RecurrentLayers, AttentionLayers, Utilities],
            Models => &[Activations, Utilities],
            Utilities => &[BasicLayers, ConvLayers, PoolingLayers, NormalizationLayers, RecurrentLayers, AttentionLayers, Activations, Utilities],
        }
    }

    pub fn can_feed(&self, target: Category) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Families whose output is a multi-dimensional feature map.
    pub fn is_spatial(&self) -> bool {
        matches!(self, Category::ConvLayers | Category::PoolingLayers | Category::NormalizationLayers)
    }

    /// Stacking two of these back to back is rejected.
    pub fn rejects_stacking(&self) -> bool {
        matches!(self, Category::Activations | Category::PoolingLayers | Category::NormalizationLayers | Category::Models)
    }

    /// Pure transformations that cannot originate data.
    pub fn requires_upstream(&self) -> bool {
        matches!(self, Category::Activations | Category::PoolingLayers | Category::NormalizationLayers | Category::Utilities)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::BasicLayers => "basic layer",
            Category::ConvLayers => "convolution layer",
            Category::PoolingLayers => "pooling layer",
            Category::NormalizationLayers => "normalization layer",
            Category::RecurrentLayers => "recurrent layer",
            Category::AttentionLayers => "attention layer",
            Category::Activations => "activation",
            Category::Models => "pretrained model",
            Category::Utilities => "utility",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConvRank {
    One,
    Two,
    Three,
}

impl ConvRank {
    pub fn dims(&self) -> usize {
        match self {
            ConvRank::One => 1,
            ConvRank::Two => 2,
            ConvRank::Three => 3,
        }
    }
}

impl fmt::Display for ConvRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-D", self.dims())
    }
}

/// Tag identifying what a node computes.
///
/// Parsing never fails: tags the catalog does not know become [`NodeKind::Custom`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
    strum_macros::EnumString, strum_macros::IntoStaticStr, strum_macros::EnumIter)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum NodeKind {
    #[strum(to_string = "linear")]
    Linear,
    #[strum(to_string = "flatten")]
    Flatten,
    #[strum(to_string = "embedding")]
    Embedding,
    #[strum(to_string = "conv1d")]
    Conv1d,
    #[strum(to_string = "conv2d")]
    Conv2d,
    #[strum(to_string = "conv3d")]
    Conv3d,
    #[strum(to_string = "depthwise_conv2d")]
    DepthwiseConv2d,
    #[strum(to_string = "transposed_conv2d")]
    TransposedConv2d,
    #[strum(to_string = "maxpool1d")]
    MaxPool1d,
    #[strum(to_string = "avgpool1d")]
    AvgPool1d,
    #[strum(to_string = "maxpool2d")]
    MaxPool2d,
    #[strum(to_string = "avgpool2d")]
    AvgPool2d,
    #[strum(to_string = "maxpool3d")]
    MaxPool3d,
    #[strum(to_string = "avgpool3d")]
    AvgPool3d,
    #[strum(to_string = "adaptive_maxpool2d")]
    AdaptiveMaxPool2d,
    #[strum(to_string = "global_avgpool")]
    GlobalAvgPool,
    #[strum(to_string = "batchnorm1d")]
    BatchNorm1d,
    #[strum(to_string = "batchnorm2d")]
    BatchNorm2d,
    #[strum(to_string = "batchnorm3d")]
    BatchNorm3d,
    #[strum(to_string = "layernorm")]
    LayerNorm,
    #[strum(to_string = "instancenorm2d")]
    InstanceNorm2d,
    #[strum(to_string = "groupnorm")]
    GroupNorm,
    #[strum(to_string = "lstm")]
    Lstm,
    #[strum(to_string = "gru")]
    Gru,
    #[strum(to_string = "rnn")]
    Rnn,
    #[strum(to_string = "multihead_attention")]
    MultiheadAttention,
    #[strum(to_string = "self_attention")]
    SelfAttention,
    #[strum(to_string = "scaled_dot_product_attention")]
    ScaledDotProductAttention,
    #[strum(to_string = "relu")]
    Relu,
    #[strum(to_string = "sigmoid")]
    Sigmoid,
    #[strum(to_string = "tanh")]
    Tanh,
    #[strum(to_string = "leaky_relu")]
    LeakyRelu,
    #[strum(to_string = "elu")]
    Elu,
    #[strum(to_string = "selu")]
    Selu,
    #[strum(to_string = "prelu")]
    Prelu,
    #[strum(to_string = "mish")]
    Mish,
    #[strum(to_string = "swish")]
    Swish,
    #[strum(to_string = "resnet")]
    ResNet,
    #[strum(to_string = "vgg")]
    Vgg,
    #[strum(to_string = "mobilenet_v2")]
    MobileNetV2,
    #[strum(to_string = "efficientnet")]
    EfficientNet,
    #[strum(to_string = "densenet")]
    DenseNet,
    #[strum(to_string = "bert")]
    Bert,
    #[strum(to_string = "gpt2")]
    Gpt2,
    #[strum(to_string = "transformer")]
    Transformer,
    #[strum(to_string = "dropout")]
    Dropout,
    #[strum(to_string = "reshape")]
    Reshape,
    #[strum(to_string = "concatenate", serialize = "concat")]
    Concatenate,
    #[strum(to_string = "add")]
    Add,
    #[strum(to_string = "multiply")]
    Multiply,
    #[strum(to_string = "identity")]
    Identity,
    #[strum(to_string = "zero_padding2d")]
    ZeroPadding2d,
    #[strum(to_string = "lambda")]
    Lambda,
    #[strum(default)]
    Custom(String),
}

impl NodeKind {
    /// Every kind the standard catalog knows, in palette order.
    pub fn known() -> impl Iterator<Item = NodeKind> {
        NodeKind::iter().filter(|kind| !kind.is_custom())
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Custom(name) => name.as_str(),
            known => known.into(),
        }
    }

    /// Parses a tag, falling back to [`NodeKind::Custom`] for unknown names.
    pub fn parse(tag: &str) -> Self {
        NodeKind::from(tag.to_string())
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, NodeKind::Custom(_))
    }

    /// Category implied by the kind. `None` for custom kinds, whose category is supplied by the caller.
    pub fn category(&self) -> Option<Category> {
        use NodeKind::*;
        let category = match self {
            Linear | Flatten | Embedding => Category::BasicLayers,
            Conv1d | Conv2d | Conv3d | DepthwiseConv2d | TransposedConv2d => Category::ConvLayers,
            MaxPool1d | AvgPool1d | MaxPool2d | AvgPool2d | MaxPool3d | AvgPool3d | AdaptiveMaxPool2d | GlobalAvgPool => Category::PoolingLayers,
            BatchNorm1d | BatchNorm2d | BatchNorm3d | LayerNorm | InstanceNorm2d | GroupNorm => Category::NormalizationLayers,
            Lstm | Gru | Rnn => Category::RecurrentLayers,
            MultiheadAttention | SelfAttention | ScaledDotProductAttention => Category::AttentionLayers,
            Relu | Sigmoid | Tanh | LeakyRelu | Elu | Selu | Prelu | Mish | Swish => Category::Activations,
            ResNet | Vgg | MobileNetV2 | EfficientNet | DenseNet | Bert | Gpt2 | Transformer => Category::Models,
            Dropout | Reshape | Concatenate | Add | Multiply | Identity | ZeroPadding2d | Lambda => Category::Utilities,
            Custom(_) => return None,
        };
        Some(category)
    }

    /// Spatial rank for convolutions and their matching pooling/normalization kinds.
    pub fn conv_rank(&self) -> Option<ConvRank> {
        use NodeKind::*;
        match self {
            Conv1d | MaxPool1d | AvgPool1d | BatchNorm1d => Some(ConvRank::One),
            Conv2d | DepthwiseConv2d | TransposedConv2d | MaxPool2d | AvgPool2d | AdaptiveMaxPool2d | GlobalAvgPool
            | BatchNorm2d | InstanceNorm2d => Some(ConvRank::Two),
            Conv3d | MaxPool3d | AvgPool3d | BatchNorm3d => Some(ConvRank::Three),
            _ => None,
        }
    }

    /// Batch and instance normalization, which normalize over a fixed spatial rank.
    pub fn is_ranked_norm(&self) -> bool {
        matches!(self, NodeKind::BatchNorm1d | NodeKind::BatchNorm2d | NodeKind::BatchNorm3d | NodeKind::InstanceNorm2d)
    }

    /// Complete pretrained networks. These are always graph sources.
    pub fn is_pretrained(&self) -> bool {
        self.is_vision_backbone() || self.is_transformers_model()
    }

    pub fn is_vision_backbone(&self) -> bool {
        matches!(self, NodeKind::ResNet | NodeKind::Vgg | NodeKind::MobileNetV2 | NodeKind::EfficientNet | NodeKind::DenseNet)
    }

    pub fn is_transformers_model(&self) -> bool {
        matches!(self, NodeKind::Bert | NodeKind::Gpt2)
    }

    /// Kinds that only produce meaningful output once at least two inputs are wired.
    pub fn is_multi_input(&self) -> bool {
        matches!(self, NodeKind::Add | NodeKind::Multiply | NodeKind::Concatenate)
    }

    pub fn is_recurrent(&self) -> bool {
        matches!(self, NodeKind::Lstm | NodeKind::Gru | NodeKind::Rnn)
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        match NodeKind::from_str(&value) {
            Ok(kind) => kind,
            Err(_) => NodeKind::Custom(value),
        }
    }
}

impl From<NodeKind> for String {
    fn from(value: NodeKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_and_alias() {
        assert_eq!(NodeKind::parse("conv2d"), NodeKind::Conv2d);
        assert_eq!(NodeKind::parse("concat"), NodeKind::Concatenate);
        assert_eq!(NodeKind::parse("MobileNet_V2"), NodeKind::MobileNetV2);
        assert_eq!(NodeKind::Concatenate.as_str(), "concatenate");
    }

    #[test]
    fn unknown_tag_becomes_custom() {
        let kind = NodeKind::parse("capsule");
        assert_eq!(kind, NodeKind::Custom("capsule".to_string()));
        assert_eq!(kind.to_string(), "capsule");
        assert_eq!(kind.category(), None);
    }

    #[test]
    fn every_known_kind_has_a_category() {
        let known: Vec<_> = NodeKind::known().collect();
        assert!(known.len() > 40);
        for kind in known {
            assert!(kind.category().is_some(), "{kind} has no category");
            assert_eq!(NodeKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn matrix_keeps_conv_out_of_dense() {
        assert!(!Category::ConvLayers.can_feed(Category::BasicLayers));
        assert!(Category::ConvLayers.can_feed(Category::PoolingLayers));
        assert!(!Category::Activations.can_feed(Category::Activations));
        assert!(!Category::Utilities.can_feed(Category::Models));
    }
}
