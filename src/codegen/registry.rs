use std::collections::HashMap;
use crate::kind::NodeKind;
use super::declarations::{self as decl, DeclareFn};
use super::forward::{self as fwd, ForwardFn};

/// How one kind is written out.
#[derive(Clone, Copy, Debug)]
pub struct EmitRule {
    /// Stem of the generated attribute name, `{prefix}_{index}`.
    pub prefix: &'static str,
    /// PyTorch class shown in the summary table.
    pub display: &'static str,
    /// `None` for operations written inline in `forward()` only.
    pub(super) declare: Option<DeclareFn>,
    pub(super) forward: ForwardFn,
}

impl EmitRule {
    fn new(prefix: &'static str, display: &'static str, declare: DeclareFn, forward: ForwardFn) -> Self {
        Self { prefix, display, declare: Some(declare), forward }
    }

    fn inline(prefix: &'static str, display: &'static str, forward: ForwardFn) -> Self {
        Self { prefix, display, declare: None, forward }
    }

    pub fn declares(&self) -> bool {
        self.declare.is_some()
    }
}

/// Emission rules keyed by kind. Kinds without a rule fall back to a placeholder module.
#[derive(Clone, Debug)]
pub struct EmitterRegistry {
    rules: HashMap<NodeKind, EmitRule>,
    fallback: EmitRule,
}

impl Default for EmitterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl EmitterRegistry {
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            fallback: EmitRule::new("layer", "nn.Identity", decl::placeholder, fwd::call),
        }
    }

    pub fn register(&mut self, kind: NodeKind, rule: EmitRule) {
        if self.rules.insert(kind.clone(), rule).is_some() {
            log::warn!("Replaced emission rule for {kind}");
        }
    }

    /// The rule for `kind`, and whether it is the placeholder fallback.
    pub fn lookup(&self, kind: &NodeKind) -> (&EmitRule, bool) {
        match self.rules.get(kind) {
            Some(rule) => (rule, false),
            None => (&self.fallback, true),
        }
    }

    pub fn contains(&self, kind: &NodeKind) -> bool {
        self.rules.contains_key(kind)
    }

    pub fn standard() -> Self {
        use NodeKind::*;
        let mut registry = Self::empty();
        let rules = [
            (Linear, EmitRule::new("linear", "nn.Linear", decl::linear, fwd::call)),
            (Flatten, EmitRule::new("flatten", "nn.Flatten", decl::flatten, fwd::call)),
            (Embedding, EmitRule::new("embed", "nn.Embedding", decl::embedding, fwd::call)),
            (Conv1d, EmitRule::new("conv1d", "nn.Conv1d", decl::conv1d, fwd::call)),
            (Conv2d, EmitRule::new("conv2d", "nn.Conv2d", decl::conv2d, fwd::call)),
            (Conv3d, EmitRule::new("conv3d", "nn.Conv3d", decl::conv3d, fwd::call)),
            (DepthwiseConv2d, EmitRule::new("dwconv", "DepthwiseSeparableConv2d", decl::depthwise_conv2d, fwd::depthwise)),
            (TransposedConv2d, EmitRule::new("convT", "nn.ConvTranspose2d", decl::transposed_conv2d, fwd::call)),
            (MaxPool1d, EmitRule::new("maxpool1d", "nn.MaxPool1d", decl::maxpool1d, fwd::call)),
            (AvgPool1d, EmitRule::new("avgpool1d", "nn.AvgPool1d", decl::avgpool1d, fwd::call)),
            (MaxPool2d, EmitRule::new("maxpool2d", "nn.MaxPool2d", decl::maxpool2d, fwd::call)),
            (AvgPool2d, EmitRule::new("avgpool2d", "nn.AvgPool2d", decl::avgpool2d, fwd::call)),
            (MaxPool3d, EmitRule::new("maxpool3d", "nn.MaxPool3d", decl::maxpool3d, fwd::call)),
            (AvgPool3d, EmitRule::new("avgpool3d", "nn.AvgPool3d", decl::avgpool3d, fwd::call)),
            (AdaptiveMaxPool2d, EmitRule::new("adaptmax", "nn.AdaptiveMaxPool2d", decl::adaptive_maxpool2d, fwd::call)),
            (GlobalAvgPool, EmitRule::new("gap", "nn.AdaptiveAvgPool2d", decl::global_avgpool, fwd::call)),
            (BatchNorm1d, EmitRule::new("bn1d", "nn.BatchNorm1d", decl::batchnorm1d, fwd::call)),
            (BatchNorm2d, EmitRule::new("bn2d", "nn.BatchNorm2d", decl::batchnorm2d, fwd::call)),
            (BatchNorm3d, EmitRule::new("bn3d", "nn.BatchNorm3d", decl::batchnorm3d, fwd::call)),
            (LayerNorm, EmitRule::new("ln", "nn.LayerNorm", decl::layernorm, fwd::call)),
            (InstanceNorm2d, EmitRule::new("in2d", "nn.InstanceNorm2d", decl::instancenorm2d, fwd::call)),
            (GroupNorm, EmitRule::new("gn", "nn.GroupNorm", decl::groupnorm, fwd::call)),
            (Lstm, EmitRule::new("lstm", "nn.LSTM", decl::lstm, fwd::call_pair)),
            (Gru, EmitRule::new("gru", "nn.GRU", decl::gru, fwd::call_pair)),
            (Rnn, EmitRule::new("rnn", "nn.RNN", decl::rnn, fwd::call_pair)),
            (MultiheadAttention, EmitRule::new("mha", "nn.MultiheadAttention", decl::multihead_attention, fwd::attention)),
            (SelfAttention, EmitRule::new("self_attn", "SelfAttention", decl::self_attention, fwd::self_attention)),
            (ScaledDotProductAttention, EmitRule::new("sdpa", "F.scaled_dot_product_attention", decl::scaled_dot_product_attention, fwd::scaled_dot_product)),
            (Relu, EmitRule::new("relu", "nn.ReLU", decl::relu, fwd::call)),
            (Sigmoid, EmitRule::new("sigmoid", "nn.Sigmoid", decl::sigmoid, fwd::call)),
            (Tanh, EmitRule::new("tanh", "nn.Tanh", decl::tanh, fwd::call)),
            (LeakyRelu, EmitRule::new("leaky_relu", "nn.LeakyReLU", decl::leaky_relu, fwd::call)),
            (Elu, EmitRule::new("elu", "nn.ELU", decl::elu, fwd::call)),
            (Selu, EmitRule::new("selu", "nn.SELU", decl::selu, fwd::call)),
            (Prelu, EmitRule::new("prelu", "nn.PReLU", decl::prelu, fwd::call)),
            (Mish, EmitRule::new("mish", "nn.Mish", decl::mish, fwd::call)),
            (Swish, EmitRule::new("swish", "nn.SiLU", decl::swish, fwd::call)),
            (ResNet, EmitRule::new("resnet", "torchvision ResNet", decl::resnet, fwd::call)),
            (Vgg, EmitRule::new("vgg", "torchvision VGG", decl::vgg, fwd::call)),
            (MobileNetV2, EmitRule::new("mobilenet", "torchvision MobileNetV2", decl::mobilenet_v2, fwd::call)),
            (EfficientNet, EmitRule::new("efficientnet", "torchvision EfficientNet", decl::efficientnet, fwd::call)),
            (DenseNet, EmitRule::new("densenet", "torchvision DenseNet", decl::densenet, fwd::call)),
            (Bert, EmitRule::new("bert", "transformers BERT", decl::bert, fwd::call)),
            (Gpt2, EmitRule::new("gpt2", "transformers GPT-2", decl::gpt2, fwd::call)),
            (Transformer, EmitRule::new("transformer", "nn.Transformer", decl::transformer, fwd::transformer)),
            (Dropout, EmitRule::new("dropout", "nn.Dropout", decl::dropout, fwd::call)),
            (ZeroPadding2d, EmitRule::new("zeropad", "nn.ZeroPad2d", decl::zero_padding2d, fwd::call)),
            (Lambda, EmitRule::new("lambda", "Lambda", decl::lambda, fwd::call)),
            (Reshape, EmitRule::inline("reshape", "Tensor.view", fwd::reshape)),
            (Concatenate, EmitRule::inline("concat", "torch.cat", fwd::concat)),
            (Add, EmitRule::inline("add", "Add", fwd::sum)),
            (Multiply, EmitRule::inline("multiply", "Multiply", fwd::product)),
            (Identity, EmitRule::inline("identity", "Identity", fwd::pass_through)),
        ];
        for (kind, rule) in rules {
            registry.register(kind, rule);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_kind_has_a_rule() {
        let registry = EmitterRegistry::standard();
        for kind in NodeKind::known() {
            assert!(registry.contains(&kind), "no emission rule for {kind}");
        }
    }

    #[test]
    fn custom_kinds_use_the_placeholder() {
        let registry = EmitterRegistry::standard();
        let (rule, fallback) = registry.lookup(&NodeKind::parse("capsule"));
        assert!(fallback);
        assert_eq!(rule.prefix, "layer");
        assert!(rule.declares());
    }
}
