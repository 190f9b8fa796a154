//! `__init__` declarations, one function per kind.
//!
//! Each function receives the node's parameters and its emission name and returns one or more lines
//! of Python, unindented.
use super::python::{single_line, ParamReader};

pub(super) type DeclareFn = fn(&ParamReader<'_>, &str) -> String;

pub(super) fn linear(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.Linear({}, {}, bias={})",
        p.lit("in_features", "512"), p.lit("out_features", "256"), p.flag("bias", true))
}

pub(super) fn flatten(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.Flatten(start_dim={}, end_dim={})", p.lit("start_dim", "1"), p.lit("end_dim", "-1"))
}

pub(super) fn embedding(p: &ParamReader<'_>, name: &str) -> String {
    let padding = p.optional("padding_idx").map(|idx| format!(", padding_idx={idx}")).unwrap_or_default();
    format!("self.{name} = nn.Embedding({}, {}{padding}, sparse={})",
        p.lit("num_embeddings", "10000"), p.lit("embedding_dim", "300"), p.flag("sparse", false))
}

fn conv(class: &str, p: &ParamReader<'_>, name: &str, with_groups: bool) -> String {
    let groups = if with_groups { format!(", groups={}", p.lit("groups", "1")) } else { String::new() };
    format!("self.{name} = nn.{class}({}, {}, kernel_size={}, stride={}, padding={}, dilation={}{groups}, bias={})",
        p.lit("in_channels", "1"), p.lit("out_channels", "64"), p.lit("kernel_size", "3"), p.lit("stride", "1"),
        p.quoted("padding", "valid"), p.lit("dilation", "1"), p.flag("bias", true))
}

pub(super) fn conv1d(p: &ParamReader<'_>, name: &str) -> String {
    conv("Conv1d", p, name, true)
}

pub(super) fn conv2d(p: &ParamReader<'_>, name: &str) -> String {
    conv("Conv2d", p, name, true)
}

pub(super) fn conv3d(p: &ParamReader<'_>, name: &str) -> String {
    conv("Conv3d", p, name, false)
}

pub(super) fn depthwise_conv2d(p: &ParamReader<'_>, name: &str) -> String {
    let in_channels = p.lit("in_channels", "32");
    let multiplier = p.lit("depth_multiplier", "1");
    [
        "# Depthwise separable convolution: depthwise followed by pointwise".to_string(),
        format!("self.{name}_depthwise = nn.Conv2d({in_channels}, {in_channels} * {multiplier}, kernel_size={}, stride={}, padding={}, groups={in_channels})",
            p.lit("kernel_size", "3"), p.lit("stride", "1"), p.quoted("padding", "1")),
        format!("self.{name}_pointwise = nn.Conv2d({in_channels} * {multiplier}, {}, kernel_size=1)", p.lit("out_channels", "64")),
    ].join("\n")
}

pub(super) fn transposed_conv2d(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.ConvTranspose2d({}, {}, kernel_size={}, stride={}, padding={}, output_padding={}, dilation={}, bias={})",
        p.lit("in_channels", "64"), p.lit("out_channels", "32"), p.lit("kernel_size", "4"), p.lit("stride", "2"),
        p.lit("padding", "1"), p.lit("output_padding", "0"), p.lit("dilation", "1"), p.flag("bias", true))
}

fn max_pool(class: &str, p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.{class}(kernel_size={}, stride={}, padding={}, dilation={}, ceil_mode={})",
        p.lit("kernel_size", "2"), p.lit("stride", "2"), p.lit("padding", "0"), p.lit("dilation", "1"), p.flag("ceil_mode", false))
}

fn avg_pool(class: &str, p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.{class}(kernel_size={}, stride={}, padding={}, ceil_mode={})",
        p.lit("kernel_size", "2"), p.lit("stride", "2"), p.lit("padding", "0"), p.flag("ceil_mode", false))
}

pub(super) fn maxpool1d(p: &ParamReader<'_>, name: &str) -> String {
    max_pool("MaxPool1d", p, name)
}

pub(super) fn avgpool1d(p: &ParamReader<'_>, name: &str) -> String {
    avg_pool("AvgPool1d", p, name)
}

pub(super) fn maxpool2d(p: &ParamReader<'_>, name: &str) -> String {
    max_pool("MaxPool2d", p, name)
}

pub(super) fn avgpool2d(p: &ParamReader<'_>, name: &str) -> String {
    avg_pool("AvgPool2d", p, name)
}

pub(super) fn maxpool3d(p: &ParamReader<'_>, name: &str) -> String {
    max_pool("MaxPool3d", p, name)
}

pub(super) fn avgpool3d(p: &ParamReader<'_>, name: &str) -> String {
    avg_pool("AvgPool3d", p, name)
}

pub(super) fn adaptive_maxpool2d(p: &ParamReader<'_>, name: &str) -> String {
    let size = p.lit("output_size", "1");
    format!("self.{name} = nn.AdaptiveMaxPool2d(output_size=({size}, {size}))")
}

pub(super) fn global_avgpool(_: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.AdaptiveAvgPool2d(output_size=(1, 1))")
}

fn running_norm(class: &str, p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.{class}({}, eps={}, momentum={}, affine={}, track_running_stats={})",
        p.lit("num_features", "64"), p.lit("eps", "1e-05"), p.lit("momentum", "0.1"),
        p.flag("affine", true), p.flag("track_running_stats", true))
}

pub(super) fn batchnorm1d(p: &ParamReader<'_>, name: &str) -> String {
    running_norm("BatchNorm1d", p, name)
}

pub(super) fn batchnorm2d(p: &ParamReader<'_>, name: &str) -> String {
    running_norm("BatchNorm2d", p, name)
}

pub(super) fn batchnorm3d(p: &ParamReader<'_>, name: &str) -> String {
    running_norm("BatchNorm3d", p, name)
}

pub(super) fn instancenorm2d(p: &ParamReader<'_>, name: &str) -> String {
    running_norm("InstanceNorm2d", p, name)
}

pub(super) fn layernorm(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.LayerNorm({}, eps={}, elementwise_affine={})",
        p.lit("normalized_shape", "512"), p.lit("eps", "1e-05"), p.flag("elementwise_affine", true))
}

pub(super) fn groupnorm(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.GroupNorm({}, {}, eps={}, affine={})",
        p.lit("num_groups", "32"), p.lit("num_channels", "64"), p.lit("eps", "1e-05"), p.flag("affine", true))
}

fn recurrent(class: &str, p: &ParamReader<'_>, name: &str) -> String {
    let nonlinearity = p.optional("nonlinearity")
        .map(|_| format!(", nonlinearity={}", p.quoted("nonlinearity", "tanh")))
        .unwrap_or_default();
    format!("self.{name} = nn.{class}({}, {}, num_layers={}{nonlinearity}, batch_first={}, dropout={}, bidirectional={}, bias={})",
        p.lit("input_size", "128"), p.lit("hidden_size", "256"), p.lit("num_layers", "1"),
        p.flag("batch_first", true), p.lit("dropout", "0"), p.flag("bidirectional", false), p.flag("bias", true))
}

pub(super) fn lstm(p: &ParamReader<'_>, name: &str) -> String {
    recurrent("LSTM", p, name)
}

pub(super) fn gru(p: &ParamReader<'_>, name: &str) -> String {
    recurrent("GRU", p, name)
}

pub(super) fn rnn(p: &ParamReader<'_>, name: &str) -> String {
    recurrent("RNN", p, name)
}

pub(super) fn multihead_attention(p: &ParamReader<'_>, name: &str) -> String {
    let mut line = format!("self.{name} = nn.MultiheadAttention({}, {}, dropout={}, bias={}, add_bias_kv={}, add_zero_attn={}",
        p.lit("embed_dim", "512"), p.lit("num_heads", "8"), p.lit("dropout", "0.1"),
        p.flag("bias", true), p.flag("add_bias_kv", false), p.flag("add_zero_attn", false));
    for key in ["kdim", "vdim"] {
        if let Some(value) = p.optional(key) {
            line.push_str(&format!(", {key}={value}"));
        }
    }
    line.push_str(", batch_first=True)");
    line
}

pub(super) fn self_attention(p: &ParamReader<'_>, name: &str) -> String {
    let hidden = p.lit("hidden_size", "512");
    [
        format!("self.{name} = nn.MultiheadAttention({hidden}, {}, dropout={}, batch_first=True)",
            p.lit("num_attention_heads", "8"), p.lit("attention_dropout", "0.1")),
        format!("self.{name}_dropout = nn.Dropout({})", p.lit("hidden_dropout", "0.1")),
        format!("self.{name}_norm = nn.LayerNorm({hidden})"),
    ].join("\n")
}

pub(super) fn scaled_dot_product_attention(p: &ParamReader<'_>, name: &str) -> String {
    [
        format!("self.{name}_dropout = nn.Dropout({})", p.lit("dropout", "0.1")),
        format!("self.{name}_scale = {}  # None uses 1/sqrt(d_k)", p.lit("scale", "None")),
    ].join("\n")
}

pub(super) fn relu(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.ReLU(inplace={})", p.flag("inplace", false))
}

pub(super) fn sigmoid(_: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.Sigmoid()")
}

pub(super) fn tanh(_: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.Tanh()")
}

pub(super) fn leaky_relu(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.LeakyReLU(negative_slope={}, inplace={})", p.lit("negative_slope", "0.01"), p.flag("inplace", false))
}

pub(super) fn elu(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.ELU(alpha={}, inplace={})", p.lit("alpha", "1.0"), p.flag("inplace", false))
}

pub(super) fn selu(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.SELU(inplace={})", p.flag("inplace", false))
}

pub(super) fn prelu(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.PReLU(num_parameters={}, init={})", p.lit("num_parameters", "1"), p.lit("init", "0.25"))
}

pub(super) fn mish(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.Mish(inplace={})", p.flag("inplace", false))
}

pub(super) fn swish(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.SiLU(inplace={})", p.flag("inplace", false))
}

fn weights(p: &ParamReader<'_>, tag: &str) -> String {
    if p.truthy("pretrained", false) {
        format!("weights='{tag}'")
    } else {
        "weights=None".to_string()
    }
}

/// Replacement head when the class count differs from the ImageNet default.
fn head(p: &ParamReader<'_>, line: impl FnOnce(usize) -> String) -> Option<String> {
    p.count("num_classes").filter(|classes| *classes != 1000).map(line)
}

fn with_head(constructor: String, head: Option<String>) -> String {
    match head {
        Some(head) => format!("{constructor}\n{head}"),
        None => constructor,
    }
}

pub(super) fn resnet(p: &ParamReader<'_>, name: &str) -> String {
    with_head(
        format!("self.{name} = models.resnet{}({})", p.text("num_layers", "18"), weights(p, "IMAGENET1K_V1")),
        head(p, |classes| format!("self.{name}.fc = nn.Linear(self.{name}.fc.in_features, {classes})")),
    )
}

pub(super) fn vgg(p: &ParamReader<'_>, name: &str) -> String {
    let suffix = if p.truthy("batch_norm", false) { "_bn" } else { "" };
    with_head(
        format!("self.{name} = models.vgg{}{suffix}({})", p.text("version", "16"), weights(p, "IMAGENET1K_V1")),
        head(p, |classes| format!("self.{name}.classifier[-1] = nn.Linear(4096, {classes})")),
    )
}

pub(super) fn mobilenet_v2(p: &ParamReader<'_>, name: &str) -> String {
    with_head(
        format!("self.{name} = models.mobilenet_v2({}, width_mult={})", weights(p, "IMAGENET1K_V2"), p.lit("width_mult", "1.0")),
        head(p, |classes| format!("self.{name}.classifier[-1] = nn.Linear(self.{name}.classifier[-1].in_features, {classes})")),
    )
}

pub(super) fn efficientnet(p: &ParamReader<'_>, name: &str) -> String {
    with_head(
        format!("self.{name} = models.efficientnet_{}({})", p.text("variant", "b0"), weights(p, "IMAGENET1K_V1")),
        head(p, |classes| format!("self.{name}.classifier[-1] = nn.Linear(self.{name}.classifier[-1].in_features, {classes})")),
    )
}

pub(super) fn densenet(p: &ParamReader<'_>, name: &str) -> String {
    with_head(
        format!("self.{name} = models.densenet{}({})", p.text("num_layers", "121"), weights(p, "IMAGENET1K_V1")),
        head(p, |classes| format!("self.{name}.classifier = nn.Linear(self.{name}.classifier.in_features, {classes})")),
    )
}

pub(super) fn bert(p: &ParamReader<'_>, name: &str) -> String {
    let labels = p.lit("num_labels", "2");
    if p.truthy("from_pretrained", true) {
        [
            "from transformers import BertForSequenceClassification".to_string(),
            format!("self.{name} = BertForSequenceClassification.from_pretrained({}, num_labels={labels})",
                p.quoted("model_name", "bert-base-uncased")),
        ].join("\n")
    } else {
        [
            "from transformers import BertConfig, BertForSequenceClassification".to_string(),
            format!("self.{name} = BertForSequenceClassification(BertConfig(num_labels={labels}))"),
        ].join("\n")
    }
}

pub(super) fn gpt2(p: &ParamReader<'_>, name: &str) -> String {
    let class = if p.text("task_type", "language_modeling") == "sequence_classification" {
        "GPT2ForSequenceClassification"
    } else {
        "GPT2LMHeadModel"
    };
    if p.truthy("from_pretrained", true) {
        [
            format!("from transformers import {class}"),
            format!("self.{name} = {class}.from_pretrained({})", p.quoted("model_name", "gpt2")),
        ].join("\n")
    } else {
        [
            format!("from transformers import GPT2Config, {class}"),
            format!("self.{name} = {class}(GPT2Config())"),
        ].join("\n")
    }
}

pub(super) fn transformer(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.Transformer(\n    d_model={},\n    nhead={},\n    num_encoder_layers={},\n    num_decoder_layers={},\n    dim_feedforward={},\n    dropout={},\n    activation={},\n    batch_first={}\n)",
        p.lit("d_model", "512"), p.lit("nhead", "8"), p.lit("num_encoder_layers", "6"), p.lit("num_decoder_layers", "6"),
        p.lit("dim_feedforward", "2048"), p.lit("dropout", "0.1"), p.quoted("activation", "relu"), p.flag("batch_first", true))
}

pub(super) fn dropout(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.Dropout(p={}, inplace={})", p.lit("p", "0.5"), p.flag("inplace", false))
}

pub(super) fn zero_padding2d(p: &ParamReader<'_>, name: &str) -> String {
    format!("self.{name} = nn.ZeroPad2d({})", p.lit("padding", "1"))
}

pub(super) fn lambda(p: &ParamReader<'_>, name: &str) -> String {
    [
        format!("# Lambda: {}", p.text("function", "lambda x: x")),
        format!("self.{name} = nn.Identity()  # placeholder, implement the function in forward()"),
    ].join("\n")
}

/// Stand-in for kinds without a registered rule.
pub(super) fn placeholder(p: &ParamReader<'_>, name: &str) -> String {
    let node = p.node();
    [
        format!("# {} layer (kind '{}' has no code template)", single_line(&node.name), single_line(node.kind.as_str())),
        format!("self.{name} = nn.Identity()  # placeholder, replace with the real layer"),
    ].join("\n")
}
