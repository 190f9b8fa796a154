//! `forward()` statements, one function per call shape.
use super::python::ParamReader;

/// Everything needed to write the statements of one node in `forward()`.
pub(super) struct ForwardStep<'a> {
    pub name: &'a str,
    /// Upstream tensors in acceptance order. Never empty: a source node reads the model input.
    pub inputs: &'a [String],
    pub output: &'a str,
    pub params: ParamReader<'a>,
}

impl ForwardStep<'_> {
    fn first(&self) -> &str {
        self.inputs.first().map(String::as_str).unwrap_or("x")
    }

    fn args(&self) -> String {
        self.inputs.join(", ")
    }

    /// Query, key and value: one input is attended to itself, two inputs share key and value.
    fn qkv(&self) -> String {
        match self.inputs {
            [x] => format!("{x}, {x}, {x}"),
            [query, memory] => format!("{query}, {memory}, {memory}"),
            _ => self.args(),
        }
    }
}

pub(super) type ForwardFn = fn(&ForwardStep<'_>) -> Vec<String>;

pub(super) fn call(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{} = self.{}({})", step.output, step.name, step.args())]
}

/// Modules returning `(output, state)` pairs.
pub(super) fn call_pair(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{}, _ = self.{}({})", step.output, step.name, step.args())]
}

pub(super) fn attention(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{}, _ = self.{}({})", step.output, step.name, step.qkv())]
}

pub(super) fn self_attention(step: &ForwardStep<'_>) -> Vec<String> {
    let (out, name, x) = (step.output, step.name, step.first());
    vec![
        format!("{out}, _ = self.{name}({x}, {x}, {x})"),
        format!("{out} = self.{name}_norm({x} + self.{name}_dropout({out}))"),
    ]
}

pub(super) fn scaled_dot_product(step: &ForwardStep<'_>) -> Vec<String> {
    let name = step.name;
    vec![format!(
        "{} = F.scaled_dot_product_attention({}, dropout_p=self.{name}_dropout.p if self.training else 0.0, scale=self.{name}_scale)",
        step.output,
        step.qkv(),
    )]
}

pub(super) fn depthwise(step: &ForwardStep<'_>) -> Vec<String> {
    let name = step.name;
    vec![format!("{} = self.{name}_pointwise(self.{name}_depthwise({}))", step.output, step.first())]
}

pub(super) fn transformer(step: &ForwardStep<'_>) -> Vec<String> {
    let args = match step.inputs {
        [x] => format!("{x}, {x}"),
        _ => step.args(),
    };
    vec![format!("{} = self.{}({args})", step.output, step.name)]
}

pub(super) fn sum(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{} = {}", step.output, step.inputs.join(" + "))]
}

pub(super) fn product(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{} = {}", step.output, step.inputs.join(" * "))]
}

pub(super) fn concat(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{} = torch.cat([{}], dim={})", step.output, step.args(), step.params.lit("dim", "1"))]
}

pub(super) fn pass_through(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{} = {}", step.output, step.first())]
}

pub(super) fn reshape(step: &ForwardStep<'_>) -> Vec<String> {
    vec![format!("{} = {}.view({})", step.output, step.first(), step.params.text("shape", "-1"))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::graph::NodeId;
    use crate::kind::NodeKind;

    fn lines(kind: NodeKind, inputs: &[&str], f: ForwardFn) -> Vec<String> {
        let catalog = Catalog::standard();
        let node = catalog.entry(&kind).unwrap().instantiate(NodeId(0));
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        f(&ForwardStep { name: "layer_1", inputs: &inputs, output: "x1", params: ParamReader::new(&node) })
    }

    #[test]
    fn single_input_attention_attends_to_itself() {
        assert_eq!(lines(NodeKind::MultiheadAttention, &["x"], attention), vec!["x1, _ = self.layer_1(x, x, x)"]);
        assert_eq!(lines(NodeKind::MultiheadAttention, &["x2", "x3"], attention), vec!["x1, _ = self.layer_1(x2, x3, x3)"]);
    }

    #[test]
    fn merges_keep_input_order() {
        assert_eq!(lines(NodeKind::Add, &["x3", "x2"], sum), vec!["x1 = x3 + x2"]);
        assert_eq!(lines(NodeKind::Concatenate, &["a", "b"], concat), vec!["x1 = torch.cat([a, b], dim=1)"]);
        assert_eq!(lines(NodeKind::Reshape, &["x"], reshape), vec!["x1 = x.view(-1, 128)"]);
    }
}
