//! Python literal rendering of parameter values.
use crate::graph::{Node, ParamValue};

pub fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

pub fn py_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Literal for a value used in a numeric or free-form position. Text is emitted as one line.
pub fn py_literal(value: &ParamValue) -> String {
    match value {
        ParamValue::Null => "None".to_string(),
        ParamValue::Bool(b) => py_bool(*b).to_string(),
        ParamValue::Int(i) => i.to_string(),
        ParamValue::Float(x) => py_float(*x),
        ParamValue::Text(s) => single_line(s),
    }
}

pub fn py_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n").replace('\r', "\\r");
    format!("'{escaped}'")
}

/// Collapses line breaks so free text stays on the line it is spliced into.
pub fn single_line(text: &str) -> String {
    text.split(['\r', '\n']).filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Reads a node's parameters as Python source fragments, substituting defaults for missing or unset values.
#[derive(Clone, Copy, Debug)]
pub struct ParamReader<'a> {
    node: &'a Node,
}

impl<'a> ParamReader<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }

    fn value(&self, key: &str) -> Option<&'a ParamValue> {
        self.node.param(key).filter(|v| !v.is_null())
    }

    pub fn lit(&self, key: &str, default: &str) -> String {
        self.value(key).map(py_literal).unwrap_or_else(|| default.to_string())
    }

    /// Like [`ParamReader::lit`] but quotes text, for values such as `padding='same'`.
    pub fn quoted(&self, key: &str, default: &str) -> String {
        match self.value(key) {
            Some(ParamValue::Text(s)) => py_string(s),
            Some(value) => py_literal(value),
            None => py_string(default),
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> &'static str {
        py_bool(self.truthy(key, default))
    }

    pub fn truthy(&self, key: &str, default: bool) -> bool {
        self.value(key).and_then(ParamValue::as_bool).unwrap_or(default)
    }

    pub fn optional(&self, key: &str) -> Option<String> {
        self.value(key).map(py_literal)
    }

    pub fn text(&self, key: &str, default: &str) -> String {
        match self.value(key) {
            Some(ParamValue::Text(s)) => single_line(s),
            Some(value) => py_literal(value),
            None => default.to_string(),
        }
    }

    pub fn count(&self, key: &str) -> Option<usize> {
        self.value(key).and_then(ParamValue::as_usize)
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_render_as_python_literals() {
        assert_eq!(py_float(1.0), "1.0");
        assert_eq!(py_float(0.1), "0.1");
        assert_eq!(py_float(1e-5), "0.00001");
        assert_eq!(py_literal(&ParamValue::Int(-1)), "-1");
        assert_eq!(py_literal(&ParamValue::Null), "None");
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(py_string("same"), "'same'");
        assert_eq!(py_string("it's"), "'it\\'s'");
        assert_eq!(py_string("a\nb"), "'a\\nb'");
    }

    #[test]
    fn free_text_stays_on_one_line() {
        assert_eq!(single_line("lambda x:\n  x * 2"), "lambda x:   x * 2");
        assert_eq!(single_line("2,\r\n3"), "2, 3");
        assert_eq!(py_literal(&ParamValue::Text("-1,\n64".to_string())), "-1, 64");
    }
}
