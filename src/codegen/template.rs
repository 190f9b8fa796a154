//! `{{NAME}}` placeholder substitution over the output templates.

pub const MODEL_TEMPLATE: &str = include_str!("../../templates/model.py.tmpl");
pub const TRAINING_TEMPLATE: &str = include_str!("../../templates/train.py.tmpl");
pub const INFERENCE_TEMPLATE: &str = include_str!("../../templates/infer.py.tmpl");

/// Replaces every `{{KEY}}` listed in `values` in a single pass, so substituted text is never rescanned.
/// Unknown placeholders are left in place.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let key = &after[..end];
            values.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v, end))
        });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Placeholder names still present in `text`, in order of first appearance.
pub fn unresolved(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let name = &after[..end];
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            if !found.iter().any(|f| f == name) {
                found.push(name.to_string());
            }
        }
        rest = &after[end + 2..];
    }
    found
}

/// Prefixes every non-empty line of `block` with `indent`.
pub fn indent(block: &str, indent: &str) -> String {
    block.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("{indent}{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_names_and_reports_the_rest() {
        let text = render("class {{MODEL_NAME}}: {{BODY}} {{MODEL_NAME}}", &[("MODEL_NAME", "Net")]);
        assert_eq!(text, "class Net: {{BODY}} Net");
        assert_eq!(unresolved(&text), vec!["BODY".to_string()]);
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let text = render("{{LAYERS}}\n{{FORWARD_CODE}}", &[
            ("LAYERS", "# Lambda: {{FORWARD_CODE}}"),
            ("FORWARD_CODE", "return x"),
        ]);
        assert_eq!(text, "# Lambda: {{FORWARD_CODE}}\nreturn x");
    }

    #[test]
    fn python_dict_literals_are_not_placeholders() {
        assert!(unresolved("d = {{'a': 1}}").is_empty());
    }

    #[test]
    fn bundled_templates_only_use_known_names() {
        for template in [MODEL_TEMPLATE, TRAINING_TEMPLATE, INFERENCE_TEMPLATE] {
            for name in unresolved(template) {
                assert!(
                    ["MODEL_NAME", "TORCHVISION_IMPORT", "LAYERS", "FORWARD_CODE", "MODEL_SUMMARY", "INPUT"].contains(&name.as_str()),
                    "unexpected placeholder {name}"
                );
            }
        }
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\nb", "    "), "    a\n\n    b");
    }
}
