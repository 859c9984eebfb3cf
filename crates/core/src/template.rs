//! Prompt template rendering.
//!
//! Placeholders are written `{{name}}` (whitespace inside the braces is
//! ignored) and substituted from a JSON variable map. Rendering is strict:
//! a placeholder with no matching variable is an error, so typos in prompt
//! templates surface immediately instead of producing silently broken
//! prompts.

use serde_json::{Map, Value};

use crate::error::TemplateError;

/// Render `template`, substituting `{{name}}` placeholders from `vars`.
///
/// Strings render verbatim, numbers and booleans via their display form,
/// null as the empty string, arrays and objects as compact JSON.
pub fn render(template: &str, vars: &Map<String, Value>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            let offset = template.len() - rest.len() + start;
            return Err(TemplateError::Unclosed(offset));
        };
        let name = after_open[..end].trim();
        let value = vars
            .get(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
        out.push_str(&render_value(value));
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn substitutes_placeholders() {
        let rendered = render(
            "Solve {{task}} in at most {{step_limit}} steps.",
            &vars(&[("task", json!("the bug")), ("step_limit", json!(10))]),
        )
        .unwrap();
        assert_eq!(rendered, "Solve the bug in at most 10 steps.");
    }

    #[test]
    fn whitespace_inside_braces_is_ignored() {
        let rendered = render("{{ task }}", &vars(&[("task", json!("x"))])).unwrap();
        assert_eq!(rendered, "x");
    }

    #[test]
    fn unknown_placeholder_is_strict() {
        let err = render("{{missing}}", &Map::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder(name) if name == "missing"));
    }

    #[test]
    fn unclosed_placeholder_reports_offset() {
        let err = render("prefix {{task", &Map::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Unclosed(7)));
    }

    #[test]
    fn null_renders_empty() {
        let rendered = render("[{{ctx}}]", &vars(&[("ctx", Value::Null)])).unwrap();
        assert_eq!(rendered, "[]");
    }

    #[test]
    fn no_placeholders_passes_through() {
        let rendered = render("plain text", &Map::new()).unwrap();
        assert_eq!(rendered, "plain text");
    }
}
