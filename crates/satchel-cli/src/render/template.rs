//! Minimal `{{ variable }}` substitution over a JSON object context
//!
//! Context files are plain text with `{{ dotted.path }}` placeholders.
//! Placeholders must resolve: an unknown variable aborts the component's
//! installation rather than silently writing a half-rendered artifact.
//! Conditional logic lives at the context-spec level (see
//! [`crate::render::predicate`]), not inside content templates.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // the pattern is a compile-time constant
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}").unwrap()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template syntax error: unterminated '{{{{' near offset {0}")]
    Syntax(usize),

    #[error("undefined template variable '{0}'")]
    UndefinedVariable(String),
}

/// Look up a dotted path (`platform.name`) in a JSON object context
pub fn lookup_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Render a JSON value as substitution text
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Substitute every `{{ dotted.path }}` placeholder in `template`
pub fn render_str(template: &str, context: &Value) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut last_end = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let Some(path) = captures.get(1) else {
            continue;
        };

        output.push_str(&template[last_end..whole.start()]);

        let value = lookup_path(context, path.as_str())
            .ok_or_else(|| TemplateError::UndefinedVariable(path.as_str().to_string()))?;
        output.push_str(&value_to_string(value));

        last_end = whole.end();
    }

    let tail = &template[last_end..];
    if let Some(offset) = tail.find("{{") {
        return Err(TemplateError::Syntax(last_end + offset));
    }
    output.push_str(tail);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple() {
        let ctx = json!({"name": "World"});
        assert_eq!(
            render_str("Hello, {{ name }}", &ctx),
            Ok("Hello, World".to_string())
        );
    }

    #[test]
    fn test_render_dotted_path() {
        let ctx = json!({"platform": {"name": "claude", "version": "1.0.0"}});
        assert_eq!(
            render_str("on {{ platform.name }} {{platform.version}}", &ctx),
            Ok("on claude 1.0.0".to_string())
        );
    }

    #[test]
    fn test_render_non_string_values() {
        let ctx = json!({"count": 3, "enabled": true});
        assert_eq!(
            render_str("{{ count }} items, enabled={{ enabled }}", &ctx),
            Ok("3 items, enabled=true".to_string())
        );
    }

    #[test]
    fn test_undefined_variable_is_fatal() {
        let ctx = json!({"name": "World"});
        assert_eq!(
            render_str("Hi {{ missing.var }}", &ctx),
            Err(TemplateError::UndefinedVariable("missing.var".to_string()))
        );
    }

    #[test]
    fn test_unterminated_placeholder_is_syntax_error() {
        let ctx = json!({});
        assert!(matches!(
            render_str("broken {{ name", &ctx),
            Err(TemplateError::Syntax(_))
        ));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let ctx = json!({});
        assert_eq!(
            render_str("no placeholders here", &ctx),
            Ok("no placeholders here".to_string())
        );
    }

    #[test]
    fn test_lookup_path_missing_segment() {
        let ctx = json!({"a": {"b": 1}});
        assert!(lookup_path(&ctx, "a.b").is_some());
        assert!(lookup_path(&ctx, "a.c").is_none());
        assert!(lookup_path(&ctx, "a.b.c").is_none());
    }
}
