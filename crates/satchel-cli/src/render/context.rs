//! Context spec resolution
//!
//! A component's context is one relative file path, or an ordered list of
//! items where each item is a plain path or a `{ path, when }` conditional.
//! List items render in order and concatenate with newline separation.
//!
//! Missing files are tolerated: a plain single-path spec (and plain list
//! items) render an inert placeholder comment; conditional list items are
//! silently skipped. Template errors inside an existing file are fatal and
//! name that file.

use serde_json::Value;
use std::fs;
use std::path::Path;

use satchel_manifest::{ContextItem, ContextSpec};

use super::predicate;
use super::template;
use super::RenderFailure;

/// Resolve a context spec into rendered text
pub fn resolve_context(
    spec: &ContextSpec,
    source_dir: &Path,
    context: &Value,
) -> Result<String, RenderFailure> {
    match spec {
        ContextSpec::Single(path) => render_item(path, source_dir, context, true),
        ContextSpec::Many(items) => {
            let mut pieces = Vec::new();
            for item in items {
                match item {
                    ContextItem::Plain(path) => {
                        pieces.push(render_item(path, source_dir, context, true)?);
                    }
                    ContextItem::Conditional { path, when } => {
                        if !predicate::evaluate(when, context) {
                            tracing::debug!(%path, %when, "conditional context item skipped");
                            continue;
                        }
                        // A missing conditional item drops out silently
                        if !source_dir.join(normalize(path)).is_file() {
                            tracing::debug!(%path, "conditional context file missing, skipped");
                            continue;
                        }
                        pieces.push(render_item(path, source_dir, context, false)?);
                    }
                }
            }
            Ok(pieces.join("\n"))
        }
    }
}

/// Strip a leading `./` so placeholder messages and joins stay clean
fn normalize(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

fn render_item(
    path: &str,
    source_dir: &Path,
    context: &Value,
    placeholder_when_missing: bool,
) -> Result<String, RenderFailure> {
    let rel = normalize(path);
    let full = source_dir.join(rel);

    let raw = match fs::read_to_string(&full) {
        Ok(content) => content,
        Err(err) => {
            if placeholder_when_missing {
                tracing::debug!(path = rel, error = %err, "context file not readable");
                return Ok(format!("<!-- Context file not found: {rel} -->\n"));
            }
            return Ok(String::new());
        }
    };

    template::render_str(&raw, context).map_err(|err| RenderFailure {
        file: rel.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_single_path_renders() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("s.md"), "Hello, {{ name }}").is_err() {
            return;
        }

        let spec = ContextSpec::Single("./s.md".to_string());
        let rendered = resolve_context(&spec, dir.path(), &json!({"name": "World"}));
        assert!(rendered.is_ok_and(|text| text == "Hello, World"));
    }

    #[test]
    fn test_missing_single_path_renders_placeholder() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let spec = ContextSpec::Single("./s.md".to_string());
        let rendered = resolve_context(&spec, dir.path(), &json!({}));
        assert!(rendered.is_ok_and(|text| text == "<!-- Context file not found: s.md -->\n"));
    }

    #[test]
    fn test_list_renders_in_order_with_newlines() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("a.md"), "alpha").is_err() {
            return;
        }
        if fs::write(dir.path().join("b.md"), "beta").is_err() {
            return;
        }

        let spec = ContextSpec::Many(vec![
            ContextItem::Plain("./a.md".to_string()),
            ContextItem::Plain("./b.md".to_string()),
        ]);
        let rendered = resolve_context(&spec, dir.path(), &json!({}));
        assert!(rendered.is_ok_and(|text| text == "alpha\nbeta"));
    }

    #[test]
    fn test_conditional_item_respects_predicate() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("base.md"), "base").is_err() {
            return;
        }
        if fs::write(dir.path().join("extra.md"), "extra").is_err() {
            return;
        }

        let spec = ContextSpec::Many(vec![
            ContextItem::Plain("./base.md".to_string()),
            ContextItem::Conditional {
                path: "./extra.md".to_string(),
                when: "profile == 'strict'".to_string(),
            },
        ]);

        let off = resolve_context(&spec, dir.path(), &json!({"profile": "lax"}));
        assert!(off.is_ok_and(|text| text == "base"));

        let on = resolve_context(&spec, dir.path(), &json!({"profile": "strict"}));
        assert!(on.is_ok_and(|text| text == "base\nextra"));
    }

    #[test]
    fn test_missing_conditional_item_is_skipped() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("base.md"), "base").is_err() {
            return;
        }

        let spec = ContextSpec::Many(vec![
            ContextItem::Plain("./base.md".to_string()),
            ContextItem::Conditional {
                path: "./gone.md".to_string(),
                when: "true".to_string(),
            },
        ]);
        let rendered = resolve_context(&spec, dir.path(), &json!({}));
        assert!(rendered.is_ok_and(|text| text == "base"));
    }

    #[test]
    fn test_template_error_names_file() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("s.md"), "Hi {{ nope }}").is_err() {
            return;
        }

        let spec = ContextSpec::Single("./s.md".to_string());
        let rendered = resolve_context(&spec, dir.path(), &json!({}));
        assert!(rendered.is_err_and(|err| err.file == "s.md" && err.reason.contains("nope")));
    }

    #[test]
    fn test_missing_plain_list_item_renders_placeholder() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let spec = ContextSpec::Many(vec![ContextItem::Plain("./gone.md".to_string())]);
        let rendered = resolve_context(&spec, dir.path(), &json!({}));
        assert!(rendered.is_ok_and(|text| text == "<!-- Context file not found: gone.md -->\n"));
    }
}
