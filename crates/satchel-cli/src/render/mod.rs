//! Context rendering
//!
//! Turns a component's context spec (one file, or an ordered list of plain
//! and conditional items) into the final text the platform adapter shapes
//! into installed artifacts.

pub mod context;
pub mod predicate;
pub mod template;

pub use context::resolve_context;
pub use template::render_str;

/// A fatal rendering failure, naming the offending context file
///
/// Raised for template syntax errors and unresolved variables; missing
/// context files are NOT failures (they render as placeholders or are
/// skipped, depending on the spec shape).
#[derive(Debug, Clone)]
pub struct RenderFailure {
    pub file: String,
    pub reason: String,
}

impl std::fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to render '{}': {}", self.file, self.reason)
    }
}

impl std::error::Error for RenderFailure {}
