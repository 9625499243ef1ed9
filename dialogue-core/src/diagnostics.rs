use serde::{Deserialize, Serialize};

// ─── Warning rules ────────────────────────────────────────────

/// A weak reference whose old index has no remap entry: the node it named
/// no longer exists. Left untouched for the author to resolve.
pub const W_DANGLING: &str = "W-DANGLING";
/// An edge points at a declared root; roots hold no dense index, so the
/// edge's target index cannot be resolved.
pub const W_EDGE_TO_ROOT: &str = "W-EDGE-TO-ROOT";
/// An edge's target handle no longer resolves to a live node.
pub const W_DEAD_EDGE: &str = "W-DEAD-EDGE";

/// One non-fatal finding from a compile pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompileWarning {
    pub rule: String,
    pub message: String,
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Collected warnings, surfaced non-blockingly to the content author.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompileDiagnostics {
    warnings: Vec<CompileWarning>,
}

impl CompileDiagnostics {
    pub fn warn(&mut self, rule: &str, message: String) {
        tracing::warn!(rule, %message, "compile diagnostic");
        self.warnings.push(CompileWarning {
            rule: rule.to_string(),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.warnings.iter().any(|w| w.rule == rule)
    }
}
