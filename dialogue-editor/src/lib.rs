//! Editor-side ownership of the dialogue graph and its compiler.
//!
//! `EditorSession` is the single owner: it holds the graph store and the
//! compiler and passes references where they are needed, rather than
//! exposing a process-wide singleton. It also enforces the compile
//! gating contract: multi-step edits (paste, undo batches, format
//! migration) run inside a suppression scope and compile exactly once at
//! the transaction boundary.

use anyhow::Result;
use dialogue_core::remap::RemapApplier;
use dialogue_core::{
    CompileDiagnostics, CompileError, CompileOutput, Compiler, DialogueGraph, NodeRef, RemapSink,
};

// ─── Session ──────────────────────────────────────────────────

pub struct EditorSession {
    graph: DialogueGraph,
    compiler: Compiler,
    /// While true, compile requests are refused; edits are mid-transaction.
    suppressed: bool,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            graph: DialogueGraph::new(),
            compiler: Compiler::new(),
            suppressed: false,
        }
    }

    pub fn graph(&self) -> &DialogueGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut DialogueGraph {
        &mut self.graph
    }

    /// Compile now, then fix up the injected external weak-reference
    /// holders with the pass's remap table. Sinks are passed explicitly
    /// per call; the session keeps no hidden registry.
    pub fn compile_with(&mut self, sinks: &mut [&mut dyn RemapSink]) -> Result<CompileOutput> {
        if self.suppressed {
            return Err(CompileError::Suppressed.into());
        }
        let mut output = self.compiler.compile(&mut self.graph)?;
        let applier = RemapApplier::new(&output.remap, &self.graph);
        for sink in sinks {
            sink.apply_remap(&applier, &mut output.diagnostics);
        }
        tracing::info!(
            nodes = output.node_count,
            warnings = output.diagnostics.warnings().len(),
            "graph compiled"
        );
        Ok(output)
    }

    pub fn compile(&mut self) -> Result<CompileOutput> {
        self.compile_with(&mut [])
    }

    /// Run a multi-step edit with compilation suppressed, then compile
    /// once at the boundary. The closure gets the raw graph; intermediate
    /// states may be arbitrarily inconsistent and are never compiled.
    /// The flag clears even if the edit panics, so a caught unwind does
    /// not leave the session refusing every future compile.
    pub fn batch<T>(
        &mut self,
        sinks: &mut [&mut dyn RemapSink],
        edit: impl FnOnce(&mut DialogueGraph) -> T,
    ) -> Result<(T, CompileOutput)> {
        let value = {
            let _scope = SuppressionScope::enter(&mut self.suppressed);
            edit(&mut self.graph)
        };
        let output = self.compile_with(sinks)?;
        Ok((value, output))
    }
}

/// Holds the suppression flag high for one edit transaction and restores
/// it on drop, unwind included.
struct SuppressionScope<'a> {
    flag: &'a mut bool,
}

impl<'a> SuppressionScope<'a> {
    fn enter(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }
}

impl Drop for SuppressionScope<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

// ─── Shipped external holder ──────────────────────────────────

/// Runtime-facing "has node N been visited" ledger. Holds nodes purely by
/// dense index (plus the GUID validation key), so it must be remapped
/// after every compile pass.
#[derive(Debug, Default)]
pub struct VisitHistory {
    entries: Vec<NodeRef>,
}

impl VisitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, reference: NodeRef) {
        self.entries.push(reference);
    }

    pub fn contains_index(&self, index: u32) -> bool {
        self.entries.iter().any(|r| r.index == index)
    }

    pub fn entries(&self) -> &[NodeRef] {
        &self.entries
    }
}

impl RemapSink for VisitHistory {
    fn apply_remap(&mut self, applier: &RemapApplier, diags: &mut CompileDiagnostics) {
        for reference in &mut self.entries {
            applier.rewrite(reference, diags, "visit history");
        }
    }
}
