//! Entry point for hosts: build a graph, restore what it needs, rebuild.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::diagnostic::Diagnostic;
use crate::failure::{BuildError, ModuleFailure};
use crate::files::FileResolver;
use crate::graph::{DependencyGraph, GraphBuilder};
use crate::registry::RegistryDispatcher;
use crate::restore::RestoreScheduler;
use crate::syntax::DeclarationId;
use crate::workspace::Workspace;

/// A finished dependency graph and the diagnostics it implies.
#[derive(Clone, Debug)]
pub struct Compilation {
    graph: DependencyGraph,
}

impl Compilation {
    pub fn new(graph: DependencyGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn entry(&self) -> &Url {
        self.graph.entry()
    }

    /// Diagnostics of one file, in declaration order.
    pub fn diagnostics_for(&self, uri: &Url) -> Vec<Diagnostic> {
        let Some(file) = self.graph.file(uri) else {
            return Vec::new();
        };
        file.declarations()
            .iter()
            .filter_map(|d| {
                self.graph
                    .failure(&d.id)
                    .map(|failure| failure.to_diagnostic(d.span))
            })
            .collect()
    }

    /// Diagnostics for every reachable file. Files without problems map to
    /// an empty list.
    pub fn diagnostics(&self) -> BTreeMap<Url, Vec<Diagnostic>> {
        self.graph
            .files()
            .map(|file| (file.uri().clone(), self.diagnostics_for(file.uri())))
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.graph.failures().is_empty()
    }
}

/// Builds compilations against one file resolver and one dispatcher.
pub struct CompilationProvider {
    resolver: Arc<dyn FileResolver>,
    dispatcher: Arc<RegistryDispatcher>,
}

impl CompilationProvider {
    pub fn new(resolver: Arc<dyn FileResolver>, dispatcher: Arc<RegistryDispatcher>) -> Self {
        Self {
            resolver,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<RegistryDispatcher> {
        &self.dispatcher
    }

    /// Build, restore every pending module synchronously, and rebuild.
    ///
    /// Restored modules can declare remote modules of their own, so this
    /// repeats until a rebuild leaves nothing pending.
    pub fn create(&self, workspace: &Workspace, entry: &Url) -> Result<Compilation, BuildError> {
        let mut graph = self.build(workspace, entry)?;
        let mut rounds = 0;
        while !graph.pending().is_empty() {
            rounds += 1;
            let pending = graph.pending_declarations();
            info!(round = rounds, modules = pending.len(), "restoring modules");
            let failures = self.dispatcher.restore(&pending);
            graph = self.rebuild(workspace, &graph, &failures)?;
        }
        Ok(Compilation::new(graph))
    }

    /// Build without restoring anything. Modules missing from the cache are
    /// reported as restore-required.
    pub fn create_without_restore(
        &self,
        workspace: &Workspace,
        entry: &Url,
    ) -> Result<Compilation, BuildError> {
        Ok(Compilation::new(self.build(workspace, entry)?))
    }

    /// Build without waiting for the network. Pending modules are handed to
    /// `scheduler`, which notifies its listener when they are restored.
    pub fn create_deferred(
        &self,
        workspace: &Workspace,
        entry: &Url,
        scheduler: &RestoreScheduler,
    ) -> Result<Compilation, BuildError> {
        let graph = self.build(workspace, entry)?;
        let compilation = Compilation::new(graph);
        self.schedule_pending(&compilation, scheduler);
        Ok(compilation)
    }

    /// Rebuild `current` after a restore finished.
    pub fn update(
        &self,
        workspace: &Workspace,
        current: &Compilation,
        restore_failures: &BTreeMap<DeclarationId, ModuleFailure>,
    ) -> Result<Compilation, BuildError> {
        let graph = self.rebuild(workspace, current.graph(), restore_failures)?;
        Ok(Compilation::new(graph))
    }

    /// Queue whatever `compilation` still waits for. Returns whether
    /// anything was queued.
    pub fn schedule_pending(
        &self,
        compilation: &Compilation,
        scheduler: &RestoreScheduler,
    ) -> bool {
        let pending = compilation.graph().pending_declarations();
        if pending.is_empty() {
            return false;
        }
        scheduler.request_restore(compilation.entry(), pending);
        true
    }

    fn build(&self, workspace: &Workspace, entry: &Url) -> Result<DependencyGraph, BuildError> {
        GraphBuilder::build(self.resolver.as_ref(), &self.dispatcher, workspace, entry)
    }

    fn rebuild(
        &self,
        workspace: &Workspace,
        current: &DependencyGraph,
        restore_failures: &BTreeMap<DeclarationId, ModuleFailure>,
    ) -> Result<DependencyGraph, BuildError> {
        GraphBuilder::rebuild(
            self.resolver.as_ref(),
            &self.dispatcher,
            workspace,
            current,
            restore_failures,
        )
    }
}
