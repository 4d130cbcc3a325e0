use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::cycle::find_cycles;
use super::DependencyGraph;
use crate::failure::{BuildError, ModuleFailure};
use crate::files::FileResolver;
use crate::registry::{ModuleStatus, RegistryDispatcher};
use crate::syntax::{display_path, DeclarationId, ModuleDeclaration, SourceFile};
use crate::workspace::Workspace;

/// State of one build or rebuild pass. Nothing survives the call except the
/// returned snapshot.
pub struct GraphBuilder<'a> {
    resolver: &'a dyn FileResolver,
    dispatcher: &'a RegistryDispatcher,
    workspace: &'a Workspace,
    is_rebuild: bool,

    // Carried over from the prior snapshot.
    carried_files: BTreeMap<Url, Arc<SourceFile>>,
    /// Declarations whose restore was attempted before this rebuild.
    attempted: BTreeSet<DeclarationId>,
    reported: BTreeMap<DeclarationId, ModuleFailure>,

    // This pass.
    files: BTreeMap<Url, Arc<SourceFile>>,
    load_failures: HashMap<Url, ModuleFailure>,
    resolutions: BTreeMap<DeclarationId, Url>,
    failures: BTreeMap<DeclarationId, ModuleFailure>,
    pending: BTreeSet<DeclarationId>,
}

impl<'a> GraphBuilder<'a> {
    fn new(
        resolver: &'a dyn FileResolver,
        dispatcher: &'a RegistryDispatcher,
        workspace: &'a Workspace,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            workspace,
            is_rebuild: false,
            carried_files: BTreeMap::new(),
            attempted: BTreeSet::new(),
            reported: BTreeMap::new(),
            files: BTreeMap::new(),
            load_failures: HashMap::new(),
            resolutions: BTreeMap::new(),
            failures: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    /// Discover every file reachable from `entry`.
    ///
    /// Fails only when the entry file itself cannot be loaded. Modules that
    /// still need a restore are recorded as pending.
    pub fn build(
        resolver: &'a dyn FileResolver,
        dispatcher: &'a RegistryDispatcher,
        workspace: &'a Workspace,
        entry: &Url,
    ) -> Result<DependencyGraph, BuildError> {
        Self::new(resolver, dispatcher, workspace).run(entry)
    }

    /// Rebuild `current` after a restore.
    ///
    /// Reuses the files `current` loaded and evaluates every declaration
    /// again, so files that have appeared since are picked up. A formerly
    /// pending declaration whose module is still missing reports
    /// `restore_failures[id]`, else the dispatcher's remembered failure, else
    /// `RestoreOutcomeMissing`.
    pub fn rebuild(
        resolver: &'a dyn FileResolver,
        dispatcher: &'a RegistryDispatcher,
        workspace: &'a Workspace,
        current: &DependencyGraph,
        restore_failures: &BTreeMap<DeclarationId, ModuleFailure>,
    ) -> Result<DependencyGraph, BuildError> {
        let mut builder = Self::new(resolver, dispatcher, workspace);
        builder.is_rebuild = true;
        builder.carried_files = current.files.clone();
        builder.attempted = current
            .pending
            .iter()
            .chain(restore_failures.keys())
            .cloned()
            .collect();
        builder.reported = restore_failures.clone();

        builder.run(&current.entry)
    }

    fn run(mut self, entry: &Url) -> Result<DependencyGraph, BuildError> {
        let entry_file = self.load(entry).map_err(|failure| BuildError::EntryPoint {
            uri: entry.clone(),
            failure,
        })?;
        self.files.insert(entry.clone(), entry_file.clone());

        let mut stack = vec![entry_file];
        while let Some(file) = stack.pop() {
            for declaration in file.declarations() {
                if let Some(next) = self.evaluate(&file, declaration) {
                    stack.push(next);
                }
            }
        }

        self.report_cycles();

        debug!(
            entry = %entry,
            files = self.files.len(),
            resolved = self.resolutions.len(),
            failed = self.failures.len(),
            pending = self.pending.len(),
            rebuild = self.is_rebuild,
            "graph built"
        );

        Ok(DependencyGraph {
            entry: entry.clone(),
            files: self.files,
            resolutions: self.resolutions,
            failures: self.failures,
            pending: self.pending,
        })
    }

    /// Evaluate one declaration. Returns a newly visited file whose own
    /// declarations still have to be evaluated.
    fn evaluate(
        &mut self,
        file: &SourceFile,
        declaration: &ModuleDeclaration,
    ) -> Option<Arc<SourceFile>> {
        let id = &declaration.id;
        match self.dispatcher.status(declaration) {
            ModuleStatus::Failed(failure) => {
                debug!(declaration = %id, error = %failure, "module unavailable");
                self.fail(id, failure);
                None
            }
            ModuleStatus::NeedsRestore(failure) => {
                if self.is_rebuild && self.attempted.contains(id) {
                    let failure = self.restore_outcome(declaration);
                    debug!(declaration = %id, error = %failure, "module still missing after restore");
                    self.fail(id, failure);
                } else {
                    debug!(declaration = %id, "module needs restore");
                    self.pending.insert(id.clone());
                    self.fail(id, failure);
                }
                None
            }
            ModuleStatus::Available => {
                let target = match self.dispatcher.resolve_entry_point(file.uri(), declaration) {
                    Ok(target) => target,
                    Err(failure) => {
                        self.fail(id, failure);
                        return None;
                    }
                };
                match self.visit(&target) {
                    Ok(next) => {
                        debug!(declaration = %id, target = %target, "module resolved");
                        self.resolve(id, target);
                        next
                    }
                    Err(failure) => {
                        self.fail(id, failure);
                        None
                    }
                }
            }
        }
    }

    fn restore_outcome(&self, declaration: &ModuleDeclaration) -> ModuleFailure {
        if let Some(failure) = self.reported.get(&declaration.id) {
            return failure.clone();
        }
        let reference = self.dispatcher.reference_for(declaration);
        if let Some(failure) = reference
            .as_ref()
            .ok()
            .and_then(|r| self.dispatcher.restore_failure(r))
        {
            return failure;
        }
        ModuleFailure::RestoreOutcomeMissing {
            reference: reference
                .map(|r| r.fully_qualified())
                .unwrap_or_else(|_| declaration.symbol.clone()),
        }
    }

    /// Mark `uri` visited in this pass. Returns the file if it was not
    /// visited before.
    fn visit(&mut self, uri: &Url) -> Result<Option<Arc<SourceFile>>, ModuleFailure> {
        if self.files.contains_key(uri) {
            return Ok(None);
        }
        let file = self.load(uri)?;
        self.files.insert(uri.clone(), file.clone());
        Ok(Some(file))
    }

    /// Workspace overlay first, then nodes carried from the prior snapshot,
    /// then the file resolver. Read failures are remembered for the pass.
    fn load(&mut self, uri: &Url) -> Result<Arc<SourceFile>, ModuleFailure> {
        if let Some(file) = self.workspace.get(uri) {
            return Ok(file);
        }
        if let Some(file) = self.carried_files.get(uri) {
            return Ok(file.clone());
        }
        if let Some(failure) = self.load_failures.get(uri) {
            return Err(failure.clone());
        }
        match self.resolver.read(uri) {
            Ok(text) => Ok(Arc::new(SourceFile::parse(uri.clone(), text))),
            Err(e) => {
                let failure = ModuleFailure::FileRead {
                    path: display_path(uri),
                    message: e.to_string(),
                };
                self.load_failures.insert(uri.clone(), failure.clone());
                Err(failure)
            }
        }
    }

    fn resolve(&mut self, id: &DeclarationId, target: Url) {
        self.failures.remove(id);
        self.resolutions.insert(id.clone(), target);
    }

    fn fail(&mut self, id: &DeclarationId, failure: ModuleFailure) {
        self.resolutions.remove(id);
        self.failures.insert(id.clone(), failure);
    }

    /// Replace resolutions whose target lies on a cycle with cycle failures.
    fn report_cycles(&mut self) {
        let edges: Vec<(Url, Url)> = self
            .resolutions
            .iter()
            .map(|(id, target)| (id.uri.clone(), target.clone()))
            .collect();
        let cycles = find_cycles(edges.iter().map(|(a, b)| (a, b)));
        if cycles.is_empty() {
            return;
        }

        let on_cycle: Vec<(DeclarationId, Vec<Url>)> = self
            .resolutions
            .iter()
            .filter_map(|(id, target)| cycles.get(target).map(|c| (id.clone(), c.clone())))
            .collect();
        for (id, cycle) in on_cycle {
            let failure = if cycle.len() == 1 {
                ModuleFailure::CyclicSelfReference
            } else {
                ModuleFailure::Cycle {
                    path: cycle.iter().map(display_path).collect(),
                }
            };
            debug!(declaration = %id, error = %failure, "cycle");
            self.fail(&id, failure);
        }
    }
}
