//! Dependency graph snapshots.
//!
//! A [`DependencyGraph`] is built from an entry file by [`GraphBuilder`]: every
//! reachable file, and for every module declaration in those files either the
//! URI it resolved to or the failure that stopped it. Snapshots are immutable;
//! a rebuild produces a new one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use url::Url;

use crate::failure::ModuleFailure;
use crate::syntax::{DeclarationId, ModuleDeclaration, SourceFile};

mod builder;
mod cycle;

pub use builder::GraphBuilder;
pub use cycle::find_cycles;


#[derive(Clone, Debug)]
pub struct DependencyGraph {
    pub(crate) entry: Url,
    pub(crate) files: BTreeMap<Url, Arc<SourceFile>>,
    pub(crate) resolutions: BTreeMap<DeclarationId, Url>,
    pub(crate) failures: BTreeMap<DeclarationId, ModuleFailure>,
    pub(crate) pending: BTreeSet<DeclarationId>,
}

impl DependencyGraph {
    pub fn entry(&self) -> &Url {
        &self.entry
    }

    pub fn entry_file(&self) -> Option<&Arc<SourceFile>> {
        self.files.get(&self.entry)
    }

    /// Every reachable file, ordered by URI.
    pub fn files(&self) -> impl Iterator<Item = &Arc<SourceFile>> {
        self.files.values()
    }

    pub fn file(&self, uri: &Url) -> Option<&Arc<SourceFile>> {
        self.files.get(uri)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn resolution(&self, id: &DeclarationId) -> Option<&Url> {
        self.resolutions.get(id)
    }

    pub fn failure(&self, id: &DeclarationId) -> Option<&ModuleFailure> {
        self.failures.get(id)
    }

    pub fn resolutions(&self) -> &BTreeMap<DeclarationId, Url> {
        &self.resolutions
    }

    pub fn failures(&self) -> &BTreeMap<DeclarationId, ModuleFailure> {
        &self.failures
    }

    /// Declarations waiting for their module to be restored.
    pub fn pending(&self) -> &BTreeSet<DeclarationId> {
        &self.pending
    }

    pub fn pending_declarations(&self) -> Vec<ModuleDeclaration> {
        self.pending
            .iter()
            .filter_map(|id| self.declaration(id).cloned())
            .collect()
    }

    pub fn declaration(&self, id: &DeclarationId) -> Option<&ModuleDeclaration> {
        self.files.get(&id.uri)?.declaration(id)
    }

    /// Distinct resolved targets of the declarations in `uri`, in
    /// declaration order.
    pub fn dependencies(&self, uri: &Url) -> Vec<&Url> {
        let Some(file) = self.files.get(uri) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        file.declarations()
            .iter()
            .filter_map(|d| self.resolutions.get(&d.id))
            .filter(|target| seen.insert(*target))
            .collect()
    }

    /// True when no declaration failed and none is pending.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.pending.is_empty()
    }
}
