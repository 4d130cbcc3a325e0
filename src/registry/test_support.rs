//! In-memory registry for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use url::Url;

use super::{ModuleRegistry, RestoreError};
use crate::failure::ModuleFailure;
use crate::reference::{ModuleReference, Scheme};

#[derive(Default)]
struct State {
    entries: HashMap<ModuleReference, Url>,
    available: HashSet<ModuleReference>,
    failing: HashMap<ModuleReference, RestoreError>,
    batches: Vec<Vec<ModuleReference>>,
}

/// Registry whose modules map to fixed entry URIs. A module is "restored"
/// by flipping it to available.
pub(crate) struct FakeRegistry {
    scheme: Scheme,
    state: Mutex<State>,
    restore_required_calls: AtomicUsize,
}

impl FakeRegistry {
    pub(crate) fn new(scheme: Scheme) -> Self {
        Self {
            scheme,
            state: Mutex::new(State::default()),
            restore_required_calls: AtomicUsize::new(0),
        }
    }

    /// Register a module by its unqualified address.
    pub(crate) fn add_module(&self, raw: &str, entry: Url, available: bool) {
        let reference = self.scheme.parse(raw).unwrap();
        let mut state = self.state.lock().unwrap();
        state.entries.insert(reference.clone(), entry);
        if available {
            state.available.insert(reference);
        }
    }

    pub(crate) fn fail_restore(&self, raw: &str, error: RestoreError) {
        let reference = self.scheme.parse(raw).unwrap();
        self.state.lock().unwrap().failing.insert(reference, error);
    }

    pub(crate) fn heal(&self, raw: &str) {
        let reference = self.scheme.parse(raw).unwrap();
        self.state.lock().unwrap().failing.remove(&reference);
    }

    /// Every `restore` call, in order.
    pub(crate) fn batches(&self) -> Vec<Vec<ModuleReference>> {
        self.state.lock().unwrap().batches.clone()
    }

    /// Number of `is_restore_required` calls so far.
    pub(crate) fn restore_required_calls(&self) -> usize {
        self.restore_required_calls.load(Ordering::SeqCst)
    }
}

impl ModuleRegistry for FakeRegistry {
    fn scheme(&self) -> Scheme {
        self.scheme
    }

    fn is_restore_required(&self, reference: &ModuleReference) -> bool {
        self.restore_required_calls.fetch_add(1, Ordering::SeqCst);
        !self.state.lock().unwrap().available.contains(reference)
    }

    fn resolve_entry_point(
        &self,
        _parent: &Url,
        reference: &ModuleReference,
    ) -> Result<Url, ModuleFailure> {
        let state = self.state.lock().unwrap();
        match state.entries.get(reference) {
            Some(entry) if state.available.contains(reference) => Ok(entry.clone()),
            _ => Err(ModuleFailure::EntryPointMissing {
                reference: reference.fully_qualified(),
                path: String::new(),
            }),
        }
    }

    fn restore(&self, references: &[ModuleReference]) -> HashMap<ModuleReference, RestoreError> {
        let mut state = self.state.lock().unwrap();
        state.batches.push(references.to_vec());
        let mut errors = HashMap::new();
        for reference in references {
            if let Some(error) = state.failing.get(reference) {
                errors.insert(reference.clone(), error.clone());
            } else if state.entries.contains_key(reference) {
                state.available.insert(reference.clone());
            } else {
                errors.insert(
                    reference.clone(),
                    RestoreError::NotFound {
                        artifact: reference.unqualified(),
                    },
                );
            }
        }
        errors
    }
}
