use std::collections::HashMap;

use url::Url;

use super::{ModuleRegistry, RestoreError};
use crate::failure::ModuleFailure;
use crate::reference::{ModuleReference, Scheme};

/// Modules addressed by a path relative to the declaring file.
#[derive(Clone, Debug, Default)]
pub struct LocalRegistry;

impl ModuleRegistry for LocalRegistry {
    fn scheme(&self) -> Scheme {
        Scheme::Local
    }

    fn is_restore_required(&self, _reference: &ModuleReference) -> bool {
        false
    }

    fn resolve_entry_point(
        &self,
        parent: &Url,
        reference: &ModuleReference,
    ) -> Result<Url, ModuleFailure> {
        let ModuleReference::Local(local) = reference else {
            return Err(ModuleFailure::EntryPointUnresolvable {
                reference: reference.fully_qualified(),
                reason: "not a local module reference".to_string(),
            });
        };

        parent
            .join(&local.path)
            .map_err(|e| ModuleFailure::EntryPointUnresolvable {
                reference: local.path.clone(),
                reason: e.to_string(),
            })
    }

    fn restore(&self, _references: &[ModuleReference]) -> HashMap<ModuleReference, RestoreError> {
        HashMap::new()
    }
}
