use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use super::{HttpArtifactClient, LocalRegistry, ModuleRegistry, OciRegistry, RestoreError};
use crate::config::{Config, ConfigError};
use crate::failure::ModuleFailure;
use crate::reference::{ModuleReference, Scheme};
use crate::syntax::{DeclarationId, ModuleDeclaration};

/// Where a declared module stands before the graph builder loads it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleStatus {
    /// A local copy exists; the entry point can be resolved.
    Available,
    /// No local copy yet. The failure is what the declaration reports until
    /// a restore succeeds.
    NeedsRestore(ModuleFailure),
    /// Unparseable reference, unroutable scheme, or a remembered restore
    /// failure.
    Failed(ModuleFailure),
}

/// Routes module references to the registry for their scheme.
///
/// Holds two caches:
///   - parsed references per declaration, so each declaration is parsed once
///   - restore failures per reference, so a failed fetch is not retried on
///     every rebuild
pub struct RegistryDispatcher {
    registries: BTreeMap<Scheme, Arc<dyn ModuleRegistry>>,
    references: Mutex<HashMap<DeclarationId, Result<ModuleReference, ModuleFailure>>>,
    restore_failures: RwLock<HashMap<ModuleReference, ModuleFailure>>,
}

impl RegistryDispatcher {
    /// Dispatcher over `registries`; a later registry for the same scheme
    /// replaces an earlier one.
    pub fn new(registries: Vec<Arc<dyn ModuleRegistry>>) -> Self {
        Self {
            registries: registries.into_iter().map(|r| (r.scheme(), r)).collect(),
            references: Mutex::new(HashMap::new()),
            restore_failures: RwLock::new(HashMap::new()),
        }
    }

    /// Local and OCI registries, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let cache_dir = config.cache_dir().ok_or(ConfigError::NoCacheDir)?;
        let client = HttpArtifactClient::new(
            Duration::from_secs(config.oci.timeout_secs),
            config.oci.plain_http.clone(),
        )
        .map_err(|e| ConfigError::Client(e.to_string()))?;
        debug!(cache = %cache_dir.display(), "module cache");

        let registries: Vec<Arc<dyn ModuleRegistry>> = vec![
            Arc::new(LocalRegistry),
            Arc::new(OciRegistry::new(&cache_dir, Arc::new(client))),
        ];
        Ok(Self::new(registries))
    }

    /// Names of the registered non-local schemes, sorted. The local scheme
    /// has no name and is never listed.
    pub fn available_schemes(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registries
            .keys()
            .filter(|s| **s != Scheme::Local)
            .map(|s| s.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Parse an address string. Text before the first `:` selects the
    /// scheme; no `:` means a local path.
    pub fn parse_reference(&self, raw: &str) -> Result<ModuleReference, ModuleFailure> {
        if raw.is_empty() {
            return Err(ModuleFailure::PathNotSpecified);
        }
        let (scheme, rest) = match raw.split_once(':') {
            None => (Some(Scheme::Local), raw),
            Some((prefix, rest)) => (Scheme::from_prefix(prefix), rest),
        };
        match scheme.and_then(|s| self.registries.get(&s)) {
            Some(registry) => registry.parse_reference(rest),
            None => Err(ModuleFailure::UnknownScheme {
                scheme: raw.split_once(':').map(|(p, _)| p).unwrap_or("").to_string(),
                available: self.available_schemes(),
            }),
        }
    }

    /// Reference of a declaration, parsed at most once per declaration id.
    pub fn reference_for(
        &self,
        declaration: &ModuleDeclaration,
    ) -> Result<ModuleReference, ModuleFailure> {
        let mut references = self.references.lock().unwrap_or_else(|e| e.into_inner());
        references
            .entry(declaration.id.clone())
            .or_insert_with(|| {
                declaration
                    .path
                    .clone()
                    .and_then(|raw| self.parse_reference(&raw))
            })
            .clone()
    }

    pub fn status(&self, declaration: &ModuleDeclaration) -> ModuleStatus {
        let reference = match self.reference_for(declaration) {
            Ok(r) => r,
            Err(failure) => return ModuleStatus::Failed(failure),
        };
        if let Some(failure) = self.restore_failure(&reference) {
            return ModuleStatus::Failed(failure);
        }
        let registry = match self.registry_for(&reference) {
            Ok(r) => r,
            Err(failure) => return ModuleStatus::Failed(failure),
        };
        if registry.is_restore_required(&reference) {
            ModuleStatus::NeedsRestore(ModuleFailure::RestoreRequired {
                reference: reference.fully_qualified(),
            })
        } else {
            ModuleStatus::Available
        }
    }

    /// Entry file of the module a declaration refers to. `parent` is the
    /// declaring file.
    pub fn resolve_entry_point(
        &self,
        parent: &Url,
        declaration: &ModuleDeclaration,
    ) -> Result<Url, ModuleFailure> {
        let reference = self.reference_for(declaration)?;
        if let Some(failure) = self.restore_failure(&reference) {
            return Err(failure);
        }
        self.registry_for(&reference)?
            .resolve_entry_point(parent, &reference)
    }

    /// Restore the modules of `declarations`, one registry call per scheme.
    ///
    /// Returns a failure for every declaration whose module could not be
    /// restored. Declarations with unparseable references are skipped.
    /// References with a remembered failure are not fetched again; their
    /// failure is reported as is.
    pub fn restore(
        &self,
        declarations: &[ModuleDeclaration],
    ) -> BTreeMap<DeclarationId, ModuleFailure> {
        let mut failures = BTreeMap::new();

        let mut order: Vec<ModuleReference> = Vec::new();
        let mut owners: HashMap<ModuleReference, Vec<DeclarationId>> = HashMap::new();
        for declaration in declarations {
            let Ok(reference) = self.reference_for(declaration) else {
                continue;
            };
            let ids = owners.entry(reference.clone()).or_insert_with(|| {
                order.push(reference);
                Vec::new()
            });
            ids.push(declaration.id.clone());
        }

        let mut by_scheme: BTreeMap<Scheme, Vec<ModuleReference>> = BTreeMap::new();
        for reference in order {
            if let Some(failure) = self.restore_failure(&reference) {
                for id in &owners[&reference] {
                    failures.insert(id.clone(), failure.clone());
                }
                continue;
            }
            by_scheme
                .entry(reference.scheme())
                .or_default()
                .push(reference);
        }

        for (scheme, references) in by_scheme {
            let Some(registry) = self.registries.get(&scheme) else {
                let failure = ModuleFailure::UnknownScheme {
                    scheme: scheme.name().to_string(),
                    available: self.available_schemes(),
                };
                for reference in &references {
                    for id in &owners[reference] {
                        failures.insert(id.clone(), failure.clone());
                    }
                }
                continue;
            };

            debug!(%scheme, count = references.len(), "restoring");
            let errors = registry.restore(&references);
            let mut cache = self
                .restore_failures
                .write()
                .unwrap_or_else(|e| e.into_inner());
            for reference in &references {
                match errors.get(reference) {
                    Some(error) => {
                        let failure = restore_failed(reference, error);
                        warn!(reference = %reference, error = %error, "module restore failed");
                        cache.insert(reference.clone(), failure.clone());
                        for id in &owners[reference] {
                            failures.insert(id.clone(), failure.clone());
                        }
                    }
                    None if registry.is_restore_required(reference) => {
                        // Reported success but left nothing in the cache.
                        let failure = ModuleFailure::RestoreOutcomeMissing {
                            reference: reference.fully_qualified(),
                        };
                        for id in &owners[reference] {
                            failures.insert(id.clone(), failure.clone());
                        }
                    }
                    None => {
                        cache.remove(reference);
                    }
                }
            }
        }

        info!(
            declarations = declarations.len(),
            failed = failures.len(),
            "restore finished"
        );
        failures
    }

    /// The remembered restore failure of `reference`, if any.
    pub fn restore_failure(&self, reference: &ModuleReference) -> Option<ModuleFailure> {
        self.restore_failures
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(reference)
            .cloned()
    }

    /// Forget every remembered restore failure so the next restore retries.
    pub fn clear_restore_failures(&self) {
        self.restore_failures
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Drop parsed references of declarations in `uri`.
    pub fn forget_file(&self, uri: &Url) {
        self.references
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|id, _| &id.uri != uri);
    }

    #[cfg(test)]
    pub(crate) fn cached_reference_count(&self) -> usize {
        self.references
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn registry_for(
        &self,
        reference: &ModuleReference,
    ) -> Result<&Arc<dyn ModuleRegistry>, ModuleFailure> {
        self.registries
            .get(&reference.scheme())
            .ok_or_else(|| ModuleFailure::UnknownScheme {
                scheme: reference.scheme().name().to_string(),
                available: self.available_schemes(),
            })
    }
}

fn restore_failed(reference: &ModuleReference, error: &RestoreError) -> ModuleFailure {
    ModuleFailure::RestoreFailed {
        reference: reference.fully_qualified(),
        message: error.to_string(),
    }
}
