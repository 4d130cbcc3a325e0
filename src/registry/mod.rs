//! Module registries: one strategy per address scheme, plus the dispatcher
//! that routes between them.
//!
//! Two registries ship with the crate:
//!   - **Local**: relative paths, always available, never restored.
//!   - **OCI**: artifacts pulled from an OCI registry into a local cache.

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use crate::failure::ModuleFailure;
use crate::reference::{ModuleReference, Scheme};

mod dispatcher;
mod local;
pub mod oci;

pub use dispatcher::{ModuleStatus, RegistryDispatcher};
pub use local::LocalRegistry;
pub use oci::{ArtifactClient, HttpArtifactClient, OciRegistry, PulledArtifact};

#[cfg(test)]
pub(crate) mod test_support;


/// Why a registry could not restore a reference.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("request to '{url}' failed: {message}")]
    Http { url: String, message: String },

    #[error("the artifact \"{artifact}\" was not found in the registry")]
    NotFound { artifact: String },

    #[error("the registry denied access to \"{artifact}\" (status {status})")]
    Unauthorized { artifact: String, status: u16 },

    #[error("the registry returned status {status} for '{url}'")]
    Status { url: String, status: u16 },

    #[error("invalid artifact manifest: {0}")]
    Manifest(String),

    #[error("layer digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("response from '{url}' exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("cannot write to the module cache: {0}")]
    Io(String),

    #[error("the {scheme} registry cannot restore \"{reference}\"")]
    Unsupported { scheme: Scheme, reference: String },
}

/// Strategy for one address scheme.
pub trait ModuleRegistry: Send + Sync {
    fn scheme(&self) -> Scheme;

    /// Parse the address after `<scheme>:`.
    fn parse_reference(&self, raw: &str) -> Result<ModuleReference, ModuleFailure> {
        self.scheme().parse(raw)
    }

    /// True iff no local copy of the module exists yet.
    fn is_restore_required(&self, reference: &ModuleReference) -> bool;

    /// Local location of the module's entry file. `parent` is the URI of the
    /// file that declares the module.
    fn resolve_entry_point(
        &self,
        parent: &Url,
        reference: &ModuleReference,
    ) -> Result<Url, ModuleFailure>;

    /// Fetch every reference into the local cache. Returns only the failures.
    /// Restoring a reference that is already cached is a no-op success.
    fn restore(&self, references: &[ModuleReference]) -> HashMap<ModuleReference, RestoreError>;
}
