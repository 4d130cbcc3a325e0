//! OCI artifact registry backed by a local module cache.
//!
//! Layout:
//! ```text
//! <cache>/oci/
//! └── <registry>/                 lowercased, ':' → '$'
//!     └── <repository segments>/
//!         └── <tag>$/
//!             ├── manifest.json   raw OCI manifest
//!             ├── metadata.json   layer digest, content hash, restore time
//!             └── main.json       module entry point
//! ```
//!
//! The entry point is written last through a rename, so its presence means
//! the artifact is complete. Tags get a trailing `$` so a tag can never
//! collide with a nested repository segment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{ModuleRegistry, RestoreError};
use crate::failure::ModuleFailure;
use crate::hash::ContentHash;
use crate::reference::{ModuleReference, OciArtifactReference, Scheme};

mod client;

pub use client::{ArtifactClient, HttpArtifactClient, PulledArtifact};


pub const ENTRY_POINT_FILE: &str = "main.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Sidecar written next to every restored artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub reference: String,
    pub layer_digest: String,
    /// blake3 of the entry point bytes.
    pub content_hash: String,
    pub restored_at: u64,
}

pub struct OciRegistry {
    root: PathBuf,
    client: Arc<dyn ArtifactClient>,
}

impl OciRegistry {
    /// Registry caching under `<cache_dir>/oci`.
    pub fn new(cache_dir: &Path, client: Arc<dyn ArtifactClient>) -> Self {
        Self {
            root: cache_dir.join("oci"),
            client,
        }
    }

    /// Cache directory of one artifact.
    pub fn module_dir(&self, reference: &OciArtifactReference) -> PathBuf {
        let mut dir = self
            .root
            .join(reference.registry.to_ascii_lowercase().replace(':', "$"));
        for segment in reference.repository_segments() {
            dir.push(segment);
        }
        dir.push(format!("{}$", reference.tag));
        dir
    }

    pub fn entry_point_path(&self, reference: &OciArtifactReference) -> PathBuf {
        self.module_dir(reference).join(ENTRY_POINT_FILE)
    }

    /// Read the metadata sidecar of a restored artifact.
    pub fn metadata(&self, reference: &OciArtifactReference) -> Option<ArtifactMetadata> {
        let path = self.module_dir(reference).join(METADATA_FILE);
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn restore_one(&self, reference: &OciArtifactReference) -> Result<(), RestoreError> {
        let entry = self.entry_point_path(reference);
        if entry.is_file() {
            debug!(artifact = %reference.artifact_id(), "already cached");
            return Ok(());
        }

        let artifact = self.client.pull(reference)?;
        let dir = self.module_dir(reference);
        std::fs::create_dir_all(&dir).map_err(io_error)?;
        std::fs::write(dir.join(MANIFEST_FILE), &artifact.manifest).map_err(io_error)?;

        let metadata = ArtifactMetadata {
            reference: reference.artifact_id(),
            layer_digest: artifact.layer_digest.clone(),
            content_hash: ContentHash::of(&artifact.layer).to_hex(),
            restored_at: unix_timestamp(),
        };
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| RestoreError::Io(e.to_string()))?;
        std::fs::write(dir.join(METADATA_FILE), json).map_err(io_error)?;

        let tmp = dir.join(format!("{}.{}.tmp", ENTRY_POINT_FILE, std::process::id()));
        std::fs::write(&tmp, &artifact.layer).map_err(io_error)?;
        std::fs::rename(&tmp, &entry).map_err(io_error)?;

        info!(
            artifact = %reference.artifact_id(),
            bytes = artifact.layer.len(),
            "restored module"
        );
        Ok(())
    }
}

impl ModuleRegistry for OciRegistry {
    fn scheme(&self) -> Scheme {
        Scheme::Oci
    }

    fn is_restore_required(&self, reference: &ModuleReference) -> bool {
        match reference {
            ModuleReference::OciArtifact(r) => !self.entry_point_path(r).is_file(),
            _ => false,
        }
    }

    fn resolve_entry_point(
        &self,
        _parent: &Url,
        reference: &ModuleReference,
    ) -> Result<Url, ModuleFailure> {
        let ModuleReference::OciArtifact(r) = reference else {
            return Err(ModuleFailure::EntryPointUnresolvable {
                reference: reference.fully_qualified(),
                reason: "not an OCI artifact reference".to_string(),
            });
        };

        let path = self.entry_point_path(r);
        if !path.is_file() {
            return Err(ModuleFailure::EntryPointMissing {
                reference: reference.fully_qualified(),
                path: path.display().to_string(),
            });
        }
        Url::from_file_path(&path).map_err(|_| ModuleFailure::EntryPointUnresolvable {
            reference: reference.fully_qualified(),
            reason: format!("cache path '{}' is not absolute", path.display()),
        })
    }

    fn restore(&self, references: &[ModuleReference]) -> HashMap<ModuleReference, RestoreError> {
        references
            .par_iter()
            .filter_map(|reference| {
                let result = match reference {
                    ModuleReference::OciArtifact(r) => self.restore_one(r),
                    other => Err(RestoreError::Unsupported {
                        scheme: Scheme::Oci,
                        reference: other.fully_qualified(),
                    }),
                };
                match result {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(reference = %reference, error = %e, "restore failed");
                        Some((reference.clone(), e))
                    }
                }
            })
            .collect()
    }
}

fn io_error(e: std::io::Error) -> RestoreError {
    RestoreError::Io(e.to_string())
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
