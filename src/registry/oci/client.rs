/// Maximum accepted size of a manifest or layer (32 MiB).
const MAX_RESPONSE_SIZE: usize = 32 * 1024 * 1024;

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::registry::RestoreError;
use crate::reference::OciArtifactReference;

const MANIFEST_MEDIA_TYPES: &str =
    "application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json";

/// Bytes of one pulled artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PulledArtifact {
    /// Raw manifest as served by the registry.
    pub manifest: Vec<u8>,
    pub layer_digest: String,
    /// Contents of the single module layer, already digest-verified.
    pub layer: Vec<u8>,
}

/// Transport that fetches artifacts from an OCI registry.
pub trait ArtifactClient: Send + Sync {
    fn pull(&self, reference: &OciArtifactReference) -> Result<PulledArtifact, RestoreError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OciManifest {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    pub layers: Vec<OciDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OciDescriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

/// Parse a manifest and check that it describes exactly one layer.
pub(crate) fn parse_manifest(bytes: &[u8]) -> Result<OciManifest, RestoreError> {
    let manifest: OciManifest =
        serde_json::from_slice(bytes).map_err(|e| RestoreError::Manifest(e.to_string()))?;
    if manifest.schema_version != 2 {
        return Err(RestoreError::Manifest(format!(
            "unsupported schema version {}",
            manifest.schema_version
        )));
    }
    if manifest.layers.len() != 1 {
        return Err(RestoreError::Manifest(format!(
            "expected a single layer, found {}",
            manifest.layers.len()
        )));
    }
    Ok(manifest)
}

/// Check `bytes` against an OCI digest string (`sha256:<hex>`).
pub(crate) fn verify_digest(expected: &str, bytes: &[u8]) -> Result<(), RestoreError> {
    let Some(hex_digest) = expected.strip_prefix("sha256:") else {
        return Err(RestoreError::Manifest(format!(
            "unsupported digest algorithm in '{}'",
            expected
        )));
    };
    let actual = hex::encode(Sha256::digest(bytes));
    if !actual.eq_ignore_ascii_case(hex_digest) {
        return Err(RestoreError::DigestMismatch {
            expected: expected.to_string(),
            actual: format!("sha256:{}", actual),
        });
    }
    Ok(())
}

/// Distribution-API client over HTTPS.
pub struct HttpArtifactClient {
    http: Client,
    /// Registries contacted over plain HTTP.
    plain_http: Vec<String>,
}

impl HttpArtifactClient {
    pub fn new(timeout: Duration, plain_http: Vec<String>) -> Result<Self, RestoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("modlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RestoreError::Http {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { http, plain_http })
    }

    pub(super) fn repository_url(&self, reference: &OciArtifactReference) -> String {
        let protocol = if self
            .plain_http
            .iter()
            .any(|r| r.eq_ignore_ascii_case(&reference.registry))
        {
            "http"
        } else {
            "https"
        };
        format!(
            "{}://{}/v2/{}",
            protocol,
            reference.registry,
            reference.repository_segments().join("/")
        )
    }

    fn get(
        &self,
        url: &str,
        accept: Option<&str>,
        reference: &OciArtifactReference,
    ) -> Result<Vec<u8>, RestoreError> {
        debug!(url, "GET");
        let mut request = self.http.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        let response = request.send().map_err(|e| RestoreError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        match status {
            404 => {
                return Err(RestoreError::NotFound {
                    artifact: reference.artifact_id(),
                })
            }
            401 | 403 => {
                return Err(RestoreError::Unauthorized {
                    artifact: reference.artifact_id(),
                    status,
                })
            }
            s if s >= 400 => {
                return Err(RestoreError::Status {
                    url: url.to_string(),
                    status: s,
                })
            }
            _ => {}
        }

        let too_large = || RestoreError::TooLarge {
            url: url.to_string(),
            limit: MAX_RESPONSE_SIZE,
        };
        if response.content_length().unwrap_or(0) > MAX_RESPONSE_SIZE as u64 {
            return Err(too_large());
        }
        let body = response.bytes().map_err(|e| RestoreError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if body.len() > MAX_RESPONSE_SIZE {
            return Err(too_large());
        }
        Ok(body.to_vec())
    }
}

impl ArtifactClient for HttpArtifactClient {
    fn pull(&self, reference: &OciArtifactReference) -> Result<PulledArtifact, RestoreError> {
        let base = self.repository_url(reference);

        let manifest_url = format!("{}/manifests/{}", base, reference.tag);
        let manifest = self.get(&manifest_url, Some(MANIFEST_MEDIA_TYPES), reference)?;
        let parsed = parse_manifest(&manifest)?;
        let layer = &parsed.layers[0];
        if layer.size > MAX_RESPONSE_SIZE as u64 {
            return Err(RestoreError::TooLarge {
                url: manifest_url,
                limit: MAX_RESPONSE_SIZE,
            });
        }
        debug!(
            artifact = %reference.artifact_id(),
            manifest_type = parsed.media_type.as_deref().unwrap_or("unspecified"),
            media_type = %layer.media_type,
            digest = %layer.digest,
            "resolved manifest"
        );

        let blob_url = format!("{}/blobs/{}", base, layer.digest);
        let blob = self.get(&blob_url, None, reference)?;
        verify_digest(&layer.digest, &blob)?;

        Ok(PulledArtifact {
            manifest,
            layer_digest: layer.digest.clone(),
            layer: blob,
        })
    }
}
