use std::hash::{Hash, Hasher};

use url::Url;

use super::{eq_ignore_case, hash_exact, hash_ignore_case};
use crate::failure::ModuleFailure;

/// An artifact in an OCI registry.
///
/// Registry hosts compare case-insensitively; repository and tag are
/// case-sensitive.
#[derive(Clone, Debug)]
pub struct OciArtifactReference {
    /// `host` or `host:port`.
    pub registry: String,
    /// Repository path including its leading `/`.
    pub repository: String,
    pub tag: String,
}

impl OciArtifactReference {
    /// `<registry><repository>:<tag>`
    pub fn artifact_id(&self) -> String {
        format!("{}{}:{}", self.registry, self.repository, self.tag)
    }

    /// Parse `<host>[:<port>]/<repository>:<tag>` (the part after `oci:`).
    pub fn parse(raw: &str) -> Result<Self, ModuleFailure> {
        let invalid = || ModuleFailure::InvalidOciReference {
            raw: format!("oci:{}", raw),
        };

        let (artifact, tag) = raw.rsplit_once(':').ok_or_else(invalid)?;
        if tag.trim().is_empty() || tag.contains('/') {
            return Err(invalid());
        }
        // The URL parser would silently collapse dot segments.
        if artifact.split('/').any(|s| s == "." || s == "..") {
            return Err(invalid());
        }

        // Artifact references are not URIs; borrow a URL parser for the
        // authority and path by faking a scheme.
        let url = Url::parse(&format!("oci://{}", artifact)).map_err(|_| invalid())?;
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(invalid()),
        };
        if !url.username().is_empty() || url.password().is_some() || url.fragment().is_some() {
            return Err(invalid());
        }

        let registry = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let mut repository = url.path().to_string();
        let segments: Vec<&str> = repository.trim_start_matches('/').split('/').collect();
        if !repository.starts_with('/')
            || segments
                .iter()
                .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return Err(invalid());
        }
        if let Some(query) = url.query() {
            repository.push('?');
            repository.push_str(query);
        }

        Ok(Self {
            registry,
            repository,
            tag: tag.to_string(),
        })
    }

    /// Repository path segments, without the leading `/` or a query.
    pub fn repository_segments(&self) -> Vec<&str> {
        let path = self.repository.split('?').next().unwrap_or_default();
        path.trim_start_matches('/').split('/').collect()
    }
}

impl PartialEq for OciArtifactReference {
    fn eq(&self, other: &Self) -> bool {
        eq_ignore_case(&self.registry, &other.registry)
            && self.repository == other.repository
            && self.tag == other.tag
    }
}

impl Eq for OciArtifactReference {}

impl Hash for OciArtifactReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ignore_case(&self.registry, state);
        hash_exact(&self.repository, state);
        hash_exact(&self.tag, state);
    }
}
