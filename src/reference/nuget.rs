use std::hash::{Hash, Hasher};

use super::{eq_ignore_case, hash_ignore_case};
use crate::failure::ModuleFailure;

/// A NuGet package. Both the package id and the version compare
/// case-insensitively.
#[derive(Clone, Debug)]
pub struct NugetReference {
    pub package_id: String,
    pub version: String,
}

impl NugetReference {
    /// `<package-id>@<version>`
    pub fn unqualified(&self) -> String {
        format!("{}@{}", self.package_id, self.version)
    }

    /// Parse `<package-id>@<version>` (the part after `nuget:`).
    pub fn parse(raw: &str) -> Result<Self, ModuleFailure> {
        match raw.split_once('@') {
            Some((id, version)) if !id.is_empty() && !version.is_empty() => Ok(Self {
                package_id: id.to_string(),
                version: version.to_string(),
            }),
            _ => Err(ModuleFailure::InvalidNugetReference {
                raw: format!("nuget:{}", raw),
            }),
        }
    }
}

impl PartialEq for NugetReference {
    fn eq(&self, other: &Self) -> bool {
        eq_ignore_case(&self.package_id, &other.package_id)
            && eq_ignore_case(&self.version, &other.version)
    }
}

impl Eq for NugetReference {}

impl Hash for NugetReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ignore_case(&self.package_id, state);
        hash_ignore_case(&self.version, state);
    }
}
