//! Typed module references.
//!
//! A reference is the parsed identity of a module address string. The set of
//! address schemes is closed, so references are a plain enum and everything
//! that routes on them matches exhaustively.
//!
//! Grammar:
//! ```text
//! ./relative/path.cfg                 local (no scheme)
//! oci:<host>[:<port>]/<repository>:<tag>
//! nuget:<package-id>@<version>          parsed only, not routed
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::failure::ModuleFailure;

mod nuget;
mod oci;

pub use nuget::NugetReference;
pub use oci::OciArtifactReference;


/// Address scheme of a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
    Local,
    Oci,
    Nuget,
}

impl Scheme {
    /// The prefix used in address strings; the local scheme has none.
    pub fn name(self) -> &'static str {
        match self {
            Scheme::Local => "",
            Scheme::Oci => "oci",
            Scheme::Nuget => "nuget",
        }
    }

    /// Scheme for an address prefix. Matching is case-sensitive.
    pub fn from_prefix(prefix: &str) -> Option<Scheme> {
        match prefix {
            "oci" => Some(Scheme::Oci),
            "nuget" => Some(Scheme::Nuget),
            _ => None,
        }
    }

    /// Parse the part of an address after `<scheme>:`.
    pub fn parse(self, raw: &str) -> Result<ModuleReference, ModuleFailure> {
        match self {
            Scheme::Local => LocalReference::parse(raw).map(ModuleReference::Local),
            Scheme::Oci => OciArtifactReference::parse(raw).map(ModuleReference::OciArtifact),
            Scheme::Nuget => NugetReference::parse(raw).map(ModuleReference::Nuget),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A module reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModuleReference {
    Local(LocalReference),
    OciArtifact(OciArtifactReference),
    Nuget(NugetReference),
}

impl ModuleReference {
    pub fn scheme(&self) -> Scheme {
        match self {
            ModuleReference::Local(_) => Scheme::Local,
            ModuleReference::OciArtifact(_) => Scheme::Oci,
            ModuleReference::Nuget(_) => Scheme::Nuget,
        }
    }

    /// The address without its scheme prefix.
    pub fn unqualified(&self) -> String {
        match self {
            ModuleReference::Local(r) => r.path.clone(),
            ModuleReference::OciArtifact(r) => r.artifact_id(),
            ModuleReference::Nuget(r) => r.unqualified(),
        }
    }

    /// `<scheme>:<unqualified>`; a local reference is just its path.
    pub fn fully_qualified(&self) -> String {
        match self.scheme() {
            Scheme::Local => self.unqualified(),
            scheme => format!("{}:{}", scheme.name(), self.unqualified()),
        }
    }
}

impl fmt::Display for ModuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified())
    }
}

/// A relative filesystem path, kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalReference {
    pub path: String,
}

impl LocalReference {
    pub fn parse(raw: &str) -> Result<Self, ModuleFailure> {
        if raw.is_empty() {
            return Err(ModuleFailure::PathNotSpecified);
        }
        Ok(Self {
            path: raw.to_string(),
        })
    }
}

/// ASCII case-insensitive string equality, paired with [`hash_ignore_case`].
pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Hash a string so that values equal under [`eq_ignore_case`] collide.
pub(crate) fn hash_ignore_case<H: Hasher>(s: &str, state: &mut H) {
    for b in s.bytes() {
        state.write_u8(b.to_ascii_lowercase());
    }
    state.write_usize(s.len());
}

/// Hash a case-sensitive field in the same framing as [`hash_ignore_case`].
pub(crate) fn hash_exact<H: Hasher>(s: &str, state: &mut H) {
    s.hash(state);
}
