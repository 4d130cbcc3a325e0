//! Source file nodes and module declarations.
//!
//! A [`SourceFile`] is an immutable parsed file: its URI, its text, a BLAKE3
//! digest of that text, and the module declarations found in it. Editing a
//! file never patches a node in place; the new text produces a new node with
//! a new digest, and therefore new [`DeclarationId`]s.

use std::fmt;

use url::Url;

use crate::failure::ModuleFailure;
use crate::hash::ContentHash;
use crate::span::Span;

mod scan;

pub use scan::{scan_declarations, ScannedDeclaration};

#[cfg(test)]
mod tests;

/// Stable identity of a module declaration: owning file, the content it was
/// scanned from, and its ordinal within that file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId {
    pub uri: Url,
    pub digest: ContentHash,
    pub index: u32,
}

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.uri, self.index, self.digest.to_short())
    }
}

/// A `module <symbol> '<path>'` statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleDeclaration {
    pub id: DeclarationId,
    /// Symbolic name of the module in the declaring file.
    pub symbol: String,
    /// The address string, or why it could not be read as one.
    pub path: Result<String, ModuleFailure>,
    /// Span of the path token.
    pub span: Span,
}

/// An immutable parsed file.
#[derive(Clone, Debug)]
pub struct SourceFile {
    uri: Url,
    text: String,
    digest: ContentHash,
    declarations: Vec<ModuleDeclaration>,
}

impl SourceFile {
    /// Scan `text` and build the node for `uri`.
    pub fn parse(uri: Url, text: impl Into<String>) -> Self {
        let text = text.into();
        let digest = ContentHash::of(text.as_bytes());
        let declarations = scan_declarations(&text)
            .into_iter()
            .enumerate()
            .map(|(index, scanned)| ModuleDeclaration {
                id: DeclarationId {
                    uri: uri.clone(),
                    digest,
                    index: index as u32,
                },
                symbol: scanned.symbol,
                path: scanned.path,
                span: scanned.span,
            })
            .collect();

        Self {
            uri,
            text,
            digest,
            declarations,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn digest(&self) -> ContentHash {
        self.digest
    }

    pub fn declarations(&self) -> &[ModuleDeclaration] {
        &self.declarations
    }

    /// Look up a declaration of this exact node. Ids scanned from other
    /// content of the same URI do not match.
    pub fn declaration(&self, id: &DeclarationId) -> Option<&ModuleDeclaration> {
        if id.uri != self.uri || id.digest != self.digest {
            return None;
        }
        self.declarations.get(id.index as usize)
    }
}

/// Human-readable location of a URI: the filesystem path for `file:` URIs,
/// the URI itself otherwise.
pub fn display_path(uri: &Url) -> String {
    if uri.scheme() == "file" {
        if let Ok(path) = uri.to_file_path() {
            return path.display().to_string();
        }
    }
    uri.to_string()
}
