//! Deferred, position-free module failures.
//!
//! Every problem found while resolving a module declaration is recorded as a
//! [`ModuleFailure`] against that declaration. The failure carries only
//! structured arguments; it becomes a positioned [`Diagnostic`] when the
//! consuming layer applies it to the declaration's span with
//! [`ModuleFailure::to_diagnostic`].

use thiserror::Error;
use url::Url;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModuleFailure {
    #[error("the module path must be a string literal")]
    PathNotString,

    #[error("string interpolation is not supported in module paths")]
    PathInterpolated,

    #[error("the module path has not been specified")]
    PathNotSpecified,

    #[error(
        "the module reference scheme \"{scheme}\" is not recognized; specify a path to a local module file or a module reference using one of the following schemes: {}",
        format_schemes(.available)
    )]
    UnknownScheme {
        scheme: String,
        available: Vec<String>,
    },

    #[error("\"{raw}\" is not a valid OCI artifact reference; expected \"oci:<registry>/<repository>:<tag>\"")]
    InvalidOciReference { raw: String },

    #[error("\"{raw}\" is not a valid NuGet package reference; expected \"nuget:<package-id>@<version>\"")]
    InvalidNugetReference { raw: String },

    #[error("the module with reference \"{reference}\" has not been restored")]
    RestoreRequired { reference: String },

    #[error("unable to restore the module with reference \"{reference}\": {message}")]
    RestoreFailed { reference: String, message: String },

    #[error("restore of the module with reference \"{reference}\" failed unexpectedly")]
    RestoreOutcomeMissing { reference: String },

    #[error("the module with reference \"{reference}\" is restored but its entry point \"{path}\" was not found")]
    EntryPointMissing { reference: String, path: String },

    #[error("unable to locate the module with reference \"{reference}\": {reason}")]
    EntryPointUnresolvable { reference: String, reason: String },

    #[error("unable to read file \"{path}\": {message}")]
    FileRead { path: String, message: String },

    #[error("this module references itself, which is not allowed")]
    CyclicSelfReference,

    #[error("the module is involved in a cycle ({})", format_cycle(.path))]
    Cycle { path: Vec<String> },
}

fn format_schemes(schemes: &[String]) -> String {
    schemes
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_cycle(path: &[String]) -> String {
    path.iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl ModuleFailure {
    /// Stable identifier of the failure kind, used as the diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            ModuleFailure::PathNotString => "module-path-not-string",
            ModuleFailure::PathInterpolated => "module-path-interpolated",
            ModuleFailure::PathNotSpecified => "module-path-not-specified",
            ModuleFailure::UnknownScheme { .. } => "module-unknown-scheme",
            ModuleFailure::InvalidOciReference { .. } => "module-invalid-oci-reference",
            ModuleFailure::InvalidNugetReference { .. } => "module-invalid-nuget-reference",
            ModuleFailure::RestoreRequired { .. } => "module-restore-required",
            ModuleFailure::RestoreFailed { .. } => "module-restore-failed",
            ModuleFailure::RestoreOutcomeMissing { .. } => "module-restore-unexpected",
            ModuleFailure::EntryPointMissing { .. } => "module-entry-point-missing",
            ModuleFailure::EntryPointUnresolvable { .. } => "module-entry-point-unresolvable",
            ModuleFailure::FileRead { .. } => "module-file-read",
            ModuleFailure::CyclicSelfReference => "module-cycle-self",
            ModuleFailure::Cycle { .. } => "module-cycle",
        }
    }

    /// Whether this failure was produced by cycle detection.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            ModuleFailure::CyclicSelfReference | ModuleFailure::Cycle { .. }
        )
    }

    /// Apply the failure to a source position.
    pub fn to_diagnostic(&self, span: Span) -> Diagnostic {
        let diag = Diagnostic::error(self.code(), self.to_string(), span);
        match self {
            ModuleFailure::RestoreRequired { .. } => diag.with_help(
                "run `modlink restore` or wait for the background restore to finish".to_string(),
            ),
            ModuleFailure::Cycle { .. } | ModuleFailure::CyclicSelfReference => diag.with_help(
                "break the cycle by extracting shared declarations into a separate module"
                    .to_string(),
            ),
            ModuleFailure::PathInterpolated => {
                diag.with_help("use a plain single-quoted string for the module path".to_string())
            }
            _ => diag,
        }
    }
}

/// Fatal error of a graph build: the entry file itself could not be loaded,
/// so there is no declaration to attach the failure to.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("cannot load entry file '{uri}': {failure}")]
    EntryPoint { uri: Url, failure: ModuleFailure },
}

impl BuildError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::EntryPoint { failure, .. } => failure.to_diagnostic(Span::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_scheme_lists_schemes() {
        let failure = ModuleFailure::UnknownScheme {
            scheme: "br".to_string(),
            available: vec!["nuget".to_string(), "oci".to_string()],
        };
        insta::assert_snapshot!(
            failure.to_string(),
            @r#"the module reference scheme "br" is not recognized; specify a path to a local module file or a module reference using one of the following schemes: "nuget", "oci""#
        );
        assert_eq!(failure.code(), "module-unknown-scheme");
    }

    #[test]
    fn test_cycle_message_enumerates_path() {
        let failure = ModuleFailure::Cycle {
            path: vec!["/a.cfg".to_string(), "/b.cfg".to_string()],
        };
        insta::assert_snapshot!(
            failure.to_string(),
            @r#"the module is involved in a cycle ("/a.cfg" -> "/b.cfg")"#
        );
        assert!(failure.is_cycle());
        assert!(ModuleFailure::CyclicSelfReference.is_cycle());
        assert!(!ModuleFailure::PathNotString.is_cycle());
    }

    #[test]
    fn test_to_diagnostic_keeps_span_and_code() {
        let failure = ModuleFailure::RestoreRequired {
            reference: "oci:r.io/a:v1".to_string(),
        };
        let diag = failure.to_diagnostic(Span::new(4, 12));
        assert_eq!(diag.span, Span::new(4, 12));
        assert_eq!(diag.code, "module-restore-required");
        assert_eq!(
            diag.message,
            "the module with reference \"oci:r.io/a:v1\" has not been restored"
        );
        assert!(diag.help.is_some());
    }

    #[test]
    fn test_build_error_diagnostic_has_no_position() {
        let error = BuildError::EntryPoint {
            uri: Url::parse("file:///work/main.cfg").unwrap(),
            failure: ModuleFailure::FileRead {
                path: "/work/main.cfg".to_string(),
                message: "file not found".to_string(),
            },
        };
        let diag = error.to_diagnostic();
        assert_eq!(diag.span, Span::new(0, 0));
        assert!(diag.span.is_empty());
        assert_eq!(diag.code, "module-file-read");
    }
}
