//! Module dependency resolution for a declarative configuration language.
//!
//! A source file declares the modules it uses with
//! `module <symbol> '<path>'`. The path is either a file relative to the
//! declaring file or a remote artifact (`oci:<registry>/<repo>:<tag>`) that
//! is restored into a local cache before it can be read. Starting from an
//! entry file, [`graph::GraphBuilder`] follows every declaration, asks the
//! [`registry::RegistryDispatcher`] where each one lives, and records for
//! each declaration either the file it resolves to or a
//! [`failure::ModuleFailure`]. Cycles are reported on every declaration
//! that takes part in one.
//!
//! [`compilation::CompilationProvider`] drives build, restore and rebuild
//! for the two hosts: the `modlink` CLI restores synchronously, and the
//! language server hands restores to a background
//! [`restore::RestoreScheduler`].

pub mod compilation;
pub mod config;
pub mod diagnostic;
pub mod failure;
pub mod files;
pub mod graph;
pub mod hash;
pub mod logging;
pub mod lsp;
pub mod reference;
pub mod registry;
pub mod restore;
pub mod span;
pub mod syntax;
pub mod workspace;
