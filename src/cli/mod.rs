pub mod cache_dir;
pub mod graph;
pub mod restore;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use modlink::compilation::{Compilation, CompilationProvider};
use modlink::config::Config;
use modlink::diagnostic::{render_diagnostics, Diagnostic};
use modlink::failure::BuildError;
use modlink::files::FsFileResolver;
use modlink::registry::RegistryDispatcher;
use modlink::syntax::display_path;
use url::Url;

/// Options accepted by every command.
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub log: Option<String>,
}

/// Load the configuration (explicit `--config`, or the nearest
/// `modlink.toml` above `start`) and initialise logging from it.
pub fn init(global: &GlobalOptions, start: &Path) -> Config {
    let loaded = match &global.config {
        Some(path) => Config::load(path),
        None => Config::discover(start),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    modlink::logging::init_logging(global.log.as_deref().or(config.log.filter.as_deref()));
    config
}

/// Canonicalize an entry path and turn it into a `file://` URI.
pub fn resolve_entry(input: &Path) -> (PathBuf, Url) {
    let path = match input.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: cannot open '{}': {}", input.display(), e);
            process::exit(1);
        }
    };
    match Url::from_file_path(&path) {
        Ok(uri) => (path, uri),
        Err(()) => {
            eprintln!("error: '{}' is not a valid file path", path.display());
            process::exit(1);
        }
    }
}

/// The directory holding the entry file, where config discovery starts.
pub fn entry_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("."))
}

pub fn provider(config: &Config) -> CompilationProvider {
    let dispatcher = match RegistryDispatcher::from_config(config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    CompilationProvider::new(Arc::new(FsFileResolver), Arc::new(dispatcher))
}

pub fn compiled(result: Result<Compilation, BuildError>) -> Compilation {
    match result {
        Ok(compilation) => compilation,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

/// Render diagnostics grouped by file. Returns the number of errors.
pub fn report<F>(compilation: &Compilation, mut keep: F) -> usize
where
    F: FnMut(&Diagnostic) -> bool,
{
    let mut errors = 0;
    for (uri, diagnostics) in compilation.diagnostics() {
        let diagnostics: Vec<Diagnostic> =
            diagnostics.into_iter().filter(|d| keep(d)).collect();
        if diagnostics.is_empty() {
            continue;
        }
        let Some(file) = compilation.graph().file(&uri) else {
            continue;
        };
        render_diagnostics(&diagnostics, &display_path(&uri), file.text());
        errors += diagnostics.iter().filter(|d| d.is_error()).count();
    }
    errors
}
