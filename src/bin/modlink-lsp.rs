use std::process;
use std::sync::Arc;

use modlink::compilation::CompilationProvider;
use modlink::config::Config;
use modlink::files::FsFileResolver;
use modlink::registry::RegistryDispatcher;

fn main() {
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let config = match Config::discover(&cwd) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    modlink::logging::init_logging(config.log.filter.as_deref());

    // The registry HTTP client is blocking; create and drop it outside the
    // async runtime.
    let dispatcher = match RegistryDispatcher::from_config(&config) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    let provider = CompilationProvider::new(Arc::new(FsFileResolver), Arc::clone(&dispatcher));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot create tokio runtime: {}", e);
            process::exit(1);
        }
    };
    rt.block_on(modlink::lsp::run_server(provider));
    drop(rt);
    drop(dispatcher);
}
