use std::path::Path;
use std::process;

use super::{init, GlobalOptions};

pub fn cmd_cache_dir(global: &GlobalOptions) {
    let cwd = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    let config = init(global, &cwd);
    match config.cache_dir() {
        Some(dir) => println!("{}", dir.display()),
        None => {
            eprintln!("error: {}", modlink::config::ConfigError::NoCacheDir);
            process::exit(1);
        }
    }
}
