use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;

use cli::cache_dir::cmd_cache_dir;
use cli::graph::{cmd_graph, GraphArgs};
use cli::restore::{cmd_restore, RestoreArgs};
use cli::GlobalOptions;

#[derive(Parser)]
#[command(
    name = "modlink",
    version,
    about = "Resolve, restore and check module dependencies"
)]
struct Cli {
    /// Configuration file (default: nearest modlink.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log filter, e.g. "modlink=debug" (RUST_LOG takes precedence)
    #[arg(long, global = true, value_name = "FILTER")]
    log: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the module graph of an entry file and report module errors
    Graph(GraphArgs),
    /// Restore the remote modules an entry file needs
    Restore(RestoreArgs),
    /// Print the module cache directory
    CacheDir,
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalOptions {
        config: cli.config,
        log: cli.log,
    };

    match cli.command {
        Command::Graph(args) => cmd_graph(args, &global),
        Command::Restore(args) => cmd_restore(args, &global),
        Command::CacheDir => cmd_cache_dir(&global),
    }
}
