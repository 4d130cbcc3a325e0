use std::path::PathBuf;
use std::process;

use clap::Args;
use modlink::compilation::Compilation;
use modlink::syntax::display_path;
use modlink::workspace::Workspace;

use super::{compiled, entry_dir, init, provider, report, resolve_entry, GlobalOptions};

#[derive(Args)]
pub struct GraphArgs {
    /// Entry file
    pub entry: PathBuf,
    /// Do not restore remote modules; report them as restore-required
    #[arg(long)]
    pub no_restore: bool,
}

pub fn cmd_graph(args: GraphArgs, global: &GlobalOptions) {
    let (path, entry) = resolve_entry(&args.entry);
    let config = init(global, entry_dir(&path));
    let provider = provider(&config);
    let workspace = Workspace::new();

    let compilation = compiled(if args.no_restore {
        provider.create_without_restore(&workspace, &entry)
    } else {
        provider.create(&workspace, &entry)
    });

    print_graph(&compilation);
    let errors = report(&compilation, |_| true);
    if errors > 0 {
        eprintln!("error: {} module error(s)", errors);
        process::exit(1);
    }
}

fn print_graph(compilation: &Compilation) {
    let graph = compilation.graph();
    for file in graph.files() {
        println!("{}", display_path(file.uri()));
        for decl in file.declarations() {
            let raw = decl.path.as_deref().unwrap_or("?");
            match (graph.resolution(&decl.id), graph.failure(&decl.id)) {
                (Some(target), _) => {
                    println!("  {} '{}' -> {}", decl.symbol, raw, display_path(target))
                }
                (None, Some(failure)) => {
                    println!("  {} '{}' [{}]", decl.symbol, raw, failure.code())
                }
                (None, None) => println!("  {} '{}' (pending)", decl.symbol, raw),
            }
        }
    }
}
