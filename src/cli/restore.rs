use std::path::PathBuf;
use std::process;

use clap::Args;
use modlink::failure::ModuleFailure;
use modlink::reference::Scheme;
use modlink::workspace::Workspace;

use super::{compiled, entry_dir, init, provider, report, resolve_entry, GlobalOptions};

#[derive(Args)]
pub struct RestoreArgs {
    /// Entry file
    pub entry: PathBuf,
}

pub fn cmd_restore(args: RestoreArgs, global: &GlobalOptions) {
    let (path, entry) = resolve_entry(&args.entry);
    let config = init(global, entry_dir(&path));
    let provider = provider(&config);
    let compilation = compiled(provider.create(&Workspace::new(), &entry));

    let graph = compilation.graph();
    let mut remote = 0;
    let mut failed = 0;
    for file in graph.files() {
        for decl in file.declarations() {
            let is_remote = provider
                .dispatcher()
                .reference_for(decl)
                .is_ok_and(|r| r.scheme() != Scheme::Local);
            if !is_remote {
                continue;
            }
            remote += 1;
            if graph.failure(&decl.id).is_some_and(is_restore_failure) {
                failed += 1;
            }
        }
    }

    report(&compilation, |d| {
        matches!(
            d.code,
            "module-restore-required" | "module-restore-failed" | "module-restore-unexpected"
        )
    });
    eprintln!("restored {} of {} remote module(s)", remote - failed, remote);
    if failed > 0 {
        process::exit(1);
    }
}

fn is_restore_failure(failure: &ModuleFailure) -> bool {
    matches!(
        failure,
        ModuleFailure::RestoreRequired { .. }
            | ModuleFailure::RestoreFailed { .. }
            | ModuleFailure::RestoreOutcomeMissing { .. }
    )
}
