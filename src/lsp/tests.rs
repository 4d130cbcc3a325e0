use std::time::Duration;

use super::*;
use crate::files::InMemoryFileResolver;
use crate::reference::Scheme;
use crate::registry::test_support::FakeRegistry;
use crate::registry::{LocalRegistry, ModuleRegistry, RegistryDispatcher};

fn uri(name: &str) -> Url {
    Url::parse(&format!("file:///work/{}", name)).unwrap()
}

fn setup(files: &[(&str, &str)]) -> (ServerState, Arc<FakeRegistry>, UnboundedReceiver<Url>) {
    let mut resolver = InMemoryFileResolver::default();
    for (name, text) in files {
        resolver.insert(uri(name), *text);
    }
    let registry = Arc::new(FakeRegistry::new(Scheme::Oci));
    let registries: Vec<Arc<dyn ModuleRegistry>> =
        vec![Arc::new(LocalRegistry), registry.clone()];
    let dispatcher = Arc::new(RegistryDispatcher::new(registries));
    let provider = CompilationProvider::new(Arc::new(resolver), dispatcher.clone());

    let (sender, receiver) = mpsc::unbounded_channel();
    let scheduler = RestoreScheduler::new(dispatcher, Arc::new(ChannelListener(sender)));
    scheduler.start().unwrap();
    (ServerState::new(provider, scheduler), registry, receiver)
}

fn codes(published: &Published, file: &Url) -> Vec<String> {
    let (_, diagnostics) = published
        .iter()
        .rev()
        .find(|(u, _)| u == file)
        .expect("file was published");
    diagnostics
        .iter()
        .map(|d| match &d.code {
            Some(NumberOrString::String(code)) => code.clone(),
            other => panic!("unexpected code {:?}", other),
        })
        .collect()
}

fn wait(receiver: &mut UnboundedReceiver<Url>) -> Url {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        match receiver.try_recv() {
            Ok(document) => return document,
            Err(_) if std::time::Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(10))
            }
            Err(e) => panic!("no restore notification: {:?}", e),
        }
    }
}

// ─── Open / Change ─────────────────────────────────────────────

#[test]
fn test_open_publishes_every_reached_file() {
    let (state, _registry, _restored) = setup(&[("a.cfg", "module gone './gone.cfg'\n")]);
    let published = state.open(
        uri("main.cfg"),
        "module a './a.cfg'\nmodule x 'br:nope'\n".to_string(),
    );

    assert_eq!(codes(&published, &uri("main.cfg")), vec!["module-unknown-scheme"]);
    assert_eq!(codes(&published, &uri("a.cfg")), vec!["module-file-read"]);
    let (_, main) = published
        .iter()
        .find(|(u, _)| *u == uri("main.cfg"))
        .unwrap();
    assert_eq!(main[0].range.start, Position::new(1, 9));
}

#[test]
fn test_change_clears_files_no_longer_reached() {
    let (state, _registry, _restored) = setup(&[("a.cfg", "")]);
    state.open(uri("main.cfg"), "module a './a.cfg'\n".to_string());
    let published = state.open(uri("main.cfg"), String::new());

    assert!(codes(&published, &uri("main.cfg")).is_empty());
    assert!(codes(&published, &uri("a.cfg")).is_empty());
}

#[test]
fn test_editing_a_dependency_recompiles_its_dependents() {
    let (state, _registry, _restored) = setup(&[]);
    state.open(uri("a.cfg"), String::new());
    state.open(uri("main.cfg"), "module a './a.cfg'\n".to_string());

    let published = state.open(uri("a.cfg"), "module m './missing.cfg'\n".to_string());
    let entries: Vec<&Url> = published.iter().map(|(u, _)| u).collect();
    assert!(entries.contains(&&uri("main.cfg")));
    assert_eq!(codes(&published, &uri("a.cfg")), vec!["module-file-read"]);
}

#[test]
fn test_editing_does_not_accumulate_parsed_references() {
    let (state, _registry, _restored) = setup(&[("a.cfg", "")]);
    for i in 0..100 {
        state.open(
            uri("main.cfg"),
            format!("// edit {}\nmodule a './a.cfg'\n", i),
        );
    }
    assert_eq!(state.provider.dispatcher().cached_reference_count(), 1);

    state.close(&uri("main.cfg"));
    assert_eq!(state.provider.dispatcher().cached_reference_count(), 0);
}

// ─── Close ─────────────────────────────────────────────────────

#[test]
fn test_close_clears_diagnostics_of_unreached_files() {
    let (state, _registry, _restored) = setup(&[("a.cfg", "module m 'br:x'\n")]);
    state.open(uri("main.cfg"), "module a './a.cfg'\n".to_string());

    let published = state.close(&uri("main.cfg"));
    assert!(codes(&published, &uri("main.cfg")).is_empty());
    assert!(codes(&published, &uri("a.cfg")).is_empty());
    assert!(state.lock_compilations().is_empty());
}

// ─── Restore ───────────────────────────────────────────────────

#[test]
fn test_restore_notification_refreshes_document() {
    let (state, registry, mut restored) = setup(&[("cache/a.cfg", "")]);
    registry.add_module("reg.io/a:v1", uri("cache/a.cfg"), false);

    let published = state.open(uri("main.cfg"), "module a 'oci:reg.io/a:v1'\n".to_string());
    assert_eq!(
        codes(&published, &uri("main.cfg")),
        vec!["module-restore-required"]
    );

    let document = wait(&mut restored);
    assert_eq!(document, uri("main.cfg"));
    let published = state.refresh(&document);
    assert!(codes(&published, &uri("main.cfg")).is_empty());
    assert!(codes(&published, &uri("cache/a.cfg")).is_empty());
}

#[test]
fn test_refresh_after_close_is_ignored() {
    let (state, _registry, _restored) = setup(&[]);
    state.open(uri("main.cfg"), String::new());
    state.close(&uri("main.cfg"));
    assert!(state.refresh(&uri("main.cfg")).is_empty());
}
