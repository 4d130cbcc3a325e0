use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use super::*;
use crate::reference::Scheme;
use crate::registry::test_support::FakeRegistry;
use crate::registry::{LocalRegistry, ModuleRegistry, RestoreError};
use crate::syntax::SourceFile;

const WAIT: Duration = Duration::from_secs(5);

struct ChannelListener {
    sender: Mutex<Sender<Url>>,
}

impl RestoreListener for ChannelListener {
    fn on_restore_complete(&self, document: &Url) {
        let _ = self.sender.lock().unwrap().send(document.clone());
    }
}

fn uri(name: &str) -> Url {
    Url::parse(&format!("file:///work/{}", name)).unwrap()
}

fn declarations(name: &str, addresses: &[&str]) -> Vec<ModuleDeclaration> {
    let text: String = addresses
        .iter()
        .map(|a| format!("module m '{}'\n", a))
        .collect();
    SourceFile::parse(uri(name), text).declarations().to_vec()
}

fn setup() -> (
    Arc<FakeRegistry>,
    Arc<RegistryDispatcher>,
    RestoreScheduler,
    Receiver<Url>,
) {
    let registry = Arc::new(FakeRegistry::new(Scheme::Oci));
    let registries: Vec<Arc<dyn ModuleRegistry>> = vec![Arc::new(LocalRegistry), registry.clone()];
    let dispatcher = Arc::new(RegistryDispatcher::new(registries));
    let (sender, receiver) = mpsc::channel();
    let listener = Arc::new(ChannelListener {
        sender: Mutex::new(sender),
    });
    let scheduler = RestoreScheduler::new(dispatcher.clone(), listener);
    (registry, dispatcher, scheduler, receiver)
}

#[test]
fn test_queued_requests_coalesce_into_one_batch() {
    let (registry, _dispatcher, scheduler, notifications) = setup();
    registry.add_module("reg.io/a:v1", uri("cache/a"), false);
    registry.add_module("reg.io/b:v1", uri("cache/b"), false);

    let one = declarations("one.cfg", &["oci:reg.io/a:v1", "oci:reg.io/b:v1"]);
    let two = declarations("two.cfg", &["oci:reg.io/a:v1"]);
    scheduler.request_restore(&uri("one.cfg"), one.clone());
    scheduler.request_restore(&uri("two.cfg"), two);
    // The same declarations again from the same document.
    scheduler.request_restore(&uri("one.cfg"), one);
    scheduler.start().unwrap();

    assert_eq!(notifications.recv_timeout(WAIT).unwrap(), uri("one.cfg"));
    assert_eq!(notifications.recv_timeout(WAIT).unwrap(), uri("two.cfg"));
    assert!(notifications.recv_timeout(Duration::from_millis(200)).is_err());

    let batches = registry.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
}

#[test]
fn test_start_is_idempotent() {
    let (_registry, _dispatcher, scheduler, _notifications) = setup();
    assert!(!scheduler.is_running());
    scheduler.start().unwrap();
    scheduler.start().unwrap();
    assert!(scheduler.is_running());
}

#[test]
fn test_requests_after_start_are_processed() {
    let (registry, dispatcher, scheduler, notifications) = setup();
    registry.add_module("reg.io/a:v1", uri("cache/a"), false);
    scheduler.start().unwrap();

    let decls = declarations("main.cfg", &["oci:reg.io/a:v1"]);
    scheduler.request_restore(&uri("main.cfg"), decls.clone());
    assert_eq!(notifications.recv_timeout(WAIT).unwrap(), uri("main.cfg"));
    assert_eq!(
        dispatcher.status(&decls[0]),
        crate::registry::ModuleStatus::Available
    );

    scheduler.request_restore(&uri("main.cfg"), decls);
    assert_eq!(notifications.recv_timeout(WAIT).unwrap(), uri("main.cfg"));
}

#[test]
fn test_failures_recorded_before_notification() {
    let (registry, dispatcher, scheduler, notifications) = setup();
    registry.fail_restore(
        "reg.io/a:v1",
        RestoreError::Unauthorized {
            artifact: "reg.io/a:v1".to_string(),
            status: 403,
        },
    );
    let decls = declarations("main.cfg", &["oci:reg.io/a:v1"]);
    scheduler.request_restore(&uri("main.cfg"), decls.clone());
    scheduler.start().unwrap();

    notifications.recv_timeout(WAIT).unwrap();
    let reference = dispatcher.reference_for(&decls[0]).unwrap();
    assert!(matches!(
        dispatcher.restore_failure(&reference),
        Some(crate::failure::ModuleFailure::RestoreFailed { .. })
    ));
}

#[test]
fn test_empty_request_still_notifies() {
    let (_registry, _dispatcher, scheduler, notifications) = setup();
    scheduler.start().unwrap();
    scheduler.request_restore(&uri("main.cfg"), Vec::new());
    assert_eq!(notifications.recv_timeout(WAIT).unwrap(), uri("main.cfg"));
}
