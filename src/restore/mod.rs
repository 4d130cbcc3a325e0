//! Background module restore.
//!
//! Hosts that must not block on the network (the language server) hand
//! pending declarations to a [`RestoreScheduler`]. A single worker thread
//! drains everything queued so far into one batch, restores it with one
//! dispatcher call, and then tells the [`RestoreListener`] which documents
//! should be recompiled.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};
use url::Url;

use crate::registry::RegistryDispatcher;
use crate::syntax::ModuleDeclaration;

#[cfg(test)]
mod tests;

/// Receives a notification once the restore covering a document finished.
pub trait RestoreListener: Send + Sync {
    fn on_restore_complete(&self, document: &Url);
}

struct Request {
    document: Url,
    declarations: Vec<ModuleDeclaration>,
}

#[derive(Default)]
struct Queue {
    requests: Vec<Request>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

pub struct RestoreScheduler {
    dispatcher: Arc<RegistryDispatcher>,
    listener: Arc<dyn RestoreListener>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RestoreScheduler {
    pub fn new(dispatcher: Arc<RegistryDispatcher>, listener: Arc<dyn RestoreListener>) -> Self {
        Self {
            dispatcher,
            listener,
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }

    /// Queue `declarations` of `document` for restore. Never blocks on the
    /// restore itself. Requests made before [`start`](Self::start) wait in
    /// the queue.
    pub fn request_restore(&self, document: &Url, declarations: Vec<ModuleDeclaration>) {
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        debug!(document = %document, count = declarations.len(), "restore requested");
        queue.requests.push(Request {
            document: document.clone(),
            declarations,
        });
        self.shared.ready.notify_one();
    }

    /// Spawn the worker thread. Calling it again is a no-op.
    pub fn start(&self) -> io::Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let dispatcher = Arc::clone(&self.dispatcher);
        let listener = Arc::clone(&self.listener);
        let handle = thread::Builder::new()
            .name("modlink-restore".to_string())
            .spawn(move || run_worker(&shared, &dispatcher, listener.as_ref()))?;
        *worker = Some(handle);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Drop for RestoreScheduler {
    fn drop(&mut self) {
        let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.shutdown = true;
        self.shared.ready.notify_all();
    }
}

fn run_worker(shared: &Shared, dispatcher: &RegistryDispatcher, listener: &dyn RestoreListener) {
    loop {
        let batch = {
            let mut queue = shared.queue.lock().unwrap_or_else(|e| e.into_inner());
            while queue.requests.is_empty() && !queue.shutdown {
                queue = shared
                    .ready
                    .wait(queue)
                    .unwrap_or_else(|e| e.into_inner());
            }
            if queue.shutdown {
                debug!("restore worker stopping");
                return;
            }
            std::mem::take(&mut queue.requests)
        };
        process_batch(batch, dispatcher, listener);
    }
}

fn process_batch(
    batch: Vec<Request>,
    dispatcher: &RegistryDispatcher,
    listener: &dyn RestoreListener,
) {
    let requests = batch.len();
    let mut documents: Vec<Url> = Vec::new();
    let mut seen_documents = HashSet::new();
    let mut declarations: Vec<ModuleDeclaration> = Vec::new();
    let mut seen_declarations = HashSet::new();

    for request in batch {
        if seen_documents.insert(request.document.clone()) {
            documents.push(request.document);
        }
        for declaration in request.declarations {
            if seen_declarations.insert(declaration.id.clone()) {
                declarations.push(declaration);
            }
        }
    }

    info!(
        requests,
        declarations = declarations.len(),
        documents = documents.len(),
        "restoring batch"
    );
    let failures = dispatcher.restore(&declarations);
    debug!(failed = failures.len(), "batch restored");

    for document in &documents {
        listener.on_restore_complete(document);
    }
}
