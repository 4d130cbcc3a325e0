//! modlink Language Server Protocol implementation.
//!
//! Every open document is compiled as an entry point and diagnostics are
//! published for each file its graph reaches. Remote modules that still
//! need restoring are queued on a [`RestoreScheduler`]; once the restore
//! finishes the document is rebuilt and its diagnostics republished.

pub mod util;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, error, info};

use crate::compilation::{Compilation, CompilationProvider};
use crate::failure::BuildError;
use crate::restore::{RestoreListener, RestoreScheduler};
use crate::syntax::SourceFile;
use crate::workspace::Workspace;

use util::to_lsp_diagnostic;

#[cfg(test)]
mod tests;

/// Diagnostics to publish, one entry per file. An empty list clears the
/// file's diagnostics in the client.
type Published = Vec<(Url, Vec<Diagnostic>)>;

/// Forwards restore notifications from the worker thread into the async
/// refresh loop.
struct ChannelListener(UnboundedSender<Url>);

impl RestoreListener for ChannelListener {
    fn on_restore_complete(&self, document: &Url) {
        if self.0.send(document.clone()).is_err() {
            debug!(document = %document, "restore finished after shutdown");
        }
    }
}

struct ServerState {
    provider: CompilationProvider,
    scheduler: RestoreScheduler,
    workspace: Mutex<Workspace>,
    compilations: Mutex<HashMap<Url, Compilation>>,
}

impl ServerState {
    fn new(provider: CompilationProvider, scheduler: RestoreScheduler) -> Self {
        Self {
            provider,
            scheduler,
            workspace: Mutex::new(Workspace::new()),
            compilations: Mutex::new(HashMap::new()),
        }
    }

    fn lock_workspace(&self) -> MutexGuard<'_, Workspace> {
        self.workspace.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_compilations(&self) -> MutexGuard<'_, HashMap<Url, Compilation>> {
        self.compilations.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record new document text and recompile everything it affects.
    fn open(&self, uri: Url, text: String) -> Published {
        // Declaration ids of the previous text are never seen again.
        self.provider.dispatcher().forget_file(&uri);
        self.lock_workspace()
            .upsert(SourceFile::parse(uri.clone(), text));
        self.recompile_affected(&uri)
    }

    fn close(&self, uri: &Url) -> Published {
        self.lock_workspace().remove(uri);
        self.provider.dispatcher().forget_file(uri);
        let previous = self.lock_compilations().remove(uri);

        let mut published = self.recompile_affected(uri);
        if let Some(previous) = previous {
            let compilations = self.lock_compilations();
            for file in previous.graph().files() {
                let still_reached = compilations
                    .values()
                    .any(|c| c.graph().file(file.uri()).is_some());
                if !still_reached {
                    published.push((file.uri().clone(), Vec::new()));
                }
            }
        }
        published
    }

    /// Rebuild `entry` after the restore it was waiting for finished.
    fn refresh(&self, entry: &Url) -> Published {
        let Some(current) = self.lock_compilations().get(entry).cloned() else {
            debug!(document = %entry, "document closed before restore finished");
            return Vec::new();
        };
        let result = {
            let workspace = self.lock_workspace();
            self.provider.update(&workspace, &current, &BTreeMap::new())
        };
        if let Ok(compilation) = &result {
            // Restored modules may declare remote modules of their own.
            self.provider.schedule_pending(compilation, &self.scheduler);
        }
        self.store(entry, result)
    }

    /// Entries whose graph reaches `uri`, plus `uri` itself when open.
    fn recompile_affected(&self, uri: &Url) -> Published {
        let mut entries: Vec<Url> = self
            .lock_compilations()
            .iter()
            .filter(|(entry, c)| *entry != uri && c.graph().file(uri).is_some())
            .map(|(entry, _)| entry.clone())
            .collect();
        if self.lock_workspace().get(uri).is_some() {
            entries.push(uri.clone());
        }
        entries.sort();

        let mut published = Vec::new();
        for entry in &entries {
            published.extend(self.compile(entry));
        }
        published
    }

    fn compile(&self, entry: &Url) -> Published {
        let result = {
            let workspace = self.lock_workspace();
            self.provider
                .create_deferred(&workspace, entry, &self.scheduler)
        };
        self.store(entry, result)
    }

    fn store(
        &self,
        entry: &Url,
        result: std::result::Result<Compilation, BuildError>,
    ) -> Published {
        let compilation = match result {
            Ok(compilation) => compilation,
            Err(err) => {
                error!(document = %entry, error = %err, "compilation failed");
                self.lock_compilations().remove(entry);
                let text = self
                    .lock_workspace()
                    .get(entry)
                    .map(|f| f.text().to_string())
                    .unwrap_or_default();
                let diagnostic = to_lsp_diagnostic(&err.to_diagnostic(), &text);
                return vec![(entry.clone(), vec![diagnostic])];
            }
        };

        let mut published: Published = compilation
            .diagnostics()
            .into_iter()
            .map(|(uri, diagnostics)| {
                let text = compilation
                    .graph()
                    .file(&uri)
                    .map(|f| f.text())
                    .unwrap_or_default();
                let converted = diagnostics
                    .iter()
                    .map(|d| to_lsp_diagnostic(d, text))
                    .collect();
                (uri, converted)
            })
            .collect();

        let mut compilations = self.lock_compilations();
        if let Some(previous) = compilations.get(entry) {
            for file in previous.graph().files() {
                if compilation.graph().file(file.uri()).is_none() {
                    published.push((file.uri().clone(), Vec::new()));
                }
            }
        }
        compilations.insert(entry.clone(), compilation);
        published
    }
}

pub struct ModlinkLsp {
    client: Client,
    state: Arc<ServerState>,
}

#[tower_lsp::async_trait]
impl LanguageServer for ModlinkLsp {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "modlink-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "modlink-lsp initialized")
            .await;
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let published = self
            .state
            .open(params.text_document.uri, params.text_document.text);
        publish(&self.client, published).await;
    }

    async fn did_change(&self, mut params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole document.
        if let Some(change) = params.content_changes.pop() {
            let published = self.state.open(params.text_document.uri, change.text);
            publish(&self.client, published).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        let mut published = self.state.close(&uri);
        if !published.iter().any(|(u, _)| *u == uri) {
            published.push((uri, Vec::new()));
        }
        publish(&self.client, published).await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

async fn publish(client: &Client, published: Published) {
    for (uri, diagnostics) in published {
        client.publish_diagnostics(uri, diagnostics, None).await;
    }
}

async fn refresh_loop(
    client: Client,
    state: Arc<ServerState>,
    mut restored: UnboundedReceiver<Url>,
) {
    while let Some(document) = restored.recv().await {
        debug!(document = %document, "restore complete, rebuilding");
        let published = state.refresh(&document);
        publish(&client, published).await;
    }
}

/// Serve the protocol over stdio until the client disconnects.
pub async fn run_server(provider: CompilationProvider) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let scheduler = RestoreScheduler::new(
        Arc::clone(provider.dispatcher()),
        Arc::new(ChannelListener(sender)),
    );
    if let Err(e) = scheduler.start() {
        error!(error = %e, "cannot start the restore worker");
    }
    let state = Arc::new(ServerState::new(provider, scheduler));
    info!("modlink-lsp listening on stdio");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = LspService::new(move |client| {
        tokio::spawn(refresh_loop(client.clone(), Arc::clone(&state), receiver));
        ModlinkLsp { client, state }
    });
    Server::new(stdin, stdout, socket).serve(service).await;
}
