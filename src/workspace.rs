//! Overlay of live-edited documents.
//!
//! Open documents always win over the durable file resolver when the graph
//! builder loads a URI.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::syntax::SourceFile;

#[derive(Clone, Debug, Default)]
pub struct Workspace {
    documents: HashMap<Url, Arc<SourceFile>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the open document for `file.uri()`. Returns the
    /// node it replaced.
    pub fn upsert(&mut self, file: SourceFile) -> Option<Arc<SourceFile>> {
        self.documents.insert(file.uri().clone(), Arc::new(file))
    }

    pub fn remove(&mut self, uri: &Url) -> Option<Arc<SourceFile>> {
        self.documents.remove(uri)
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<SourceFile>> {
        self.documents.get(uri).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
