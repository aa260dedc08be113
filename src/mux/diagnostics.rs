//! Per-document, per-origin diagnostics aggregation.

use std::collections::HashMap;
use std::sync::Mutex;

use lsp_types::{Diagnostic, Uri};

/// Thread-safe two-level map: document uri -> backend name -> diagnostics.
/// Critical sections stay short and free of I/O.
pub struct DiagnosticsRegistry {
    all: Mutex<HashMap<Uri, HashMap<String, Vec<Diagnostic>>>>,
}

impl DiagnosticsRegistry {
    pub fn new() -> Self {
        Self {
            all: Mutex::new(HashMap::new()),
        }
    }

    /// Replace `origin`'s diagnostics for `uri` wholesale; each publish fully
    /// supersedes that origin's previous publish for the document.
    pub fn update(&self, uri: Uri, origin: &str, diagnostics: Vec<Diagnostic>) {
        self.all
            .lock()
            .unwrap()
            .entry(uri)
            .or_default()
            .insert(origin.to_string(), diagnostics);
    }

    /// Union of diagnostics across every origin for `uri`. Order across
    /// origins is unspecified.
    pub fn combined(&self, uri: &Uri) -> Vec<Diagnostic> {
        let all = self.all.lock().unwrap();
        all.get(uri)
            .map(|origins| origins.values().flatten().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for DiagnosticsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
