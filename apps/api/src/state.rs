use std::sync::Arc;

use crate::llm_client::TextCompletionProvider;

/// Shared application state injected into all route handlers via Axum extractors.
/// Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Completion backend. `GeminiClient` in production, scripted stubs in tests.
    pub completion: Arc<dyn TextCompletionProvider>,
    /// Embed the raw candidate profile in generated HTML for diagnostics.
    pub expose_profile: bool,
}
