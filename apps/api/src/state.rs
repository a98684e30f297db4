use crate::extraction::extractor::Extractor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Extraction pipeline. Owns the model client, schema and catalogs.
    pub extractor: Extractor,
}
