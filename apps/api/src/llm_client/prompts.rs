// Shared prompt fragments. Each service that needs LLM calls defines its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "Devuelve SOLO un objeto JSON válido. \
    No incluyas texto fuera del objeto JSON. \
    No uses bloques de código markdown. \
    No incluyas explicaciones ni disculpas.";
