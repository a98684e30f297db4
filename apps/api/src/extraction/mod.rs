// Listing extraction: input normalization, location hints, the closed output
// schema and the orchestrator around the model call.
// All model calls go through llm_client.

pub mod catalog;
pub mod extractor;
pub mod handlers;
pub mod hints;
pub mod images;
pub mod prompts;
pub mod schema;
