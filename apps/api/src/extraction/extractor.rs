//! Extraction orchestrator: normalize inputs, call the model (with a single
//! fallback attempt), clean the result.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::extraction::catalog::{CatalogError, CatalogSet};
use crate::extraction::hints::{extract_location_hints, LocationHints};
use crate::extraction::images::normalize_image_urls;
use crate::extraction::prompts::{build_system_prompt, build_user_content};
use crate::extraction::schema::ExtractionSchema;
use crate::llm_client::{parse_json_object, CompletionModel, CompletionRequest, LlmError, ResponseFormat};

/// Number of positional `imageN` slots accepted for compatibility.
pub const POSITIONAL_IMAGE_SLOTS: usize = 10;

const SCHEMA_NAME: &str = "listing_extraction";

const CURRENCY_CATALOG: &str = "divisa";
const GUARANI: &str = "GS";
const US_DOLLAR: &str = "$";

/// Inbound listing. `images` is the canonical form; `image1`..`image10` are
/// accepted as a compatibility alias and appended after it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingRequest {
    pub description: String,
    #[serde(default)]
    pub images: Option<Vec<Value>>,
    #[serde(default)]
    pub image1: Option<Value>,
    #[serde(default)]
    pub image2: Option<Value>,
    #[serde(default)]
    pub image3: Option<Value>,
    #[serde(default)]
    pub image4: Option<Value>,
    #[serde(default)]
    pub image5: Option<Value>,
    #[serde(default)]
    pub image6: Option<Value>,
    #[serde(default)]
    pub image7: Option<Value>,
    #[serde(default)]
    pub image8: Option<Value>,
    #[serde(default)]
    pub image9: Option<Value>,
    #[serde(default)]
    pub image10: Option<Value>,
}

impl ListingRequest {
    /// All image candidates in presentation order: the array first, then the slots.
    pub fn image_candidates(&self) -> Vec<&Value> {
        let positional: [&Option<Value>; POSITIONAL_IMAGE_SLOTS] = [
            &self.image1,
            &self.image2,
            &self.image3,
            &self.image4,
            &self.image5,
            &self.image6,
            &self.image7,
            &self.image8,
            &self.image9,
            &self.image10,
        ];

        self.images
            .iter()
            .flatten()
            .chain(positional.into_iter().flatten())
            .collect()
    }
}

/// Tunables for one extractor instance, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub primary_model: String,
    pub fallback_model: String,
    pub strict_schema: bool,
    pub location_hints: bool,
    pub max_images: usize,
    pub gs_per_usd: Option<u64>,
}

impl From<&Config> for ExtractorSettings {
    fn from(config: &Config) -> Self {
        Self {
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            strict_schema: config.strict_schema,
            location_hints: config.location_hints,
            max_images: config.max_images,
            gs_per_usd: config.gs_per_usd,
        }
    }
}

/// Holds the injected model collaborator and the shared, read-only schema data.
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn CompletionModel>,
    schema: Arc<ExtractionSchema>,
    catalogs: Arc<CatalogSet>,
    system_prompt: Arc<str>,
    settings: ExtractorSettings,
}

impl Extractor {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        schema: Arc<ExtractionSchema>,
        catalogs: Arc<CatalogSet>,
        settings: ExtractorSettings,
    ) -> Self {
        let system_prompt = build_system_prompt(&schema).into();
        Self {
            model,
            schema,
            catalogs,
            system_prompt,
            settings,
        }
    }

    pub fn catalogs(&self) -> &CatalogSet {
        &self.catalogs
    }

    /// Runs one extraction. The returned map always has exactly the schema's key set.
    pub async fn extract(&self, request: &ListingRequest) -> Result<Map<String, Value>, AppError> {
        let request_id = Uuid::new_v4();

        let mut images = normalize_image_urls(request.image_candidates());
        if images.len() > self.settings.max_images {
            warn!(
                %request_id,
                "Dropping {} image URLs beyond the limit of {}",
                images.len() - self.settings.max_images,
                self.settings.max_images
            );
            images.truncate(self.settings.max_images);
        }

        let hints = self
            .settings
            .location_hints
            .then(|| extract_location_hints(&request.description, &self.catalogs));
        if let Some(hints) = hints.as_ref().filter(|h| !h.is_empty()) {
            debug!(%request_id, ?hints, "Location hints extracted");
        }

        info!(
            %request_id,
            "Extracting listing: {} chars, {} images",
            request.description.chars().count(),
            images.len()
        );

        let completion = self.completion_request(&request.description, &images, hints.as_ref());
        let mut raw = self.complete_with_fallback(request_id, &completion).await?;

        // Runs on the raw map; the rewritten values still go through `clean`.
        if let Some(rate) = self.settings.gs_per_usd {
            convert_guaranies_to_usd(&mut raw, rate);
        }

        Ok(self.schema.clean(&Value::Object(raw)))
    }

    fn completion_request(
        &self,
        description: &str,
        images: &[String],
        hints: Option<&LocationHints>,
    ) -> CompletionRequest {
        let response_format = if self.settings.strict_schema {
            ResponseFormat::JsonSchema {
                name: SCHEMA_NAME.to_string(),
                schema: self.schema.to_json_schema(),
            }
        } else {
            ResponseFormat::JsonObject
        };

        CompletionRequest {
            system: self.system_prompt.to_string(),
            user_content: build_user_content(description, images, hints),
            response_format,
        }
    }

    /// Tries the primary model, then the fallback model exactly once.
    /// Unparseable output counts as a failed attempt. The fallback always runs in
    /// JSON-object mode.
    async fn complete_with_fallback(
        &self,
        request_id: Uuid,
        request: &CompletionRequest,
    ) -> Result<Map<String, Value>, AppError> {
        let primary = &self.settings.primary_model;
        let first_error = match self.attempt(request_id, primary, request).await {
            Ok(raw) => return Ok(raw),
            Err(e) => e,
        };

        let fallback = &self.settings.fallback_model;
        warn!(
            %request_id,
            "Model {primary} failed ({first_error}), retrying with fallback {fallback}"
        );

        let fallback_request = CompletionRequest {
            response_format: ResponseFormat::JsonObject,
            ..request.clone()
        };

        self.attempt(request_id, fallback, &fallback_request)
            .await
            .map_err(|e| {
                AppError::Llm(format!(
                    "primary model {primary} failed: {first_error}; fallback model {fallback} failed: {e}"
                ))
            })
    }

    async fn attempt(
        &self,
        request_id: Uuid,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<Map<String, Value>, LlmError> {
        let text = self.model.complete(model, request).await?;
        debug!(%request_id, model, raw = %text, "Model response");
        parse_json_object(&text)
    }
}

/// Fails when currency conversion is configured but the `divisa` catalog
/// cannot express both sides of it.
pub fn check_currency_catalog(catalogs: &CatalogSet, gs_per_usd: Option<u64>) -> Result<(), CatalogError> {
    if gs_per_usd.is_none() {
        return Ok(());
    }

    let currencies = catalogs.require(CURRENCY_CATALOG)?;
    for value in [GUARANI, US_DOLLAR] {
        if !currencies.contains(value) {
            return Err(CatalogError::MissingEntry {
                catalog: currencies.name().to_string(),
                value: value.to_string(),
            });
        }
    }

    Ok(())
}

/// Rewrites a guaraní price into US dollars using the configured rate.
/// Applies only when `divisa` is `"GS"` and `precio` is an integer.
fn convert_guaranies_to_usd(result: &mut Map<String, Value>, gs_per_usd: u64) {
    if result.get("divisa").and_then(Value::as_str).map(str::trim) != Some(GUARANI) {
        return;
    }
    let Some(price) = result.get("precio").and_then(Value::as_u64) else {
        return;
    };

    let usd = (price as f64 / gs_per_usd as f64).round() as u64;
    result.insert("precio".to_string(), Value::from(usd));
    result.insert("divisa".to_string(), Value::String(US_DOLLAR.to_string()));
}
