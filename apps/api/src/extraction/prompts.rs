// Prompt construction for listing extraction. Field lines are rendered from the
// schema so the catalogs live in one place.

use serde_json::{json, Value};

use crate::extraction::hints::LocationHints;
use crate::extraction::schema::{ExtractionSchema, FieldKind};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

const EXTRACTION_PREAMBLE: &str = "Eres un extractor de datos inmobiliarios experto. \
    Analiza la descripción de texto y las imágenes para extraer/inferir info. \
    Devuelve un objeto JSON con esta estructura EXACTA (sin campos extras, usa null si no hay data). \
    Corrige ortografía/capitalización para coincidir con las listas.";

/// Builds the system instruction: preamble, one line per schema field, JSON-only rules.
pub fn build_system_prompt(schema: &ExtractionSchema) -> String {
    let fields: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| {
            let constraint = match &field.kind {
                FieldKind::Text => "(string)".to_string(),
                FieldKind::Integer => "(integer)".to_string(),
                FieldKind::Enum(catalog) => {
                    format!("Elige de: [{}] (string)", quote_all(catalog.values()))
                }
                FieldKind::EnumSet(catalog) => format!(
                    "Lista con cualquiera de: [{}] (array de strings)",
                    quote_all(catalog.values())
                ),
            };
            match &field.description {
                Some(description) => format!("  \"{}\": {description} {constraint}", field.name),
                None => format!("  \"{}\": {constraint}", field.name),
            }
        })
        .collect();

    format!(
        "{EXTRACTION_PREAMBLE}\n{{\n{}\n}}\n{JSON_ONLY_SYSTEM}",
        fields.join(",\n")
    )
}

/// Builds the multimodal user content: description (plus hints) then one part per image.
pub fn build_user_content(description: &str, images: &[String], hints: Option<&LocationHints>) -> Vec<Value> {
    let text = match hints.and_then(LocationHints::render) {
        Some(block) => format!("{description}\n\n{block}"),
        None => description.to_string(),
    };

    std::iter::once(json!({ "type": "text", "text": text }))
        .chain(
            images
                .iter()
                .map(|url| json!({ "type": "image_url", "image_url": { "url": url } })),
        )
        .collect()
}

fn quote_all(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::catalog::CatalogSet;

    #[test]
    fn test_system_prompt_lists_every_field() {
        let schema = ExtractionSchema::listing(&CatalogSet::builtin().unwrap()).unwrap();
        let prompt = build_system_prompt(&schema);
        for name in schema.field_names() {
            assert!(prompt.contains(&format!("\"{name}\":")), "missing field {name}");
        }
        assert!(prompt.contains("Elige de: ['venta', 'alquiler'] (string)"));
        assert!(prompt.contains("'las-lomas'"));
        assert!(prompt.contains("\"precio\": precio en la divisa indicada (integer)"));
    }

    #[test]
    fn test_user_content_text_then_images() {
        let images = vec![
            "https://a.com/1.jpg".to_string(),
            "https://a.com/2.jpg".to_string(),
        ];
        let content = build_user_content("Casa en venta", &images, None);
        assert_eq!(content.len(), 3);
        assert_eq!(content[0], json!({"type": "text", "text": "Casa en venta"}));
        assert_eq!(content[2]["image_url"]["url"], "https://a.com/2.jpg");
    }

    #[test]
    fn test_user_content_appends_hints() {
        let hints = LocationHints {
            suggested_location_string: Some("Av. España 123, Las Lomas".to_string()),
            ..Default::default()
        };
        let content = build_user_content("Casa", &[], Some(&hints));
        let text = content[0]["text"].as_str().unwrap();
        assert!(text.starts_with("Casa\n\n"));
        assert!(text.contains("Av. España 123, Las Lomas"));
    }

    #[test]
    fn test_user_content_skips_empty_hints() {
        let content = build_user_content("Casa", &[], Some(&LocationHints::default()));
        assert_eq!(content[0]["text"], "Casa");
    }
}
