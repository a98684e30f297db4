//! Extraction schema — the closed set of output fields and their constraints,
//! plus the cleaner that forces a raw model result to conform to it.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::extraction::catalog::{Catalog, CatalogError, CatalogSet};

/// Type constraint of a single output field. Every field is nullable.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Free-form string.
    Text,
    /// JSON integer.
    Integer,
    /// One value of a closed catalog.
    Enum(Arc<Catalog>),
    /// Zero or more values of a closed catalog.
    EnumSet(Arc<Catalog>),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Short natural-language hint rendered into the system prompt.
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A key the model is known to emit instead of the canonical field name.
#[derive(Debug, Clone)]
pub struct FieldAlias {
    pub alias: String,
    pub canonical: String,
}

#[derive(Debug, Clone)]
pub struct ExtractionSchema {
    fields: Vec<FieldSpec>,
    aliases: Vec<FieldAlias>,
}

/// Aliases observed in model output, as `(alias, canonical)`.
const LISTING_ALIASES: &[(&str, &str)] = &[
    ("baños", "banos"),
    ("barrio", "barrioasu"),
    ("ciudad", "ciudades"),
    ("amenities", "amenidades"),
    ("año_construccion", "anno_construccion"),
    ("ano_construccion", "anno_construccion"),
    ("nombre_edificio", "nombredeledificio"),
    ("moneda", "divisa"),
    ("tipo_propiedad", "tipodepropiedad"),
];

impl ExtractionSchema {
    pub fn new(fields: Vec<FieldSpec>, aliases: Vec<FieldAlias>) -> Self {
        Self { fields, aliases }
    }

    /// The full real-estate listing schema, bound to the given catalogs.
    pub fn listing(catalogs: &CatalogSet) -> Result<Self, CatalogError> {
        let one_of = |name: &str| catalogs.require(name).map(FieldKind::Enum);
        let many_of = |name: &str| catalogs.require(name).map(FieldKind::EnumSet);

        let fields = vec![
            FieldSpec::new("operacion", one_of("operacion")?),
            FieldSpec::new("tipodepropiedad", one_of("tipodepropiedad")?),
            FieldSpec::new("ciudades", one_of("ciudades")?),
            FieldSpec::new("barrioasu", one_of("barrioasu")?)
                .described("solo si la propiedad está en Asunción"),
            FieldSpec::new("precio", FieldKind::Integer).described("precio en la divisa indicada"),
            FieldSpec::new("habitaciones", one_of("habitaciones")?),
            FieldSpec::new("banos", one_of("banos")?),
            FieldSpec::new("cocheras", one_of("cocheras")?),
            FieldSpec::new("plantas", one_of("plantas")?),
            FieldSpec::new("m2", FieldKind::Integer).described("superficie en m²"),
            FieldSpec::new("anno_construccion", FieldKind::Integer)
                .described("año de construcción"),
            FieldSpec::new("estado", one_of("estado")?),
            FieldSpec::new("amenidades", many_of("amenidades")?),
            FieldSpec::new("amoblado", one_of("amoblado")?),
            FieldSpec::new("descripcion", FieldKind::Text).described(
                "resumen completo de la propiedad, bien estructurado y yendo al grano, para publicar",
            ),
            FieldSpec::new("descripcion_interna", FieldKind::Text)
                .described("análisis interno para el asesor: puntos fuertes, débiles y datos faltantes"),
            FieldSpec::new("nombredeledificio", FieldKind::Text).described("nombre del edificio"),
            FieldSpec::new("piso", FieldKind::Text).described("piso en el que se encuentra"),
            FieldSpec::new("estilo", one_of("estilo")?),
            FieldSpec::new("divisa", one_of("divisa")?),
            FieldSpec::new("ubicacion", FieldKind::Text)
                .described("dirección o referencia de ubicación lo más completa posible"),
            FieldSpec::new("asesor_nombre", FieldKind::Text).described("nombre del asesor"),
            FieldSpec::new("asesor_telefono", FieldKind::Text).described("teléfono del asesor"),
        ];

        let aliases = LISTING_ALIASES
            .iter()
            .map(|(alias, canonical)| FieldAlias {
                alias: alias.to_string(),
                canonical: canonical.to_string(),
            })
            .collect();

        Ok(Self::new(fields, aliases))
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Forces a raw model result into the schema's exact key set.
    ///
    /// Aliases are merged first (only into a missing or null canonical key),
    /// undeclared keys are dropped, and every value is kept only if it already
    /// conforms to its field's kind; anything else becomes null. No coercion.
    pub fn clean(&self, raw: &Value) -> Map<String, Value> {
        let empty = Map::new();
        let raw = raw.as_object().unwrap_or(&empty);

        let mut output = Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = raw
                .get(&field.name)
                .filter(|v| !v.is_null())
                .or_else(|| self.aliased_value(raw, &field.name));

            let cleaned = value
                .and_then(|v| conform(&field.kind, v))
                .unwrap_or(Value::Null);
            output.insert(field.name.clone(), cleaned);
        }

        output
    }

    fn aliased_value<'a>(&self, raw: &'a Map<String, Value>, canonical: &str) -> Option<&'a Value> {
        self.aliases
            .iter()
            .filter(|a| a.canonical == canonical)
            .filter_map(|a| raw.get(&a.alias))
            .find(|v| !v.is_null())
    }

    /// Renders the strict JSON-Schema document for schema-constrained output mode.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let property = match &field.kind {
                FieldKind::Text => json!({ "type": ["string", "null"] }),
                FieldKind::Integer => json!({ "type": ["integer", "null"] }),
                FieldKind::Enum(catalog) => {
                    let mut values: Vec<Value> =
                        catalog.values().iter().cloned().map(Value::String).collect();
                    values.push(Value::Null);
                    json!({ "type": ["string", "null"], "enum": values })
                }
                FieldKind::EnumSet(catalog) => json!({
                    "type": ["array", "null"],
                    "items": { "type": "string", "enum": catalog.values() }
                }),
            };
            properties.insert(field.name.clone(), property);
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.field_names().collect::<Vec<_>>(),
            "additionalProperties": false
        })
    }
}

fn conform(kind: &FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Text => value
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Value::String(s.to_string())),
        FieldKind::Integer => (value.is_i64() || value.is_u64()).then(|| value.clone()),
        FieldKind::Enum(catalog) => value
            .as_str()
            .map(str::trim)
            .filter(|s| catalog.contains(s))
            .map(|s| Value::String(s.to_string())),
        FieldKind::EnumSet(catalog) => {
            let kept: Vec<Value> = value
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| catalog.contains(s))
                .map(|s| Value::String(s.to_string()))
                .collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(name: &str, values: &[&str]) -> Arc<Catalog> {
        Arc::new(Catalog::new(name, values.iter().map(|v| v.to_string()).collect()).unwrap())
    }

    fn small_schema() -> ExtractionSchema {
        ExtractionSchema::new(
            vec![
                FieldSpec::new("operacion", FieldKind::Enum(catalog("operacion", &["venta", "alquiler"]))),
                FieldSpec::new("precio", FieldKind::Integer),
                FieldSpec::new("ciudades", FieldKind::Enum(catalog("ciudades", &["asuncion", "luque"]))),
            ],
            vec![],
        )
    }

    fn amenities_schema() -> ExtractionSchema {
        ExtractionSchema::new(
            vec![FieldSpec::new(
                "amenidades",
                FieldKind::EnumSet(catalog("amenidades", &["piscina", "Spa", "quincho"])),
            )],
            vec![FieldAlias {
                alias: "amenities".to_string(),
                canonical: "amenidades".to_string(),
            }],
        )
    }

    #[test]
    fn test_clean_drops_extra_and_fills_missing() {
        let raw = json!({"operacion": "venta", "extra_field": "x"});
        let cleaned = small_schema().clean(&raw);
        assert_eq!(
            Value::Object(cleaned),
            json!({"operacion": "venta", "precio": null, "ciudades": null})
        );
    }

    #[test]
    fn test_clean_key_set_matches_schema() {
        let schema = ExtractionSchema::listing(&CatalogSet::builtin().unwrap()).unwrap();
        let cleaned = schema.clean(&json!({"foo": 1, "bar": [1, 2]}));
        let keys: Vec<&str> = cleaned.keys().map(String::as_str).collect();
        let mut expected: Vec<&str> = schema.field_names().collect();
        expected.sort_unstable();
        let mut actual = keys.clone();
        actual.sort_unstable();
        assert_eq!(actual, expected);
        assert!(cleaned.values().all(Value::is_null));
    }

    #[test]
    fn test_listing_schema_has_23_fields() {
        let schema = ExtractionSchema::listing(&CatalogSet::builtin().unwrap()).unwrap();
        assert_eq!(schema.fields().len(), 23);
    }

    #[test]
    fn test_listing_schema_requires_catalogs() {
        let catalogs = CatalogSet::from_json(r#"{"operacion": ["venta"]}"#).unwrap();
        assert!(ExtractionSchema::listing(&catalogs).is_err());
    }

    #[test]
    fn test_enum_set_filters_unknown_values() {
        let raw = json!({"amenidades": ["piscina", "made-up-value", "Spa"]});
        let cleaned = amenities_schema().clean(&raw);
        assert_eq!(cleaned["amenidades"], json!(["piscina", "Spa"]));
    }

    #[test]
    fn test_enum_set_all_unknown_becomes_null() {
        let raw = json!({"amenidades": ["made-up-value"]});
        assert_eq!(amenities_schema().clean(&raw)["amenidades"], Value::Null);
    }

    #[test]
    fn test_enum_set_empty_becomes_null() {
        let raw = json!({"amenidades": []});
        assert_eq!(amenities_schema().clean(&raw)["amenidades"], Value::Null);
    }

    #[test]
    fn test_enum_set_non_array_becomes_null() {
        let raw = json!({"amenidades": "piscina"});
        assert_eq!(amenities_schema().clean(&raw)["amenidades"], Value::Null);
    }

    #[test]
    fn test_enum_set_filter_is_idempotent() {
        let schema = amenities_schema();
        let once = schema.clean(&json!({"amenidades": ["quincho", "nope", 3, "piscina"]}));
        let twice = schema.clean(&Value::Object(once.clone()));
        assert_eq!(once, twice);
        assert_eq!(once["amenidades"], json!(["quincho", "piscina"]));
    }

    #[test]
    fn test_alias_merged_when_canonical_absent() {
        let raw = json!({"amenities": ["Spa"]});
        assert_eq!(amenities_schema().clean(&raw)["amenidades"], json!(["Spa"]));
    }

    #[test]
    fn test_alias_merged_when_canonical_null() {
        let raw = json!({"amenidades": null, "amenities": ["piscina"]});
        assert_eq!(amenities_schema().clean(&raw)["amenidades"], json!(["piscina"]));
    }

    #[test]
    fn test_alias_ignored_when_canonical_present() {
        let raw = json!({"amenidades": ["quincho"], "amenities": ["piscina"]});
        assert_eq!(amenities_schema().clean(&raw)["amenidades"], json!(["quincho"]));
    }

    #[test]
    fn test_enum_outside_catalog_becomes_null() {
        let raw = json!({"operacion": "permuta", "ciudades": "Asuncion"});
        let cleaned = small_schema().clean(&raw);
        assert_eq!(cleaned["operacion"], Value::Null);
        assert_eq!(cleaned["ciudades"], Value::Null);
    }

    #[test]
    fn test_enum_trims_whitespace() {
        let cleaned = small_schema().clean(&json!({"operacion": " alquiler "}));
        assert_eq!(cleaned["operacion"], json!("alquiler"));
    }

    #[test]
    fn test_integer_not_coerced() {
        let schema = small_schema();
        assert_eq!(schema.clean(&json!({"precio": "150000"}))["precio"], Value::Null);
        assert_eq!(schema.clean(&json!({"precio": 1500.5}))["precio"], Value::Null);
        assert_eq!(schema.clean(&json!({"precio": 150000}))["precio"], json!(150000));
    }

    #[test]
    fn test_text_blank_becomes_null() {
        let schema = ExtractionSchema::new(vec![FieldSpec::new("piso", FieldKind::Text)], vec![]);
        assert_eq!(schema.clean(&json!({"piso": "   "}))["piso"], Value::Null);
        assert_eq!(schema.clean(&json!({"piso": 4}))["piso"], Value::Null);
        assert_eq!(schema.clean(&json!({"piso": "4"}))["piso"], json!("4"));
    }

    #[test]
    fn test_non_object_raw_yields_all_null() {
        let cleaned = small_schema().clean(&json!(["venta"]));
        assert_eq!(cleaned.len(), 3);
        assert!(cleaned.values().all(Value::is_null));
    }

    #[test]
    fn test_clean_is_noop_on_conforming_result() {
        let schema = ExtractionSchema::listing(&CatalogSet::builtin().unwrap()).unwrap();
        let raw = json!({
            "operacion": "venta",
            "tipodepropiedad": "casas",
            "ciudades": "asuncion",
            "barrioasu": "las-lomas",
            "precio": 250000,
            "habitaciones": "3",
            "amenidades": ["piscina", "quincho"],
            "descripcion": "Casa amplia con piscina.",
            "divisa": "$"
        });
        let once = schema.clean(&raw);
        let twice = schema.clean(&Value::Object(once.clone()));
        assert_eq!(once, twice);
        assert_eq!(once["barrioasu"], json!("las-lomas"));
    }

    #[test]
    fn test_json_schema_lists_every_field_as_required() {
        let schema = small_schema();
        let doc = schema.to_json_schema();
        assert_eq!(doc["required"], json!(["operacion", "precio", "ciudades"]));
        assert_eq!(doc["additionalProperties"], json!(false));
        assert_eq!(
            doc["properties"]["operacion"]["enum"],
            json!(["venta", "alquiler", null])
        );
        assert_eq!(doc["properties"]["precio"]["type"], json!(["integer", "null"]));
    }
}
