//! Location hints — best-effort address fields pulled from labeled lines
//! ("Dirección: ...", "Municipio: ...") in the listing text.
//!
//! Hints are advisory: they are offered to the model as suggestions and never
//! written into the result directly.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::extraction::catalog::CatalogSet;

/// Canonical slug of the capital.
pub const CAPITAL_SLUG: &str = "asuncion";

const CITY_CATALOG: &str = "ciudades";
const NEIGHBORHOOD_CATALOG: &str = "barrioasu";

static ADDRESS_LABEL: LazyLock<Regex> = LazyLock::new(|| label_pattern("direcci[oó]n|address|domicilio"));
static MUNICIPALITY_LABEL: LazyLock<Regex> = LazyLock::new(|| label_pattern("municipio|municipality"));
static DEPARTMENT_LABEL: LazyLock<Regex> = LazyLock::new(|| label_pattern("departamento|department|depto\\.?"));
static COUNTRY_LABEL: LazyLock<Regex> = LazyLock::new(|| label_pattern("pa[ií]s|country"));

static SLUG_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s\-./]").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn label_pattern(labels: &str) -> Regex {
    Regex::new(&format!(r"(?i)^\s*(?:{labels})\s*:\s*(.+)$")).unwrap()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHints {
    pub address: Option<String>,
    pub municipality: Option<String>,
    pub department: Option<String>,
    pub country: Option<String>,
    pub suggested_location_string: Option<String>,
    pub suggested_city_slug: Option<String>,
    pub suggested_neighborhood_slug: Option<String>,
}

impl LocationHints {
    pub fn is_empty(&self) -> bool {
        self.suggested_location_string.is_none()
    }

    /// Advisory text block appended to the outbound user message.
    /// `None` when no label was found.
    pub fn render(&self) -> Option<String> {
        let location = self.suggested_location_string.as_deref()?;

        let mut lines = vec![
            "Pistas de ubicación detectadas en el texto (sugerencias, no obligatorias):".to_string(),
            format!("- ubicacion sugerida: {location}"),
        ];
        if let Some(city) = &self.suggested_city_slug {
            lines.push(format!("- ciudades sugerida: {city}"));
        }
        if let Some(neighborhood) = &self.suggested_neighborhood_slug {
            lines.push(format!("- barrioasu sugerido: {neighborhood}"));
        }

        Some(lines.join("\n"))
    }
}

/// Extracts location hints from free text. Never fails: text with no
/// recognized labels yields all-`None` hints.
pub fn extract_location_hints(text: &str, catalogs: &CatalogSet) -> LocationHints {
    let mut hints = LocationHints::default();

    for line in text.lines() {
        // Labels are matched in composed form ("ó", not "o" + U+0301).
        let line: String = line.nfc().collect();
        // Later lines overwrite earlier ones, so the last occurrence of a label wins.
        if let Some(value) = capture(&ADDRESS_LABEL, &line) {
            hints.address = Some(value);
        } else if let Some(value) = capture(&MUNICIPALITY_LABEL, &line) {
            hints.municipality = Some(value);
        } else if let Some(value) = capture(&DEPARTMENT_LABEL, &line) {
            hints.department = Some(value);
        } else if let Some(value) = capture(&COUNTRY_LABEL, &line) {
            hints.country = Some(value);
        }
    }

    let parts: Vec<&str> = [
        &hints.address,
        &hints.municipality,
        &hints.department,
        &hints.country,
    ]
    .into_iter()
    .filter_map(|part| part.as_deref())
    .collect();
    if !parts.is_empty() {
        hints.suggested_location_string = Some(parts.join(", "));
    }

    let capital_known = catalogs
        .get(CITY_CATALOG)
        .map_or(true, |cities| cities.contains(CAPITAL_SLUG));

    if let Some(department) = &hints.department {
        if slugify(department) == CAPITAL_SLUG && capital_known {
            hints.suggested_city_slug = Some(CAPITAL_SLUG.to_string());
        }
    }

    if let (Some(municipality), Some(neighborhoods)) =
        (&hints.municipality, catalogs.get(NEIGHBORHOOD_CATALOG))
    {
        let slug = slugify(municipality);
        if neighborhoods.contains(&slug) {
            hints.suggested_neighborhood_slug = Some(slug);
            // Catalog neighborhoods belong to the capital.
            if hints.suggested_city_slug.is_none() && capital_known {
                hints.suggested_city_slug = Some(CAPITAL_SLUG.to_string());
            }
        }
    }

    hints
}

fn capture(pattern: &Regex, line: &str) -> Option<String> {
    let value = pattern.captures(line)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Lowercase, ASCII-only, hyphenated form of `text`.
///
/// Decomposes to NFD and drops combining marks, lowercases, removes anything
/// outside `[a-z0-9\s\-./]` and collapses whitespace runs into one hyphen.
pub fn slugify(text: &str) -> String {
    let stripped: String = text
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    let filtered = SLUG_DISALLOWED.replace_all(&stripped, "");
    WHITESPACE_RUN.replace_all(filtered.trim(), "-").into_owned()
}
