//! Closed catalogs of canonical values (cities, neighborhoods, amenities, ...).
//!
//! Catalogs are configuration data: loaded once at startup from `CATALOG_PATH`
//! (or the built-in default document) and shared by `Arc` with the schema,
//! the prompt builder and the hint extractor.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

/// Built-in catalog document, used when no `CATALOG_PATH` is configured.
const DEFAULT_CATALOGS: &str = include_str!("../../catalog/default.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed catalog document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog '{catalog}' contains a blank entry")]
    BlankEntry { catalog: String },

    #[error("catalog '{catalog}' contains duplicate entry '{value}'")]
    DuplicateEntry { catalog: String, value: String },

    #[error("catalog '{catalog}' is missing required entry '{value}'")]
    MissingEntry { catalog: String, value: String },

    #[error("catalog '{0}' is not defined")]
    Missing(String),
}

/// A named, ordered, closed list of allowed values.
/// Membership is exact and case-sensitive.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    values: Vec<String>,
    index: HashSet<String>,
}

impl Catalog {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Result<Self, CatalogError> {
        let name = name.into();
        let mut index = HashSet::with_capacity(values.len());

        for value in &values {
            if value.trim().is_empty() {
                return Err(CatalogError::BlankEntry { catalog: name });
            }
            if !index.insert(value.clone()) {
                return Err(CatalogError::DuplicateEntry {
                    catalog: name,
                    value: value.clone(),
                });
            }
        }

        Ok(Self {
            name,
            values,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains(value)
    }
}

/// Every catalog known to the service, keyed by catalog name.
#[derive(Debug, Clone, Default)]
pub struct CatalogSet {
    catalogs: BTreeMap<String, Arc<Catalog>>,
}

impl CatalogSet {
    /// Loads catalogs from `path`, or from the built-in document when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let set = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&raw)?
            }
            None => Self::from_json(DEFAULT_CATALOGS)?,
        };

        info!(
            "Loaded {} catalogs from {}",
            set.catalogs.len(),
            path.map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in defaults".to_string())
        );

        Ok(set)
    }

    /// The built-in catalogs.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(DEFAULT_CATALOGS)
    }

    /// Parses a `{ "<name>": ["value", ...] }` document.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let document: BTreeMap<String, Vec<String>> = serde_json::from_str(raw)?;

        let mut catalogs = BTreeMap::new();
        for (name, values) in document {
            let catalog = Catalog::new(name.clone(), values)?;
            catalogs.insert(name, Arc::new(catalog));
        }

        Ok(Self { catalogs })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Catalog>> {
        self.catalogs.get(name)
    }

    /// Like [`CatalogSet::get`], but a missing catalog is a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<Catalog>, CatalogError> {
        self.catalogs
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::Missing(name.to_string()))
    }
}
