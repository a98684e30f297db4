use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::llm_client::OPENAI_API_URL;

pub const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o-mini-2024-07-18";
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-3.5-turbo-0125";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_api_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub max_tokens: u32,
    pub llm_timeout_secs: u64,
    /// Use strict JSON-Schema output mode instead of plain JSON-object mode.
    /// Applies to the primary model only; the fallback always uses JSON-object mode.
    pub strict_schema: bool,
    pub location_hints: bool,
    pub max_images: usize,
    pub catalog_path: Option<PathBuf>,
    /// Guaraníes per US dollar. Currency conversion is off when unset.
    pub gs_per_usd: Option<u64>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gs_per_usd = optional::<u64>(&lookup, "GS_PER_USD")?;
        if gs_per_usd == Some(0) {
            anyhow::bail!("GS_PER_USD must be greater than zero");
        }

        Ok(Config {
            openai_api_key: lookup("OPENAI_API_KEY")
                .context("Required environment variable 'OPENAI_API_KEY' is not set")?,
            openai_api_url: lookup("OPENAI_API_URL").unwrap_or_else(|| OPENAI_API_URL.to_string()),
            primary_model: lookup("PRIMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model: lookup("FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            max_tokens: optional(&lookup, "MAX_TOKENS")?.unwrap_or(1024),
            llm_timeout_secs: optional(&lookup, "LLM_TIMEOUT_SECS")?.unwrap_or(120),
            strict_schema: optional(&lookup, "STRICT_SCHEMA")?.unwrap_or(false),
            location_hints: optional(&lookup, "LOCATION_HINTS")?.unwrap_or(true),
            max_images: optional(&lookup, "MAX_IMAGES")?.unwrap_or(10),
            catalog_path: lookup("CATALOG_PATH").map(PathBuf::from),
            gs_per_usd,
            port: optional(&lookup, "PORT")?.unwrap_or(8080),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value: '{raw}'"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.openai_api_url, OPENAI_API_URL);
        assert_eq!(config.primary_model, DEFAULT_PRIMARY_MODEL);
        assert_eq!(config.fallback_model, DEFAULT_FALLBACK_MODEL);
        assert_eq!(config.max_images, 10);
        assert_eq!(config.port, 8080);
        assert!(config.location_hints);
        assert!(!config.strict_schema);
        assert!(config.catalog_path.is_none());
        assert!(config.gs_per_usd.is_none());
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("PRIMARY_MODEL", "gpt-4o"),
            ("STRICT_SCHEMA", "true"),
            ("LOCATION_HINTS", "false"),
            ("GS_PER_USD", "7300"),
            ("CATALOG_PATH", "/etc/listing/catalogs.json"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.primary_model, "gpt-4o");
        assert!(config.strict_schema);
        assert!(!config.location_hints);
        assert_eq!(config.gs_per_usd, Some(7300));
        assert_eq!(config.catalog_path, Some(PathBuf::from("/etc/listing/catalogs.json")));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_invalid_port_fails() {
        let err = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_zero_exchange_rate_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("GS_PER_USD", "0"),
        ]));
        assert!(result.is_err());
    }
}
