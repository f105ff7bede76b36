//! Configuration loading and validation
//!
//! Settings are read once at startup from a JSON file (`config.json` by
//! default), validated, and treated as immutable for the rest of the run.
//! Output directory templates contain a `{gen_num}` placeholder that is
//! resolved once the target generation is known.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::{PokedbError, Result};

/// Placeholder substituted with the target generation number in output paths
const GEN_PLACEHOLDER: &str = "{gen_num}";

/// Validated configuration for a snapshot run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the remote API, with trailing slash (e.g. `https://pokeapi.co/api/v2/`)
    pub api_base_url: String,
    /// Per-request timeout in seconds
    pub timeout: u64,
    /// Retries after the initial attempt for transient fetch failures
    pub max_retries: u32,
    /// Worker pool size for concurrent entity processing
    pub max_workers: usize,
    /// Directory for cached API payloads; `None` disables the file layer
    #[serde(default)]
    pub parser_cache_dir: Option<String>,
    /// Directory for cached scrape results; `None` disables the file layer
    #[serde(default)]
    pub scraper_cache_dir: Option<String>,
    /// Cache TTL in seconds; `None` or `0` disables file-level caching
    /// entirely
    #[serde(default)]
    pub cache_expires: Option<u64>,
    pub output_dir_ability: String,
    pub output_dir_item: String,
    pub output_dir_move: String,
    pub output_dir_pokemon: String,
    pub output_dir_variant: String,
    pub output_dir_transformation: String,
    pub output_dir_cosmetic: String,
}

impl Config {
    /// Load and validate settings from a JSON config file
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(PokedbError::invalid_config(format!(
                "configuration file not found at {}",
                path.display()
            )));
        }
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde alone cannot express
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(PokedbError::invalid_config("api_base_url cannot be empty"));
        }
        if self.timeout == 0 {
            return Err(PokedbError::invalid_config("timeout must be positive"));
        }
        if self.max_workers == 0 {
            return Err(PokedbError::invalid_config("max_workers must be positive"));
        }
        for dir in self.output_dirs() {
            if dir.is_empty() {
                return Err(PokedbError::invalid_config(
                    "output directory paths cannot be empty",
                ));
            }
        }
        Ok(())
    }

    /// Disable both cache layers for the rest of the run
    pub fn disable_caching(&mut self) {
        self.parser_cache_dir = None;
        self.scraper_cache_dir = None;
        self.cache_expires = None;
    }

    /// Resolve the `{gen_num}` placeholder in every output directory
    pub fn for_generation(&self, generation: u32) -> Config {
        let resolve = |template: &str| template.replace(GEN_PLACEHOLDER, &generation.to_string());
        Config {
            output_dir_ability: resolve(&self.output_dir_ability),
            output_dir_item: resolve(&self.output_dir_item),
            output_dir_move: resolve(&self.output_dir_move),
            output_dir_pokemon: resolve(&self.output_dir_pokemon),
            output_dir_variant: resolve(&self.output_dir_variant),
            output_dir_transformation: resolve(&self.output_dir_transformation),
            output_dir_cosmetic: resolve(&self.output_dir_cosmetic),
            ..self.clone()
        }
    }

    /// Per-request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// File-cache TTL as a `Duration`, when file caching is enabled
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_expires.map(Duration::from_secs)
    }

    fn output_dirs(&self) -> [&str; 7] {
        [
            &self.output_dir_ability,
            &self.output_dir_item,
            &self.output_dir_move,
            &self.output_dir_pokemon,
            &self.output_dir_variant,
            &self.output_dir_transformation,
            &self.output_dir_cosmetic,
        ]
    }
}
