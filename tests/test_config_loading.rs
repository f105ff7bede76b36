//! Configuration loading from disk: JSON parsing, optional cache fields and
//! validation failures surfaced through `Config::load`.

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use pokedb::core::config::Config;

const FULL_CONFIG: &str = r#"{
    "api_base_url": "https://pokeapi.co/api/v2/",
    "timeout": 15,
    "max_retries": 3,
    "max_workers": 8,
    "parser_cache_dir": ".cache/api",
    "scraper_cache_dir": ".cache/scraper",
    "cache_expires": 86400,
    "output_dir_ability": "data/gen-{gen_num}/ability",
    "output_dir_item": "data/gen-{gen_num}/item",
    "output_dir_move": "data/gen-{gen_num}/move",
    "output_dir_pokemon": "data/gen-{gen_num}/pokemon",
    "output_dir_variant": "data/gen-{gen_num}/variant",
    "output_dir_transformation": "data/gen-{gen_num}/transformation",
    "output_dir_cosmetic": "data/gen-{gen_num}/cosmetic"
}"#;

#[test]
fn full_config_loads_and_resolves() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, FULL_CONFIG).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.max_workers, 8);
    assert_eq!(config.cache_ttl(), Some(std::time::Duration::from_secs(86400)));

    let resolved = config.for_generation(2);
    assert_eq!(resolved.output_dir_pokemon, "data/gen-2/pokemon");
    assert_eq!(resolved.api_base_url, "https://pokeapi.co/api/v2/");
}

#[test]
fn cache_settings_are_optional() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut stripped: serde_json::Value = serde_json::from_str(FULL_CONFIG).unwrap();
    let object = stripped.as_object_mut().unwrap();
    object.remove("parser_cache_dir");
    object.remove("scraper_cache_dir");
    object.remove("cache_expires");
    fs::write(&path, stripped.to_string()).unwrap();

    let config = Config::load(&path).unwrap();
    assert!(config.parser_cache_dir.is_none());
    assert!(config.cache_ttl().is_none());
}

#[test]
fn missing_file_is_a_configuration_error() {
    let dir = tempdir().unwrap();
    let err = Config::load(&dir.path().join("nope.json")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let broken = FULL_CONFIG.replace("\"timeout\": 15", "\"timeout\": 0");
    fs::write(&path, broken).unwrap();
    assert!(Config::load(&path).is_err());
}
