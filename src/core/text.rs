//! Text and localisation helpers
//!
//! English-entry selection, flavor-text filtering, generation-range parsing
//! for the scraper, Roman numerals for sprite keys, and the kebab→snake key
//! normalisation applied to every output document.

use std::collections::{BTreeMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::core::error::{PokedbError, Result};
use crate::core::models::{Effect, FlavorTextEntry, VerboseEffect};

const ENGLISH: &str = "en";

/// Roman numeral mapping, largest first for the greedy conversion
const ROMAN_NUMERAL_MAP: [(u32, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

lazy_static! {
    static ref NUMBERS: Regex = Regex::new(r"\d+").expect("static regex");
}

/// Collapse runs of whitespace (including the API's embedded form feeds and
/// newlines) into single spaces.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The English long/short effect pair from a list of multilingual entries
pub fn english_verbose(entries: &[VerboseEffect]) -> (Option<String>, Option<String>) {
    for entry in entries {
        if entry.language.name == ENGLISH {
            return (
                Some(normalize_ws(&entry.effect)),
                Some(normalize_ws(&entry.short_effect)),
            );
        }
    }
    (None, None)
}

/// The English text from a list of bare effect entries
pub fn english_effect(entries: &[Effect]) -> Option<String> {
    entries
        .iter()
        .find(|entry| entry.language.name == ENGLISH)
        .map(|entry| normalize_ws(&entry.effect))
}

/// English flavor texts keyed by version-group name, restricted to the
/// target generation's version groups. The first entry per group wins.
pub fn flavor_by_version_group(
    entries: &[FlavorTextEntry],
    target_groups: &[String],
) -> BTreeMap<String, String> {
    let targets: HashSet<&str> = target_groups.iter().map(String::as_str).collect();
    let mut texts = BTreeMap::new();
    for entry in entries {
        if entry.language.name != ENGLISH {
            continue;
        }
        let Some(group) = entry.version_group.as_ref() else {
            continue;
        };
        if !targets.contains(group.name.as_str()) {
            continue;
        }
        let cleaned = normalize_ws(&entry.flavor_text);
        if !cleaned.is_empty() {
            texts.entry(group.name.clone()).or_insert(cleaned);
        }
    }
    texts
}

/// English flavor texts keyed by version name, restricted to the target
/// generation's versions. Species flavor text uses `version` rather than
/// `version_group`.
pub fn flavor_by_version(
    entries: &[FlavorTextEntry],
    target_versions: &HashSet<String>,
) -> BTreeMap<String, String> {
    let mut texts = BTreeMap::new();
    for entry in entries {
        if entry.language.name != ENGLISH {
            continue;
        }
        let Some(version) = entry.version.as_ref() else {
            continue;
        };
        if !target_versions.contains(&version.name) {
            continue;
        }
        let cleaned = normalize_ws(&entry.flavor_text);
        if !cleaned.is_empty() {
            texts.entry(version.name.clone()).or_insert(cleaned);
        }
    }
    texts
}

/// Parse a scraped generation annotation ("Generations 3-6", "Generation 2")
/// into the closed list of generation numbers it covers.
pub fn parse_generation_range(text: &str) -> Option<Vec<u32>> {
    let lowered = text.to_lowercase();
    if !lowered.contains("generation") {
        return None;
    }
    let numbers: Vec<u32> = NUMBERS
        .find_iter(&lowered)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    match numbers.as_slice() {
        [single] => Some(vec![*single]),
        [start, end] if start <= end => Some((*start..=*end).collect()),
        _ => None,
    }
}

/// Convert a generation number to a Roman numeral ("generation-iii" sprite
/// keys).
pub fn int_to_roman(mut num: u32) -> Result<String> {
    if num == 0 || num > 3999 {
        return Err(PokedbError::contract(format!(
            "Roman numeral input out of range: {num}"
        )));
    }
    let mut out = String::new();
    for (value, numeral) in ROMAN_NUMERAL_MAP {
        while num >= value {
            out.push_str(numeral);
            num -= value;
        }
    }
    Ok(out)
}

/// Recursively rewrite kebab-case object keys to snake_case. Applied to the
/// final output document so untyped subtrees (sprites, cries) match the
/// typed fields' naming.
pub fn kebab_keys_to_snake(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| (key.replace('-', "_"), kebab_keys_to_snake(inner)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(kebab_keys_to_snake).collect())
        }
        other => other,
    }
}
