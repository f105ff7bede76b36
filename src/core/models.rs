//! Typed API payloads and shared output shapes
//!
//! The remote API serves duck-typed JSON; every payload the pipeline consumes
//! is decoded once at the fetch boundary into one of these structs. Unknown
//! fields are ignored and sprite/cry blobs stay as raw [`serde_json::Value`]
//! trees since only their keys are filtered, never their contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Shared references
// =============================================================================

/// A `{name, url}` reference to another API resource. Never mutated after
/// discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
    pub url: String,
}

impl NamedRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        NamedRef {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A bare `{url}` reference (e.g. an evolution chain link)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRef {
    pub url: String,
}

/// A paginated collection listing
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub results: Vec<NamedRef>,
}

/// Extract the trailing numeric id from a resource URL
/// (`.../generation/3/` → `3`).
pub fn id_from_url(url: &str) -> Option<u32> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}

// =============================================================================
// Generation / version-group / Pokédex payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationData {
    pub id: u32,
    #[serde(default)]
    pub version_groups: Vec<NamedRef>,
    #[serde(default)]
    pub abilities: Vec<NamedRef>,
    #[serde(default)]
    pub moves: Vec<NamedRef>,
    #[serde(default)]
    pub pokemon_species: Vec<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionGroupData {
    pub name: String,
    pub generation: NamedRef,
    #[serde(default)]
    pub versions: Vec<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokedexData {
    pub name: String,
    #[serde(default)]
    pub is_main_series: bool,
    #[serde(default)]
    pub version_groups: Vec<NamedRef>,
}

// =============================================================================
// Effect / flavor text payloads
// =============================================================================

/// An effect entry carrying both long and short English text
#[derive(Debug, Clone, Deserialize)]
pub struct VerboseEffect {
    #[serde(default)]
    pub effect: String,
    #[serde(default)]
    pub short_effect: String,
    pub language: NamedRef,
}

/// A bare effect entry (used by ability effect changes)
#[derive(Debug, Clone, Deserialize)]
pub struct Effect {
    #[serde(default)]
    pub effect: String,
    pub language: NamedRef,
}

/// A flavor text entry, keyed either by version group (abilities, moves,
/// items) or by version (species). Items call the text field `text`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlavorTextEntry {
    #[serde(default, alias = "text")]
    pub flavor_text: String,
    pub language: NamedRef,
    #[serde(default)]
    pub version_group: Option<NamedRef>,
    #[serde(default)]
    pub version: Option<NamedRef>,
}

// =============================================================================
// Ability payloads
// =============================================================================

/// An override record: as of `version_group`, the ability's effect text
/// took on new values.
#[derive(Debug, Clone, Deserialize)]
pub struct AbilityEffectChange {
    pub version_group: NamedRef,
    #[serde(default)]
    pub effect_entries: Vec<Effect>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbilityData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_main_series: Option<bool>,
    #[serde(default)]
    pub effect_entries: Vec<VerboseEffect>,
    #[serde(default)]
    pub effect_changes: Vec<AbilityEffectChange>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
}

// =============================================================================
// Move payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MoveStatChange {
    pub change: i32,
    pub stat: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveMetaData {
    #[serde(default)]
    pub ailment: Option<NamedRef>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub min_hits: Option<i32>,
    #[serde(default)]
    pub max_hits: Option<i32>,
    #[serde(default)]
    pub min_turns: Option<i32>,
    #[serde(default)]
    pub max_turns: Option<i32>,
    #[serde(default)]
    pub drain: i32,
    #[serde(default)]
    pub healing: i32,
    #[serde(default)]
    pub crit_rate: i32,
    #[serde(default)]
    pub ailment_chance: i32,
    #[serde(default)]
    pub flinch_chance: i32,
    #[serde(default)]
    pub stat_chance: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MachineVersionDetail {
    pub machine: UrlRef,
    pub version_group: NamedRef,
}

/// A TM/HM machine resource; only the item name is consumed
#[derive(Debug, Clone, Deserialize)]
pub struct MachineData {
    pub item: NamedRef,
}

/// An override record: as of `version_group`, the listed stats took on new
/// values. Fields left `None` were unchanged by the event.
#[derive(Debug, Clone, Deserialize)]
pub struct PastMoveValues {
    #[serde(default)]
    pub accuracy: Option<i32>,
    #[serde(default)]
    pub power: Option<i32>,
    #[serde(default)]
    pub pp: Option<i32>,
    #[serde(default)]
    pub effect_chance: Option<i32>,
    #[serde(default, rename = "type")]
    pub type_: Option<NamedRef>,
    #[serde(default)]
    pub effect_entries: Vec<VerboseEffect>,
    pub version_group: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub accuracy: Option<i32>,
    #[serde(default)]
    pub power: Option<i32>,
    #[serde(default)]
    pub pp: Option<i32>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub effect_chance: Option<i32>,
    #[serde(default)]
    pub damage_class: Option<NamedRef>,
    #[serde(default, rename = "type")]
    pub type_: Option<NamedRef>,
    #[serde(default)]
    pub target: Option<NamedRef>,
    #[serde(default)]
    pub generation: Option<NamedRef>,
    #[serde(default)]
    pub effect_entries: Vec<VerboseEffect>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
    #[serde(default)]
    pub stat_changes: Vec<MoveStatChange>,
    #[serde(default)]
    pub machines: Vec<MachineVersionDetail>,
    #[serde(default)]
    pub meta: Option<MoveMetaData>,
    #[serde(default)]
    pub past_values: Vec<PastMoveValues>,
}

// =============================================================================
// Item payloads
// =============================================================================

/// Presence in a generation's game data; used to filter out entities that
/// did not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationGameIndex {
    pub generation: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemSprites {
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub cost: Option<i64>,
    #[serde(default)]
    pub fling_power: Option<i64>,
    #[serde(default)]
    pub fling_effect: Option<NamedRef>,
    #[serde(default)]
    pub attributes: Vec<NamedRef>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub effect_entries: Vec<VerboseEffect>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
    #[serde(default)]
    pub game_indices: Vec<GenerationGameIndex>,
    #[serde(default)]
    pub sprites: Option<ItemSprites>,
}

// =============================================================================
// Species / Pokémon payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PokedexNumber {
    pub entry_number: i64,
    pub pokedex: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genus {
    #[serde(default)]
    pub genus: String,
    pub language: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variety {
    #[serde(default)]
    pub is_default: bool,
    pub pokemon: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub base_happiness: Option<i64>,
    #[serde(default)]
    pub capture_rate: Option<i64>,
    #[serde(default)]
    pub hatch_counter: Option<i64>,
    #[serde(default)]
    pub gender_rate: Option<i64>,
    #[serde(default)]
    pub has_gender_differences: Option<bool>,
    #[serde(default)]
    pub is_baby: Option<bool>,
    #[serde(default)]
    pub is_legendary: Option<bool>,
    #[serde(default)]
    pub is_mythical: Option<bool>,
    #[serde(default)]
    pub forms_switchable: Option<bool>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub growth_rate: Option<NamedRef>,
    #[serde(default)]
    pub habitat: Option<NamedRef>,
    #[serde(default)]
    pub evolves_from_species: Option<NamedRef>,
    #[serde(default)]
    pub pokedex_numbers: Vec<PokedexNumber>,
    #[serde(default)]
    pub color: Option<NamedRef>,
    #[serde(default)]
    pub shape: Option<NamedRef>,
    #[serde(default)]
    pub egg_groups: Vec<NamedRef>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorTextEntry>,
    #[serde(default)]
    pub genera: Vec<Genus>,
    #[serde(default)]
    pub generation: Option<NamedRef>,
    #[serde(default)]
    pub evolution_chain: Option<UrlRef>,
    #[serde(default)]
    pub varieties: Vec<Variety>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonStat {
    pub base_stat: i64,
    #[serde(default)]
    pub effort: i64,
    pub stat: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonType {
    #[serde(rename = "type")]
    pub type_: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonAbility {
    pub ability: NamedRef,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub slot: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeldItemVersion {
    pub version: NamedRef,
    #[serde(default)]
    pub rarity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeldItem {
    pub item: NamedRef,
    #[serde(default)]
    pub version_details: Vec<HeldItemVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveVersionDetail {
    #[serde(default)]
    pub level_learned_at: i64,
    pub move_learn_method: NamedRef,
    pub version_group: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonMove {
    #[serde(rename = "move")]
    pub move_: NamedRef,
    #[serde(default)]
    pub version_group_details: Vec<MoveVersionDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub base_experience: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub cries: Option<Value>,
    #[serde(default)]
    pub sprites: Option<Value>,
    #[serde(default)]
    pub stats: Vec<PokemonStat>,
    #[serde(default)]
    pub types: Vec<PokemonType>,
    #[serde(default)]
    pub abilities: Vec<PokemonAbility>,
    #[serde(default)]
    pub forms: Vec<NamedRef>,
    #[serde(default)]
    pub game_indices: Vec<Value>,
    #[serde(default)]
    pub held_items: Vec<HeldItem>,
    #[serde(default)]
    pub moves: Vec<PokemonMove>,
}

/// A Pokémon form; `version_group` carries its introduction generation
#[derive(Debug, Clone, Deserialize)]
pub struct FormData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_battle_only: bool,
    #[serde(default)]
    pub version_group: Option<NamedRef>,
    #[serde(default)]
    pub sprites: Option<Value>,
}

// =============================================================================
// Evolution chain payloads
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionChainData {
    pub chain: ChainLink,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainLink {
    pub species: NamedRef,
    #[serde(default)]
    pub evolution_details: Vec<EvolutionDetailData>,
    #[serde(default)]
    pub evolves_to: Vec<ChainLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvolutionDetailData {
    #[serde(default)]
    pub item: Option<NamedRef>,
    #[serde(default)]
    pub trigger: Option<NamedRef>,
    #[serde(default)]
    pub gender: Option<i64>,
    #[serde(default)]
    pub held_item: Option<NamedRef>,
    #[serde(default)]
    pub known_move: Option<NamedRef>,
    #[serde(default)]
    pub known_move_type: Option<NamedRef>,
    #[serde(default)]
    pub location: Option<NamedRef>,
    #[serde(default)]
    pub min_level: Option<i64>,
    #[serde(default)]
    pub min_happiness: Option<i64>,
    #[serde(default)]
    pub min_beauty: Option<i64>,
    #[serde(default)]
    pub min_affection: Option<i64>,
    #[serde(default)]
    pub needs_overworld_rain: Option<bool>,
    #[serde(default)]
    pub party_species: Option<NamedRef>,
    #[serde(default)]
    pub party_type: Option<NamedRef>,
    #[serde(default)]
    pub relative_physical_stats: Option<i64>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub trade_species: Option<NamedRef>,
    #[serde(default)]
    pub turn_upside_down: Option<bool>,
}

// =============================================================================
// Output shapes
// =============================================================================

/// A temporally-sensitive output field: a plain scalar when the value was
/// identical across every version group of the target generation, or a map
/// keyed by version-group name when it varied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Versioned<T> {
    Uniform(T),
    ByVersionGroup(BTreeMap<String, T>),
}

impl<T> Versioned<T> {
    /// Whether the field collapsed to a single scalar
    pub fn is_uniform(&self) -> bool {
        matches!(self, Versioned::Uniform(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_id_parsed_from_url() {
        assert_eq!(id_from_url("https://pokeapi.co/api/v2/generation/3/"), Some(3));
        assert_eq!(id_from_url("https://pokeapi.co/api/v2/pokemon/25"), Some(25));
        assert_eq!(id_from_url("https://pokeapi.co/api/v2/pokemon/pikachu/"), None);
    }

    #[test]
    fn versioned_serializes_as_scalar_or_map() {
        let uniform = Versioned::Uniform(40);
        assert_eq!(serde_json::to_string(&uniform).unwrap(), "40");

        let mut map = BTreeMap::new();
        map.insert("red-blue".to_string(), 40);
        map.insert("yellow".to_string(), 35);
        let varied = Versioned::ByVersionGroup(map);
        assert_eq!(
            serde_json::to_string(&varied).unwrap(),
            r#"{"red-blue":40,"yellow":35}"#
        );
    }

    #[test]
    fn item_flavor_text_uses_text_alias() {
        let entry: FlavorTextEntry = serde_json::from_str(
            r#"{"text": "Restores HP.", "language": {"name": "en", "url": ""}}"#,
        )
        .unwrap();
        assert_eq!(entry.flavor_text, "Restores HP.");
    }
}
