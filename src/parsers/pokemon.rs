//! Pokémon species parser
//!
//! One species job fans out into several output documents:
//!
//! - the default form, enriched with species-level data (Pokédex numbers,
//!   flavor text, evolution chain, held items, learnable moves)
//! - regional variants and battle-only transformations, built by cloning the
//!   default record and overlaying the variety's own base data
//! - cosmetic forms, which differ from the default only in name and sprites
//!
//! Forms and varieties introduced after the target generation are dropped,
//! and on historical runs scraped change lists overwrite stats, types,
//! abilities and yields the API only reports in their latest shape.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::core::error::Result;
use crate::core::evolution::{resolve_chain, EvolutionNode};
use crate::core::models::{
    id_from_url, FormData, HeldItem, NamedRef, PokemonData, PokemonMove, SpeciesData, Variety,
    VersionGroupData,
};
use crate::core::output::write_json_file;
use crate::core::runner::Outcome;
use crate::core::scraper::EvYield;
use crate::core::text::{flavor_by_version, int_to_roman};

use super::{discover_by_generation, Parser, ParserContext};

const CATEGORY_POKEMON: &str = "pokemon";
const CATEGORY_VARIANT: &str = "variant";
const CATEGORY_TRANSFORMATION: &str = "transformation";
const CATEGORY_COSMETIC: &str = "cosmetic";

#[derive(Debug, Clone, Serialize)]
struct AbilityEntry {
    name: String,
    is_hidden: bool,
    slot: i64,
}

#[derive(Debug, Clone, Serialize)]
struct FormEntry {
    name: String,
    category: String,
}

#[derive(Debug, Clone, Serialize)]
struct LearnedMove {
    name: String,
    level_learned_at: i64,
    version_groups: Vec<String>,
}

/// The per-Pokémon output document. Variants and cosmetic forms clone the
/// default record and overwrite their own fields, inheriting the species
/// extras.
#[derive(Debug, Clone, Serialize)]
struct PokemonRecord {
    id: i64,
    name: String,
    species: String,
    is_default: bool,
    source_url: String,
    types: Vec<String>,
    abilities: Vec<AbilityEntry>,
    stats: BTreeMap<String, i64>,
    ev_yield: Vec<EvYield>,
    height: Option<i64>,
    weight: Option<i64>,
    cries: Value,
    sprites: Value,
    base_experience: Option<i64>,
    base_happiness: Option<i64>,
    capture_rate: Option<i64>,
    hatch_counter: Option<i64>,
    gender_rate: Option<i64>,
    has_gender_differences: Option<bool>,
    is_baby: Option<bool>,
    is_legendary: Option<bool>,
    is_mythical: Option<bool>,
    forms_switchable: Option<bool>,
    order: Option<i64>,
    growth_rate: Option<String>,
    habitat: Option<String>,
    evolves_from_species: Option<String>,
    pokedex_numbers: BTreeMap<String, i64>,
    color: Option<String>,
    shape: Option<String>,
    egg_groups: Vec<String>,
    flavor_text: BTreeMap<String, String>,
    genus: Option<String>,
    generation: Option<String>,
    evolution_chain: Option<EvolutionNode>,
    held_items: BTreeMap<String, BTreeMap<String, i64>>,
    moves: BTreeMap<String, Vec<LearnedMove>>,
    forms: Vec<FormEntry>,
}

pub struct PokemonParser;

#[async_trait]
impl Parser for PokemonParser {
    fn name(&self) -> &'static str {
        CATEGORY_POKEMON
    }

    fn entity_type(&self) -> &'static str {
        "Species"
    }

    async fn discover(&self, ctx: &ParserContext) -> Result<Vec<NamedRef>> {
        discover_by_generation(ctx, "species", |generation| &generation.pokemon_species).await
    }

    async fn process(&self, ctx: &ParserContext, reference: NamedRef) -> Result<Outcome> {
        let species: SpeciesData = ctx.client.get(&reference.url).await?;

        let evolution_chain = match &species.evolution_chain {
            Some(chain) => {
                resolve_chain(&ctx.client, &chain.url, ctx.index.target_generation()).await
            }
            None => None,
        };

        let varieties = species_varieties(ctx, &species);
        let default_variety = varieties
            .iter()
            .find(|variety| variety.is_default)
            .unwrap_or(&varieties[0])
            .clone();
        let default_pokemon: PokemonData =
            ctx.client.get(&default_variety.pokemon.url).await?;

        // Placeholder species have no game data at all.
        if default_pokemon.game_indices.is_empty() {
            info!(species = %species.name, "skipping species with no game indices");
            return Ok(Outcome::Skip);
        }

        let (forms_in_gen, variety_form_urls) =
            collect_forms(ctx, &varieties, &default_pokemon).await?;

        let mut buckets: BTreeMap<String, Vec<Value>> = BTreeMap::new();

        let default_record = self
            .write_default(
                ctx,
                &default_variety,
                &default_pokemon,
                &species,
                evolution_chain,
                forms_in_gen,
            )
            .await?;
        buckets
            .entry(CATEGORY_POKEMON.to_string())
            .or_default()
            .push(summary_of(&default_record));

        let mut processed: HashSet<&str> = HashSet::new();
        processed.insert(default_variety.pokemon.url.as_str());
        for variety in &varieties {
            if processed.contains(variety.pokemon.url.as_str()) {
                continue;
            }
            if let Some((category, summary)) =
                self.write_variety(ctx, variety, &default_record).await?
            {
                buckets.entry(category.to_string()).or_default().push(summary);
                processed.insert(variety.pokemon.url.as_str());
            }
        }

        for form in &default_pokemon.forms {
            if variety_form_urls.contains(&form.url) {
                continue;
            }
            if let Some(summary) = self.write_cosmetic(ctx, &form.url, &default_record).await? {
                buckets
                    .entry(CATEGORY_COSMETIC.to_string())
                    .or_default()
                    .push(summary);
            }
        }

        Ok(Outcome::Buckets(buckets))
    }
}

impl PokemonParser {
    async fn write_default(
        &self,
        ctx: &ParserContext,
        variety: &Variety,
        pokemon: &PokemonData,
        species: &SpeciesData,
        evolution_chain: Option<EvolutionNode>,
        forms: Vec<FormEntry>,
    ) -> Result<PokemonRecord> {
        let mut record = base_record(
            pokemon,
            &species.name,
            &variety.pokemon.url,
            ctx.index.target_generation(),
        );
        add_species_data(&mut record, ctx, pokemon, species, evolution_chain)?;
        record.forms = forms;

        if let Some(scraper) = &ctx.scraper {
            let scraped = scraper.pokemon_changes(&record.species).await;
            apply_scraped_changes(&mut record, &scraped.changes, ctx.index.target_generation());
        }

        write_json_file(Path::new(&ctx.config.output_dir_pokemon), &record.name, &record)?;
        Ok(record)
    }

    /// Write a non-default variety; returns its category and summary, or
    /// `None` when the variety does not exist in the target generation.
    async fn write_variety(
        &self,
        ctx: &ParserContext,
        variety: &Variety,
        default_record: &PokemonRecord,
    ) -> Result<Option<(&'static str, Value)>> {
        let pokemon: PokemonData = ctx.client.get(&variety.pokemon.url).await?;
        if pokemon.game_indices.is_empty() {
            info!(variety = %pokemon.name, "skipping variety with no game indices");
            return Ok(None);
        }

        let form = match pokemon.forms.first() {
            Some(form_ref) => Some(ctx.client.get::<FormData>(&form_ref.url).await?),
            None => None,
        };
        if let Some(form) = &form {
            if should_skip_form(ctx, form).await? {
                return Ok(None);
            }
        }

        let mut record = default_record.clone();
        overlay_base(
            &mut record,
            base_record(
                &pokemon,
                &default_record.species,
                &variety.pokemon.url,
                ctx.index.target_generation(),
            ),
        );

        let battle_only = form.map(|f| f.is_battle_only).unwrap_or(false);
        let (dir, category) = if battle_only {
            (&ctx.config.output_dir_transformation, CATEGORY_TRANSFORMATION)
        } else {
            (&ctx.config.output_dir_variant, CATEGORY_VARIANT)
        };
        write_json_file(Path::new(dir), &record.name, &record)?;
        Ok(Some((category, summary_of(&record))))
    }

    /// Write a cosmetic form; `None` when it is the default form or was
    /// introduced after the target generation.
    async fn write_cosmetic(
        &self,
        ctx: &ParserContext,
        form_url: &str,
        default_record: &PokemonRecord,
    ) -> Result<Option<Value>> {
        let form: FormData = ctx.client.get(form_url).await?;
        if form.is_default || should_skip_form(ctx, &form).await? {
            return Ok(None);
        }

        let mut record = default_record.clone();
        if !form.name.is_empty() {
            record.name = form.name.clone();
        }
        record.is_default = false;
        if let Some(form_sprites) = &form.sprites {
            overlay_form_sprites(&mut record.sprites, form_sprites);
        }

        write_json_file(Path::new(&ctx.config.output_dir_cosmetic), &record.name, &record)?;
        Ok(Some(summary_of(&record)))
    }
}

/// The species' varieties, or a synthetic default variety when the API
/// lists none.
fn species_varieties(ctx: &ParserContext, species: &SpeciesData) -> Vec<Variety> {
    if species.varieties.is_empty() {
        vec![Variety {
            is_default: true,
            pokemon: NamedRef::new(
                species.name.clone(),
                format!("{}pokemon/{}", ctx.config.api_base_url, species.id),
            ),
        }]
    } else {
        species.varieties.clone()
    }
}

/// Categorise every variety's primary form plus the default Pokémon's
/// cosmetic forms, dropping anything introduced after the target generation.
/// Returns the sorted form list and the set of form URLs owned by varieties.
async fn collect_forms(
    ctx: &ParserContext,
    varieties: &[Variety],
    default_pokemon: &PokemonData,
) -> Result<(Vec<FormEntry>, HashSet<String>)> {
    let mut forms = Vec::new();
    let mut variety_form_urls = HashSet::new();

    for variety in varieties {
        let pokemon: PokemonData = ctx.client.get(&variety.pokemon.url).await?;
        let Some(form_ref) = pokemon.forms.first() else {
            info!(variety = %pokemon.name, "skipping variety with no forms");
            continue;
        };
        variety_form_urls.insert(form_ref.url.clone());

        let form: FormData = ctx.client.get(&form_ref.url).await?;
        if should_skip_form(ctx, &form).await? {
            continue;
        }
        let category = if variety.is_default {
            "default"
        } else if form.is_battle_only {
            CATEGORY_TRANSFORMATION
        } else {
            CATEGORY_VARIANT
        };
        forms.push(FormEntry {
            name: pokemon.name.clone(),
            category: category.to_string(),
        });
    }

    for form_ref in &default_pokemon.forms {
        if variety_form_urls.contains(&form_ref.url) {
            continue;
        }
        let form: FormData = ctx.client.get(&form_ref.url).await?;
        if !form.is_default && !should_skip_form(ctx, &form).await? {
            forms.push(FormEntry {
                name: form.name.clone(),
                category: CATEGORY_COSMETIC.to_string(),
            });
        }
    }

    forms.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((forms, variety_form_urls))
}

/// Whether a form was introduced after the target generation
async fn should_skip_form(ctx: &ParserContext, form: &FormData) -> Result<bool> {
    let Some(version_group) = &form.version_group else {
        return Ok(false);
    };
    let group: VersionGroupData = ctx.client.get(&version_group.url).await?;
    let Some(generation) = id_from_url(&group.generation.url) else {
        return Ok(false);
    };
    Ok(generation > ctx.index.target_generation())
}

/// The fields common to every form and variety of a species
fn base_record(
    pokemon: &PokemonData,
    species_name: &str,
    source_url: &str,
    target_generation: u32,
) -> PokemonRecord {
    PokemonRecord {
        id: pokemon.id,
        name: pokemon.name.clone(),
        species: species_name.to_string(),
        is_default: pokemon.is_default,
        source_url: source_url.to_string(),
        types: pokemon
            .types
            .iter()
            .map(|entry| entry.type_.name.clone())
            .collect(),
        abilities: pokemon
            .abilities
            .iter()
            .map(|entry| AbilityEntry {
                name: entry.ability.name.clone(),
                is_hidden: entry.is_hidden,
                slot: entry.slot,
            })
            .collect(),
        stats: pokemon
            .stats
            .iter()
            .map(|entry| (entry.stat.name.clone(), entry.base_stat))
            .collect(),
        ev_yield: pokemon
            .stats
            .iter()
            .filter(|entry| entry.effort > 0)
            .map(|entry| EvYield {
                effort: entry.effort as u32,
                stat: entry.stat.name.clone(),
            })
            .collect(),
        height: pokemon.height,
        weight: pokemon.weight,
        cries: pokemon.cries.clone().unwrap_or_else(|| json!({})),
        sprites: filter_sprites(pokemon.sprites.as_ref(), target_generation),
        base_experience: None,
        base_happiness: None,
        capture_rate: None,
        hatch_counter: None,
        gender_rate: None,
        has_gender_differences: None,
        is_baby: None,
        is_legendary: None,
        is_mythical: None,
        forms_switchable: None,
        order: None,
        growth_rate: None,
        habitat: None,
        evolves_from_species: None,
        pokedex_numbers: BTreeMap::new(),
        color: None,
        shape: None,
        egg_groups: Vec::new(),
        flavor_text: BTreeMap::new(),
        genus: None,
        generation: None,
        evolution_chain: None,
        held_items: BTreeMap::new(),
        moves: BTreeMap::new(),
        forms: Vec::new(),
    }
}

/// Overwrite the form-specific fields of a cloned record, keeping the
/// inherited species extras.
fn overlay_base(record: &mut PokemonRecord, base: PokemonRecord) {
    record.id = base.id;
    record.name = base.name;
    record.species = base.species;
    record.is_default = base.is_default;
    record.source_url = base.source_url;
    record.types = base.types;
    record.abilities = base.abilities;
    record.stats = base.stats;
    record.ev_yield = base.ev_yield;
    record.height = base.height;
    record.weight = base.weight;
    record.cries = base.cries;
    record.sprites = base.sprites;
}

/// Fill the species-level fields only the default record carries fresh
fn add_species_data(
    record: &mut PokemonRecord,
    ctx: &ParserContext,
    pokemon: &PokemonData,
    species: &SpeciesData,
    evolution_chain: Option<EvolutionNode>,
) -> Result<()> {
    let name = |reference: &Option<NamedRef>| reference.as_ref().map(|r| r.name.clone());

    record.base_experience = pokemon.base_experience;
    record.base_happiness = species.base_happiness;
    record.capture_rate = species.capture_rate;
    record.hatch_counter = species.hatch_counter;
    record.gender_rate = species.gender_rate;
    record.has_gender_differences = species.has_gender_differences;
    record.is_baby = species.is_baby;
    record.is_legendary = species.is_legendary;
    record.is_mythical = species.is_mythical;
    record.forms_switchable = species.forms_switchable;
    record.order = species.order;
    record.growth_rate = name(&species.growth_rate);
    record.habitat = name(&species.habitat);
    record.evolves_from_species = name(&species.evolves_from_species);
    record.pokedex_numbers = pokedex_numbers_for(ctx, species);
    record.color = name(&species.color);
    record.shape = name(&species.shape);
    record.egg_groups = species
        .egg_groups
        .iter()
        .map(|group| group.name.clone())
        .collect();
    record.flavor_text = flavor_by_version(&species.flavor_text_entries, ctx.index.target_versions());
    record.genus = species
        .genera
        .iter()
        .find(|genus| genus.language.name == "en")
        .map(|genus| genus.genus.clone());
    record.generation = name(&species.generation);
    record.evolution_chain = evolution_chain;
    record.held_items = group_held_items(&pokemon.held_items, ctx.index.target_versions());
    record.moves = group_moves(&pokemon.moves, ctx.index.target_version_groups()?);
    Ok(())
}

/// National plus the target generation's regional Pokédex numbers
fn pokedex_numbers_for(ctx: &ParserContext, species: &SpeciesData) -> BTreeMap<String, i64> {
    let regional = ctx.index.regional_dex();
    species
        .pokedex_numbers
        .iter()
        .filter(|entry| {
            entry.pokedex.name == "national" || Some(entry.pokedex.name.as_str()) == regional
        })
        .map(|entry| (entry.pokedex.name.clone(), entry.entry_number))
        .collect()
}

/// Held items restricted to the target generation's versions:
/// item → version → rarity.
fn group_held_items(
    held_items: &[HeldItem],
    target_versions: &HashSet<String>,
) -> BTreeMap<String, BTreeMap<String, i64>> {
    let mut grouped: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    for held in held_items {
        for detail in &held.version_details {
            if target_versions.contains(&detail.version.name) {
                grouped
                    .entry(held.item.name.clone())
                    .or_default()
                    .insert(detail.version.name.clone(), detail.rarity);
            }
        }
    }
    grouped
}

/// Learnable moves restricted to the target generation, grouped by learn
/// method. Entries teaching the same move at the same level across several
/// version groups are merged.
fn group_moves(
    moves: &[PokemonMove],
    target_groups: &[String],
) -> BTreeMap<String, Vec<LearnedMove>> {
    let targets: HashSet<&str> = target_groups.iter().map(String::as_str).collect();

    let mut grouped: BTreeMap<String, BTreeMap<(String, i64), BTreeSet<String>>> = BTreeMap::new();
    for entry in moves {
        for detail in &entry.version_group_details {
            if !targets.contains(detail.version_group.name.as_str()) {
                continue;
            }
            grouped
                .entry(detail.move_learn_method.name.clone())
                .or_default()
                .entry((entry.move_.name.clone(), detail.level_learned_at))
                .or_default()
                .insert(detail.version_group.name.clone());
        }
    }

    grouped
        .into_iter()
        .map(|(method, learned)| {
            let entries = learned
                .into_iter()
                .map(|((name, level), groups)| LearnedMove {
                    name,
                    level_learned_at: level,
                    version_groups: groups.into_iter().collect(),
                })
                .collect();
            (method, entries)
        })
        .collect()
}

/// Keep only the target generation's sub-tree of the versioned sprite blob
/// and drop top-level nulls.
fn filter_sprites(sprites: Option<&Value>, target_generation: u32) -> Value {
    let Some(Value::Object(map)) = sprites else {
        return json!({});
    };

    let mut filtered = Map::new();
    for (key, value) in map {
        if key == "versions" || value.is_null() {
            continue;
        }
        filtered.insert(key.clone(), value.clone());
    }
    if let Some(versions) = map.get("versions") {
        if let Ok(roman) = int_to_roman(target_generation) {
            let generation_key = format!("generation-{}", roman.to_lowercase());
            if let Some(generation_sprites) = versions.get(&generation_key) {
                filtered.insert("versions".to_string(), generation_sprites.clone());
            }
        }
    }
    Value::Object(filtered)
}

/// Overlay a form's front/back sprites onto an inherited sprite blob
fn overlay_form_sprites(sprites: &mut Value, form_sprites: &Value) {
    if !form_sprites.is_object() {
        return;
    }
    if !sprites.is_object() {
        *sprites = json!({});
    }
    if let Some(map) = sprites.as_object_mut() {
        for key in ["front_default", "front_shiny", "back_default", "back_shiny"] {
            map.insert(
                key.to_string(),
                form_sprites.get(key).cloned().unwrap_or(Value::Null),
            );
        }
    }
}

/// Apply scraped change bullets whose generation span covers the target
/// generation. Bullets apply in page order; later bullets win.
fn apply_scraped_changes(
    record: &mut PokemonRecord,
    changes: &[crate::core::scraper::ScrapedChange],
    target_generation: u32,
) {
    for item in changes {
        if !item.generations.contains(&target_generation) {
            continue;
        }
        debug!(species = %record.species, "applying scraped change");
        let change = &item.change;

        if let Some(ability) = &change.ability {
            if let Some(entry) = record.abilities.iter_mut().find(|entry| !entry.is_hidden) {
                entry.name = ability.clone();
            }
        }
        if let Some(stats) = &change.stats {
            for (stat, value) in stats {
                record.stats.insert(stat.clone(), i64::from(*value));
            }
        }
        if let Some(types) = &change.types {
            record.types = types.clone();
        }
        if let Some(base_experience) = change.base_experience {
            record.base_experience = Some(i64::from(base_experience));
        }
        if let Some(base_happiness) = change.base_happiness {
            record.base_happiness = Some(i64::from(base_happiness));
        }
        if let Some(capture_rate) = change.capture_rate {
            record.capture_rate = Some(i64::from(capture_rate));
        }
        if let Some(ev_yield) = &change.ev_yield {
            record.ev_yield = ev_yield.clone();
        }
    }
}

fn summary_of(record: &PokemonRecord) -> Value {
    json!({
        "name": record.name,
        "id": record.id,
        "sprite": record.sprites.get("front_default").cloned().unwrap_or(Value::Null),
    })
}
