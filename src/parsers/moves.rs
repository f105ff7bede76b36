//! Move parser
//!
//! Moves are the heaviest users of temporal projection: `past_values`
//! records accuracy, power, PP, effect chance, type and effect text as they
//! stood up to a given version group. All seven mutable fields are projected
//! together so one override event updates a consistent snapshot, then each
//! field collapses independently to a scalar or a per-version-group map.
//!
//! TM/HM machine assignment is resolved against the target generation's
//! version groups with one extra fetch per machine move.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::core::error::Result;
use crate::core::models::{
    MachineData, MachineVersionDetail, MoveData, MoveMetaData, NamedRef, PastMoveValues, Versioned,
};
use crate::core::output::write_json_file;
use crate::core::projector::{collapse_field, project_versioned};
use crate::core::runner::Outcome;
use crate::core::text::{english_verbose, flavor_by_version_group};

use super::{discover_by_generation, Parser, ParserContext};

/// The mutable fields replayed together through `past_values`
#[derive(Debug, Clone, PartialEq)]
struct MoveSnapshot {
    accuracy: Option<i32>,
    power: Option<i32>,
    pp: Option<i32>,
    effect_chance: Option<i32>,
    type_: Option<String>,
    effect: Option<String>,
    short_effect: Option<String>,
}

fn apply_past_values(snapshot: &mut MoveSnapshot, past: &PastMoveValues) {
    if past.accuracy.is_some() {
        snapshot.accuracy = past.accuracy;
    }
    if past.power.is_some() {
        snapshot.power = past.power;
    }
    if past.pp.is_some() {
        snapshot.pp = past.pp;
    }
    if past.effect_chance.is_some() {
        snapshot.effect_chance = past.effect_chance;
    }
    if let Some(type_) = &past.type_ {
        snapshot.type_ = Some(type_.name.clone());
    }
    if !past.effect_entries.is_empty() {
        let (effect, short_effect) = english_verbose(&past.effect_entries);
        if effect.is_some() {
            snapshot.effect = effect;
        }
        if short_effect.is_some() {
            snapshot.short_effect = short_effect;
        }
    }
}

#[derive(Debug, Serialize)]
struct StatChangeRecord {
    change: i32,
    stat: String,
}

/// Normalised move metadata with stable defaults when the API omits `meta`
#[derive(Debug, Default, Serialize)]
struct MetadataRecord {
    ailment: Option<String>,
    category: Option<String>,
    min_hits: Option<i32>,
    max_hits: Option<i32>,
    min_turns: Option<i32>,
    max_turns: Option<i32>,
    drain: i32,
    healing: i32,
    crit_rate: i32,
    ailment_chance: i32,
    flinch_chance: i32,
    stat_chance: i32,
}

impl From<&MoveMetaData> for MetadataRecord {
    fn from(meta: &MoveMetaData) -> Self {
        MetadataRecord {
            ailment: meta.ailment.as_ref().map(|r| r.name.clone()),
            category: meta.category.as_ref().map(|r| r.name.clone()),
            min_hits: meta.min_hits,
            max_hits: meta.max_hits,
            min_turns: meta.min_turns,
            max_turns: meta.max_turns,
            drain: meta.drain,
            healing: meta.healing,
            crit_rate: meta.crit_rate,
            ailment_chance: meta.ailment_chance,
            flinch_chance: meta.flinch_chance,
            stat_chance: meta.stat_chance,
        }
    }
}

/// The per-move output document
#[derive(Debug, Serialize)]
struct MoveRecord {
    id: i64,
    name: String,
    source_url: String,
    accuracy: Versioned<Option<i32>>,
    power: Versioned<Option<i32>>,
    pp: Versioned<Option<i32>>,
    priority: Option<i32>,
    damage_class: Option<String>,
    #[serde(rename = "type")]
    type_: Versioned<Option<String>>,
    target: Option<String>,
    generation: Option<String>,
    effect_chance: Versioned<Option<i32>>,
    effect: Versioned<Option<String>>,
    short_effect: Versioned<Option<String>>,
    flavor_text: BTreeMap<String, String>,
    stat_changes: Vec<StatChangeRecord>,
    machine: Option<String>,
    metadata: MetadataRecord,
}

pub struct MoveParser;

impl MoveParser {
    /// The TM/HM item teaching this move in the target generation, if any
    async fn machine_for_generation(
        ctx: &ParserContext,
        machines: &[MachineVersionDetail],
    ) -> Result<Option<String>> {
        let target_groups = ctx.index.target_version_groups()?;
        for entry in machines {
            if !target_groups.contains(&entry.version_group.name) {
                continue;
            }
            match ctx.client.get::<MachineData>(&entry.machine.url).await {
                Ok(machine) => return Ok(Some(machine.item.name)),
                Err(err) => {
                    warn!(url = %entry.machine.url, error = %err, "could not fetch machine data");
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Parser for MoveParser {
    fn name(&self) -> &'static str {
        "move"
    }

    fn entity_type(&self) -> &'static str {
        "Move"
    }

    async fn discover(&self, ctx: &ParserContext) -> Result<Vec<NamedRef>> {
        discover_by_generation(ctx, "move", |generation| &generation.moves).await
    }

    async fn process(&self, ctx: &ParserContext, reference: NamedRef) -> Result<Outcome> {
        let data: MoveData = ctx.client.get(&reference.url).await?;

        let (effect, short_effect) = english_verbose(&data.effect_entries);
        let current = MoveSnapshot {
            accuracy: data.accuracy,
            power: data.power,
            pp: data.pp,
            effect_chance: data.effect_chance,
            type_: data.type_.as_ref().map(|r| r.name.clone()),
            effect,
            short_effect,
        };
        let snapshots = project_versioned(
            &ctx.index,
            &current,
            &data.past_values,
            |past| past.version_group.name.as_str(),
            apply_past_values,
        )?;

        let machine = Self::machine_for_generation(ctx, &data.machines).await?;
        let record = MoveRecord {
            id: data.id,
            name: data.name.clone(),
            source_url: reference.url.clone(),
            accuracy: collapse_field(&snapshots, |s| s.accuracy),
            power: collapse_field(&snapshots, |s| s.power),
            pp: collapse_field(&snapshots, |s| s.pp),
            priority: data.priority,
            damage_class: data.damage_class.as_ref().map(|r| r.name.clone()),
            type_: collapse_field(&snapshots, |s| s.type_.clone()),
            target: data.target.as_ref().map(|r| r.name.clone()),
            generation: data.generation.as_ref().map(|r| r.name.clone()),
            effect_chance: collapse_field(&snapshots, |s| s.effect_chance),
            effect: collapse_field(&snapshots, |s| s.effect.clone()),
            short_effect: collapse_field(&snapshots, |s| s.short_effect.clone()),
            flavor_text: flavor_by_version_group(
                &data.flavor_text_entries,
                ctx.index.target_version_groups()?,
            ),
            stat_changes: data
                .stat_changes
                .iter()
                .map(|change| StatChangeRecord {
                    change: change.change,
                    stat: change.stat.name.clone(),
                })
                .collect(),
            machine,
            metadata: data
                .meta
                .as_ref()
                .map(MetadataRecord::from)
                .unwrap_or_default(),
        };
        write_json_file(Path::new(&ctx.config.output_dir_move), &data.name, &record)?;

        Ok(Outcome::Entry(serde_json::json!({
            "name": data.name,
            "id": data.id,
        })))
    }
}
