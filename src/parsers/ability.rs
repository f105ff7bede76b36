//! Ability parser
//!
//! Abilities carry their own history in the API: `effect_changes` records
//! the effect text that was in force up to a given version group. The long
//! effect is projected per version group of the target generation; the short
//! effect is not tracked historically, so the latest text is kept as-is.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::error::Result;
use crate::core::models::{AbilityData, NamedRef, Versioned};
use crate::core::output::write_json_file;
use crate::core::projector::{collapse, project_versioned};
use crate::core::runner::Outcome;
use crate::core::text::{english_effect, english_verbose, flavor_by_version_group};

use super::{discover_by_generation, Parser, ParserContext};

/// The per-ability output document
#[derive(Debug, Serialize)]
struct AbilityRecord {
    id: i64,
    name: String,
    source_url: String,
    is_main_series: Option<bool>,
    effect: Versioned<Option<String>>,
    short_effect: Option<String>,
    flavor_text: BTreeMap<String, String>,
}

pub struct AbilityParser;

#[async_trait]
impl Parser for AbilityParser {
    fn name(&self) -> &'static str {
        "ability"
    }

    fn entity_type(&self) -> &'static str {
        "Ability"
    }

    async fn discover(&self, ctx: &ParserContext) -> Result<Vec<NamedRef>> {
        discover_by_generation(ctx, "ability", |generation| &generation.abilities).await
    }

    async fn process(&self, ctx: &ParserContext, reference: NamedRef) -> Result<Outcome> {
        let data: AbilityData = ctx.client.get(&reference.url).await?;

        let (current_effect, short_effect) = english_verbose(&data.effect_entries);
        let effect = if data.effect_changes.is_empty() {
            Versioned::Uniform(current_effect)
        } else {
            let snapshots = project_versioned(
                &ctx.index,
                &current_effect,
                &data.effect_changes,
                |change| change.version_group.name.as_str(),
                |state, change| {
                    if let Some(text) = english_effect(&change.effect_entries) {
                        *state = Some(text);
                    }
                },
            )?;
            collapse(snapshots)
        };

        let record = AbilityRecord {
            id: data.id,
            name: data.name.clone(),
            source_url: reference.url.clone(),
            is_main_series: data.is_main_series,
            effect,
            short_effect,
            flavor_text: flavor_by_version_group(
                &data.flavor_text_entries,
                ctx.index.target_version_groups()?,
            ),
        };
        write_json_file(Path::new(&ctx.config.output_dir_ability), &data.name, &record)?;

        Ok(Outcome::Entry(serde_json::json!({
            "name": data.name,
            "id": data.id,
        })))
    }
}
