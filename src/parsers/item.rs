//! Item parser
//!
//! Items have no generation listing, so discovery pulls the whole catalogue
//! from a single paginated endpoint and filters per item: an item belongs to
//! the run only when its `game_indices` place it in the target generation.
//! Items absent from the target generation are skipped, not errors.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::error::Result;
use crate::core::models::{id_from_url, ItemData, NamedRef, ResourceList};
use crate::core::output::write_json_file;
use crate::core::runner::Outcome;
use crate::core::text::{english_verbose, flavor_by_version_group};

use super::{Parser, ParserContext};

/// Page size large enough to cover the full item catalogue in one request
const CATALOGUE_LIMIT: u32 = 3000;

/// The per-item output document
#[derive(Debug, Serialize)]
struct ItemRecord {
    id: i64,
    name: String,
    source_url: String,
    cost: Option<i64>,
    fling_power: Option<i64>,
    fling_effect: Option<String>,
    attributes: Vec<String>,
    category: Option<String>,
    effect: Option<String>,
    short_effect: Option<String>,
    flavor_text: BTreeMap<String, String>,
    sprite: Option<String>,
}

pub struct ItemParser;

#[async_trait]
impl Parser for ItemParser {
    fn name(&self) -> &'static str {
        "item"
    }

    fn entity_type(&self) -> &'static str {
        "Item"
    }

    async fn discover(&self, ctx: &ParserContext) -> Result<Vec<NamedRef>> {
        let url = format!("{}item?limit={CATALOGUE_LIMIT}", ctx.config.api_base_url);
        let listing: ResourceList = ctx.client.get(&url).await?;
        Ok(listing.results)
    }

    async fn process(&self, ctx: &ParserContext, reference: NamedRef) -> Result<Outcome> {
        let data: ItemData = ctx.client.get(&reference.url).await?;

        // Placeholder entries carry no game indices at all.
        if data.game_indices.is_empty() {
            return Ok(Outcome::Skip);
        }
        let in_target_generation = data.game_indices.iter().any(|game_index| {
            id_from_url(&game_index.generation.url) == Some(ctx.index.target_generation())
        });
        if !in_target_generation {
            return Ok(Outcome::Skip);
        }

        let (effect, short_effect) = english_verbose(&data.effect_entries);
        let sprite = data.sprites.as_ref().and_then(|sprites| sprites.default.clone());
        let record = ItemRecord {
            id: data.id,
            name: data.name.clone(),
            source_url: reference.url.clone(),
            cost: data.cost,
            fling_power: data.fling_power,
            fling_effect: data.fling_effect.as_ref().map(|r| r.name.clone()),
            attributes: data
                .attributes
                .iter()
                .map(|attribute| attribute.name.clone())
                .collect(),
            category: data.category.as_ref().map(|r| r.name.clone()),
            effect,
            short_effect,
            flavor_text: flavor_by_version_group(
                &data.flavor_text_entries,
                ctx.index.target_version_groups()?,
            ),
            sprite: sprite.clone(),
        };
        write_json_file(Path::new(&ctx.config.output_dir_item), &data.name, &record)?;

        Ok(Outcome::Entry(serde_json::json!({
            "name": data.name,
            "id": data.id,
            "sprite": sprite,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::two_generation_context;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn item_payload(generations: &[u32]) -> Value {
        let game_indices: Vec<Value> = generations
            .iter()
            .map(|generation| {
                json!({
                    "generation": {
                        "name": format!("generation-{generation}"),
                        "url": format!("https://api.test/v2/generation/{generation}/")
                    }
                })
            })
            .collect();
        json!({
            "id": 17,
            "name": "potion",
            "cost": 300,
            "fling_power": 30,
            "fling_effect": null,
            "attributes": [{"name": "consumable", "url": ""}, {"name": "usable-in-battle", "url": ""}],
            "category": {"name": "healing", "url": ""},
            "effect_entries": [
                {
                    "effect": "Restores 20 HP.",
                    "short_effect": "Restores 20 HP.",
                    "language": {"name": "en", "url": ""}
                }
            ],
            "flavor_text_entries": [
                {
                    "text": "Restores HP by 20 points.",
                    "language": {"name": "en", "url": ""},
                    "version_group": {"name": "gold-silver", "url": ""}
                }
            ],
            "game_indices": game_indices,
            "sprites": {"default": "https://sprites.test/potion.png"}
        })
    }

    #[tokio::test]
    async fn items_present_in_target_generation_are_written() {
        let dir = tempdir().unwrap();
        let ctx = two_generation_context(
            dir.path(),
            vec![(
                "https://api.test/v2/item/17/".to_string(),
                item_payload(&[1, 2]),
            )],
        );

        let outcome = ItemParser
            .process(&ctx, NamedRef::new("potion", "https://api.test/v2/item/17/"))
            .await
            .unwrap();
        match outcome {
            Outcome::Entry(entry) => {
                assert_eq!(entry["id"], 17);
                assert_eq!(entry["sprite"], "https://sprites.test/potion.png");
            }
            other => panic!("expected an index entry, got {other:?}"),
        }

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("item/potion.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(written["category"], "healing");
        assert_eq!(written["attributes"][0], "consumable");
        // Item flavor text arrives under the "text" key.
        assert_eq!(written["flavor_text"]["gold_silver"], "Restores HP by 20 points.");
    }

    #[tokio::test]
    async fn items_outside_target_generation_are_skipped() {
        let dir = tempdir().unwrap();
        let ctx = two_generation_context(
            dir.path(),
            vec![(
                "https://api.test/v2/item/17/".to_string(),
                item_payload(&[1]),
            )],
        );

        let outcome = ItemParser
            .process(&ctx, NamedRef::new("potion", "https://api.test/v2/item/17/"))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Skip));
        assert!(!dir.path().join("item/potion.json").exists());
    }

    #[tokio::test]
    async fn items_without_game_indices_are_skipped() {
        let dir = tempdir().unwrap();
        let ctx = two_generation_context(
            dir.path(),
            vec![(
                "https://api.test/v2/item/17/".to_string(),
                item_payload(&[]),
            )],
        );

        let outcome = ItemParser
            .process(&ctx, NamedRef::new("potion", "https://api.test/v2/item/17/"))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Skip));
    }
}
