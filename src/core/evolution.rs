//! Evolution chain resolution
//!
//! Evolution chains are nested species trees. Each branch is kept only when
//! the evolved species already existed in the target generation, which takes
//! one species fetch per branch; pruning a branch drops its whole subtree.
//!
//! Resolution is best effort: a chain that cannot be fetched or is missing
//! required fields is dropped with a warning rather than failing the
//! Pokémon record it belongs to.

use serde::Serialize;

use tracing::{debug, warn};

use crate::core::client::ApiClient;
use crate::core::error::{PokedbError, Result};
use crate::core::models::{
    id_from_url, ChainLink, EvolutionChainData, EvolutionDetailData, NamedRef, SpeciesData,
};

/// Flattened trigger conditions for one evolution step. Every field is
/// emitted, absent conditions as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvolutionDetails {
    pub item: Option<String>,
    pub trigger: Option<String>,
    pub gender: Option<i64>,
    pub held_item: Option<String>,
    pub known_move: Option<String>,
    pub known_move_type: Option<String>,
    pub location: Option<String>,
    pub min_level: Option<i64>,
    pub min_happiness: Option<i64>,
    pub min_beauty: Option<i64>,
    pub min_affection: Option<i64>,
    pub needs_overworld_rain: Option<bool>,
    pub party_species: Option<String>,
    pub party_type: Option<String>,
    pub relative_physical_stats: Option<i64>,
    pub time_of_day: Option<String>,
    pub trade_species: Option<String>,
    pub turn_upside_down: Option<bool>,
}

impl From<&EvolutionDetailData> for EvolutionDetails {
    fn from(details: &EvolutionDetailData) -> Self {
        let name = |reference: &Option<NamedRef>| reference.as_ref().map(|r| r.name.clone());
        EvolutionDetails {
            item: name(&details.item),
            trigger: name(&details.trigger),
            gender: details.gender,
            held_item: name(&details.held_item),
            known_move: name(&details.known_move),
            known_move_type: name(&details.known_move_type),
            location: name(&details.location),
            min_level: details.min_level,
            min_happiness: details.min_happiness,
            min_beauty: details.min_beauty,
            min_affection: details.min_affection,
            needs_overworld_rain: details.needs_overworld_rain,
            party_species: name(&details.party_species),
            party_type: name(&details.party_type),
            relative_physical_stats: details.relative_physical_stats,
            time_of_day: details.time_of_day.clone(),
            trade_species: details.trade_species.clone().map(|r| r.name),
            turn_upside_down: details.turn_upside_down,
        }
    }
}

/// One node of the pruned chain. The root carries no evolution details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionNode {
    pub species_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evolution_details: Option<EvolutionDetails>,
    pub evolves_to: Vec<EvolutionNode>,
}

/// Fetch a chain and prune branches introduced after `target_generation`.
/// Returns `None` when the chain cannot be resolved.
pub async fn resolve_chain(
    client: &ApiClient,
    chain_url: &str,
    target_generation: u32,
) -> Option<EvolutionNode> {
    let chain: EvolutionChainData = match client.get(chain_url).await {
        Ok(chain) => chain,
        Err(err) => {
            warn!(chain_url, error = %err, "could not fetch evolution chain");
            return None;
        }
    };
    match prune(client, &chain.chain, target_generation).await {
        Ok(node) => Some(node),
        Err(err) => {
            warn!(chain_url, error = %err, "could not resolve evolution chain");
            None
        }
    }
}

async fn prune(
    client: &ApiClient,
    link: &ChainLink,
    target_generation: u32,
) -> Result<EvolutionNode> {
    let mut evolves_to = Vec::new();
    for evolution in &link.evolves_to {
        let species: SpeciesData = client.get(&evolution.species.url).await?;
        let generation = species
            .generation
            .as_ref()
            .and_then(|generation| id_from_url(&generation.url))
            .ok_or_else(|| PokedbError::missing_field(&species.name, "generation"))?;
        if generation > target_generation {
            debug!(
                species = %evolution.species.name,
                generation,
                "pruning future evolution"
            );
            continue;
        }

        let details = evolution.evolution_details.first().map(EvolutionDetails::from);
        let mut node = Box::pin(prune(client, evolution, target_generation)).await?;
        node.evolution_details = Some(details.unwrap_or_default());
        evolves_to.push(node);
    }
    Ok(EvolutionNode {
        species_name: link.species.name.clone(),
        evolution_details: None,
        evolves_to,
    })
}
