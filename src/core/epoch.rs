//! Generation index
//!
//! Derives the lookup structures every temporally-aware stage depends on:
//! generation → ordered version groups (oldest first), the inverse
//! version-group → generation map, generation → regional Pokédex name, and
//! the set of version names belonging to the target generation.
//!
//! Failure to build the index is a discovery error and aborts the run; no
//! meaningful partial work is possible without it.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::info;

use crate::core::client::ApiClient;
use crate::core::error::{PokedbError, Result};
use crate::core::models::{
    id_from_url, GenerationData, PokedexData, ResourceList, VersionGroupData,
};

/// Lookup structures for one target generation
#[derive(Debug, Clone)]
pub struct GenerationIndex {
    /// Generation → version-group names, oldest first
    version_groups: BTreeMap<u32, Vec<String>>,
    /// Inverse map: version-group name → owning generation
    group_generations: HashMap<String, u32>,
    /// Generation → main-series regional Pokédex name
    dex_names: HashMap<u32, String>,
    /// Version names belonging to the target generation
    target_versions: HashSet<String>,
    target_generation: u32,
}

impl GenerationIndex {
    /// Assemble an index from raw parts (tests and the loader both use this)
    pub fn from_parts(
        version_groups: BTreeMap<u32, Vec<String>>,
        dex_names: HashMap<u32, String>,
        target_versions: HashSet<String>,
        target_generation: u32,
    ) -> Result<Self> {
        if target_generation == 0 {
            return Err(PokedbError::contract("generations are numbered from 1"));
        }
        let mut group_generations = HashMap::new();
        for (generation, groups) in &version_groups {
            for group in groups {
                group_generations.insert(group.clone(), *generation);
            }
        }
        Ok(GenerationIndex {
            version_groups,
            group_generations,
            dex_names,
            target_versions,
            target_generation,
        })
    }

    /// Build the index from the remote API, covering generations
    /// `1..=target`.
    pub async fn load(client: &ApiClient, base_url: &str, target: u32) -> Result<Self> {
        info!(target, "gathering generation data");
        let listing: ResourceList = client
            .get(&format!("{base_url}generation/"))
            .await
            .map_err(|err| PokedbError::discovery(format!("could not list generations: {err}")))?;

        let mut version_groups: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        let mut target_versions = HashSet::new();

        for generation_ref in &listing.results {
            let Some(number) = id_from_url(&generation_ref.url) else {
                continue;
            };
            if number > target {
                continue;
            }
            let details: GenerationData = client.get(&generation_ref.url).await.map_err(|err| {
                PokedbError::discovery(format!("could not fetch generation {number}: {err}"))
            })?;
            let groups: Vec<String> = details
                .version_groups
                .iter()
                .map(|group| group.name.clone())
                .collect();

            // Version names are only needed for the target generation
            // (held-item and flavor-text filtering).
            if number == target {
                for group in &details.version_groups {
                    let group_data: VersionGroupData =
                        client.get(&group.url).await.map_err(|err| {
                            PokedbError::discovery(format!(
                                "could not fetch version group {}: {err}",
                                group.name
                            ))
                        })?;
                    for version in group_data.versions {
                        target_versions.insert(version.name);
                    }
                }
            }
            version_groups.insert(number, groups);
        }

        if !version_groups.contains_key(&target) {
            return Err(PokedbError::discovery(format!(
                "generation {target} not present in the API listing"
            )));
        }

        let dex_names = load_dex_map(client, base_url).await?;
        info!("finished gathering generation data");
        Self::from_parts(version_groups, dex_names, target_versions, target)
    }

    pub fn target_generation(&self) -> u32 {
        self.target_generation
    }

    /// Ordered version groups of the target generation. An empty list is a
    /// contract violation: every generation ships at least one version
    /// group.
    pub fn target_version_groups(&self) -> Result<&[String]> {
        let groups = self
            .version_groups
            .get(&self.target_generation)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if groups.is_empty() {
            return Err(PokedbError::contract(format!(
                "generation {} has no version groups",
                self.target_generation
            )));
        }
        Ok(groups)
    }

    /// The generation a version group belongs to; `None` for groups outside
    /// every indexed generation (treated as "introduced after the target").
    pub fn generation_of(&self, version_group: &str) -> Option<u32> {
        self.group_generations.get(version_group).copied()
    }

    /// Position of a version group within the target generation's ordered
    /// list.
    pub fn target_position(&self, version_group: &str) -> Option<usize> {
        self.version_groups
            .get(&self.target_generation)?
            .iter()
            .position(|name| name == version_group)
    }

    /// The target generation's main-series regional Pokédex name, if any
    pub fn regional_dex(&self) -> Option<&str> {
        self.dex_names.get(&self.target_generation).map(String::as_str)
    }

    /// Version names of the target generation
    pub fn target_versions(&self) -> &HashSet<String> {
        &self.target_versions
    }
}

/// The latest generation number known to the API
pub async fn latest_generation(client: &ApiClient, base_url: &str) -> Result<u32> {
    let listing: ResourceList = client
        .get(&format!("{base_url}generation/"))
        .await
        .map_err(|err| PokedbError::discovery(format!("could not list generations: {err}")))?;
    listing
        .results
        .iter()
        .filter_map(|generation| id_from_url(&generation.url))
        .max()
        .ok_or_else(|| PokedbError::discovery("no generations found in API response"))
}

/// Map each generation to its main-series regional Pokédex name, keyed by
/// the generation of the dex's first version group.
async fn load_dex_map(client: &ApiClient, base_url: &str) -> Result<HashMap<u32, String>> {
    let listing: ResourceList = client
        .get(&format!("{base_url}pokedex?limit=100"))
        .await
        .map_err(|err| PokedbError::discovery(format!("could not list pokedexes: {err}")))?;
    if listing.results.is_empty() {
        return Err(PokedbError::discovery("no pokedexes found in API response"));
    }

    let mut dex_names = HashMap::new();
    for dex_ref in &listing.results {
        let dex: PokedexData = client.get(&dex_ref.url).await.map_err(|err| {
            PokedbError::discovery(format!("could not fetch pokedex {}: {err}", dex_ref.name))
        })?;
        if !dex.is_main_series {
            continue;
        }
        let Some(first_group) = dex.version_groups.first() else {
            continue;
        };
        let group: VersionGroupData = client.get(&first_group.url).await.map_err(|err| {
            PokedbError::discovery(format!(
                "could not fetch version group {}: {err}",
                first_group.name
            ))
        })?;
        let Some(generation) = id_from_url(&group.generation.url) else {
            continue;
        };
        // First main-series dex wins for each generation.
        dex_names.entry(generation).or_insert(dex.name);
    }
    Ok(dex_names)
}
