//! Resource parsers
//!
//! One parser per resource kind, all built on the same contract: `discover`
//! lists every resource reference relevant to the run, `process` turns one
//! reference into output files plus a summary outcome. The shared
//! [`run_parser`] pipeline fans `process` calls out across the worker pool
//! and assembles the per-kind summary listings.
//!
//! - `ability`: effect texts with generation-specific effect changes
//! - `moves`: stats and texts with `past_values` projection per version group
//! - `item`: flat catalogue filtered by generation game indices
//! - `pokemon`: species with varieties, transformations, cosmetic forms,
//!   evolution chains and scraped history

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::core::client::ApiClient;
use crate::core::config::Config;
use crate::core::epoch::GenerationIndex;
use crate::core::error::Result;
use crate::core::models::{GenerationData, NamedRef};
use crate::core::runner::{run_jobs, Job, Outcome, RunReport};
use crate::core::scraper::Scraper;

pub mod ability;
pub mod item;
pub mod moves;
pub mod pokemon;

pub use ability::AbilityParser;
pub use item::ItemParser;
pub use moves::MoveParser;
pub use pokemon::PokemonParser;

/// All registered parser names, in run order
pub const PARSER_NAMES: [&str; 4] = ["ability", "move", "item", "pokemon"];

/// Everything a parser needs for one run
pub struct ParserContext {
    pub client: Arc<ApiClient>,
    /// Run configuration with output directories already resolved for the
    /// target generation
    pub config: Config,
    pub index: Arc<GenerationIndex>,
    /// Present only for historical runs (target older than the latest
    /// generation)
    pub scraper: Option<Arc<Scraper>>,
}

/// The discover/process contract every resource parser implements
#[async_trait]
pub trait Parser: Send + Sync {
    /// Registry name and summary key ("ability", "move", ...)
    fn name(&self) -> &'static str;

    /// Human-readable kind for logging ("Ability", "Move", ...)
    fn entity_type(&self) -> &'static str;

    /// List every resource reference this run should process
    async fn discover(&self, ctx: &ParserContext) -> Result<Vec<NamedRef>>;

    /// Process one resource: fetch, transform, write, summarise
    async fn process(&self, ctx: &ParserContext, reference: NamedRef) -> Result<Outcome>;
}

/// Look a parser up by its registry name
pub fn build_parser(name: &str) -> Option<Arc<dyn Parser>> {
    match name {
        "ability" => Some(Arc::new(AbilityParser)),
        "move" => Some(Arc::new(MoveParser)),
        "item" => Some(Arc::new(ItemParser)),
        "pokemon" => Some(Arc::new(PokemonParser)),
        _ => None,
    }
}

/// Run one parser end to end and return its summary listings, keyed by
/// summary name. Flat parsers yield a single key; the species parser yields
/// one per category.
pub async fn run_parser(
    parser: Arc<dyn Parser>,
    ctx: Arc<ParserContext>,
    shutdown: Arc<AtomicBool>,
) -> Result<BTreeMap<String, Vec<Value>>> {
    info!("--- Running {} parser ---", parser.entity_type());

    let references = parser.discover(ctx.as_ref()).await?;
    if references.is_empty() {
        warn!("no {}s to process", parser.entity_type().to_lowercase());
        return Ok(BTreeMap::new());
    }
    info!(
        count = references.len(),
        "starting concurrent {} processing",
        parser.entity_type().to_lowercase()
    );

    let jobs: Vec<Job<NamedRef>> = references
        .into_iter()
        .map(|reference| Job::new(reference.name.clone(), reference))
        .collect();

    let workers = ctx.config.max_workers;
    let report = {
        let parser = Arc::clone(&parser);
        let ctx = Arc::clone(&ctx);
        run_jobs(jobs, workers, shutdown, move |job: Job<NamedRef>| {
            let parser = Arc::clone(&parser);
            let ctx = Arc::clone(&ctx);
            async move { parser.process(ctx.as_ref(), job.payload).await }
        })
        .await
    };

    report_failures(&report);
    info!(
        processed = report.processed,
        skipped = report.skipped,
        "{} processing complete",
        parser.entity_type()
    );

    let mut summaries = BTreeMap::new();
    if !report.entries.is_empty() {
        summaries.insert(parser.name().to_string(), sort_by_id(report.entries));
    }
    for (category, entries) in report.categorized {
        summaries.insert(category, sort_by_id(entries));
    }
    Ok(summaries)
}

fn report_failures(report: &RunReport) {
    if report.failures.is_empty() {
        return;
    }
    warn!(
        count = report.failures.len(),
        "errors occurred during processing"
    );
    for failure in &report.failures {
        error!(name = %failure.name, "  - {}", failure.error);
    }
}

/// Order summary entries by their numeric id
fn sort_by_id(mut entries: Vec<Value>) -> Vec<Value> {
    entries.sort_by_key(|entry| entry.get("id").and_then(Value::as_i64).unwrap_or(0));
    entries
}

/// Collect resource references introduced in generations `1..=target`.
/// A generation that cannot be fetched is logged and skipped.
pub(crate) async fn discover_by_generation(
    ctx: &ParserContext,
    kind: &str,
    pick: impl Fn(&GenerationData) -> &[NamedRef],
) -> Result<Vec<NamedRef>> {
    let target = ctx.index.target_generation();
    info!("collecting all {kind}s up to generation {target}");

    let mut references = Vec::new();
    for generation in 1..=target {
        let url = format!("{}generation/{generation}", ctx.config.api_base_url);
        match ctx.client.get::<GenerationData>(&url).await {
            Ok(data) => references.extend_from_slice(pick(&data)),
            Err(err) => {
                error!(generation, error = %err, "failed to fetch {kind} data");
            }
        }
    }
    Ok(references)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_covers_all_names() {
        for name in PARSER_NAMES {
            let parser = build_parser(name).unwrap();
            assert_eq!(parser.name(), name);
        }
        assert!(build_parser("berry").is_none());
    }

    #[test]
    fn summaries_sorted_by_id() {
        let entries = vec![
            json!({"name": "ivysaur", "id": 2}),
            json!({"name": "bulbasaur", "id": 1}),
            json!({"name": "missing-id"}),
        ];
        let sorted = sort_by_id(entries);
        assert_eq!(sorted[0]["name"], "missing-id");
        assert_eq!(sorted[1]["id"], 1);
        assert_eq!(sorted[2]["id"], 2);
    }
}
