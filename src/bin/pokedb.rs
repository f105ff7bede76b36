//! pokedb CLI - generation snapshot builder
//!
//! Thin orchestration over the library: parse arguments, load configuration,
//! resolve the target generation, run the requested parsers and write the
//! top-level index.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use serde_json::Value;
use tracing::{error, info, warn};

use pokedb::core::{latest_generation, output, ApiClient, Config, GenerationIndex, Scraper};
use pokedb::parsers::{build_parser, run_parser, ParserContext, PARSER_NAMES};

/// Build generation-accurate Pokédex snapshots from PokéAPI with historical
/// accuracy.
#[derive(ClapParser, Debug)]
#[command(name = "pokedb")]
#[command(version = pokedb::version())]
#[command(about = "Parse Pokémon data from PokéAPI with historical accuracy")]
#[command(after_help = "EXAMPLES:
  # Parse all data for the latest generation
  pokedb --all

  # Parse specific resources for the latest generation
  pokedb ability move item

  # Parse all data for a specific historical generation
  pokedb --all --gen 3

  # Disable caching for a fresh parse
  pokedb --all --no-cache
")]
struct Cli {
    /// The name(s) of the parser to run (ability, item, move, pokemon)
    parsers: Vec<String>,

    /// Run all available parsers
    #[arg(long)]
    all: bool,

    /// Parse data for a specific generation (e.g. 3 for Generation III)
    #[arg(long)]
    gen: Option<u32>,

    /// Disable caching for the run (slower but ensures fresh data)
    #[arg(long)]
    no_cache: bool,

    /// Path to the configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Delete an existing output directory without prompting
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(err) = run(Cli::parse()).await {
        error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let selected = selected_parsers(&args)?;

    let mut config = Config::load(&args.config)?;
    if args.no_cache {
        info!("caching is disabled for this run");
        config.disable_caching();
    }

    let client = Arc::new(ApiClient::new(&config)?);
    let latest = latest_generation(&client, &config.api_base_url).await?;
    let target = match args.gen {
        Some(generation) if generation <= latest => generation,
        _ => latest,
    };
    let is_historical = target < latest;
    if is_historical {
        info!(target, "performing a historical parse, scraping for changes");
    }

    let index = Arc::new(GenerationIndex::load(&client, &config.api_base_url, target).await?);
    let run_config = config.for_generation(target);

    let top_level_dir = Path::new(&run_config.output_dir_ability)
        .parent()
        .map(Path::to_path_buf)
        .context("output directory has no parent")?;
    if top_level_dir.exists() && !confirm_overwrite(&top_level_dir, args.force)? {
        info!("operation cancelled");
        return Ok(());
    }

    let scraper = if is_historical {
        Some(Arc::new(Scraper::new(&config)?))
    } else {
        None
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(Arc::clone(&shutdown));

    let ctx = Arc::new(ParserContext {
        client,
        config: run_config,
        index: Arc::clone(&index),
        scraper,
    });

    info!(target, "parsing all data for generation {target}");
    let mut all_summaries: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for name in selected {
        let parser = build_parser(&name).context("unknown parser name")?;
        let summaries = run_parser(parser, Arc::clone(&ctx), Arc::clone(&shutdown))
            .await
            .with_context(|| format!("{name} parser failed"))?;
        all_summaries.extend(summaries);
        if shutdown.load(Ordering::SeqCst) {
            warn!("shutdown requested, skipping remaining parsers");
            break;
        }
    }

    output::write_index(
        &top_level_dir,
        target,
        index.target_version_groups()?,
        &all_summaries,
    )?;
    Ok(())
}

/// The registry names to run, in registry order
fn selected_parsers(args: &Cli) -> Result<Vec<String>> {
    if !args.all {
        if args.parsers.is_empty() {
            bail!("no parsers specified; use --all or provide a list of parsers");
        }
        for name in &args.parsers {
            if !PARSER_NAMES.contains(&name.as_str()) {
                bail!(
                    "unknown parser '{name}' (available: {})",
                    PARSER_NAMES.join(", ")
                );
            }
        }
    }
    Ok(PARSER_NAMES
        .iter()
        .filter(|name| args.all || args.parsers.iter().any(|chosen| chosen == *name))
        .map(|name| name.to_string())
        .collect())
}

/// Ask before deleting an existing output tree; `--force` skips the prompt.
fn confirm_overwrite(dir: &Path, force: bool) -> Result<bool> {
    if !force {
        print!("Directory '{}' already exists. Delete it? (y/n): ", dir.display());
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            return Ok(false);
        }
    }
    info!(dir = %dir.display(), "deleting existing output directory");
    std::fs::remove_dir_all(dir)?;
    Ok(true)
}

fn spawn_shutdown_listener(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            shutdown.store(true, Ordering::SeqCst);
        }
    });
}
