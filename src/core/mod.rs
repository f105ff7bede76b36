//! Core module for the PokéDB snapshot engine
//!
//! This module provides the shared infrastructure every parser builds on.
//!
//! # Architecture
//!
//! - `models`: Typed API payloads and output field shapes
//! - `error`: Error types using thiserror
//! - `config`: Run configuration loaded from `config.json`
//! - `client`: Cached, retrying API client behind a `Transport` seam
//! - `epoch`: Generation index (version groups, regional dexes, versions)
//! - `projector`: Temporal projection of override events per version group
//! - `runner`: Concurrent fan-out of per-resource jobs
//! - `scraper`: PokemonDB.net change-log scraper
//! - `evolution`: Evolution chain fetching and generation pruning
//! - `output`: Per-resource JSON documents and the top-level index
//! - `text`: English-entry selection, numerals, key normalisation

pub mod client;
pub mod config;
pub mod epoch;
pub mod error;
pub mod evolution;
pub mod models;
pub mod output;
pub mod projector;
pub mod runner;
pub mod scraper;
pub mod text;

// Re-export commonly used types
pub use client::{ApiClient, HttpTransport, Transport};
pub use config::Config;
pub use epoch::{latest_generation, GenerationIndex};
pub use error::{PokedbError, Result};
pub use evolution::{resolve_chain, EvolutionNode};
pub use models::{NamedRef, ResourceList, Versioned};
pub use projector::{collapse, collapse_field, project_versioned};
pub use runner::{run_jobs, Job, Outcome, RunReport};
pub use scraper::{ScrapedChange, ScrapedChanges, Scraper};
