//! PokéDB - generation-accurate Pokédex snapshots
//!
//! This library reconstructs how abilities, moves, items and Pokémon looked
//! in any given game generation, combining PokéAPI data with historical
//! change lists scraped from pokemondb.net, and writes the result as a tree
//! of JSON documents.
//!
//! # Architecture
//!
//! This crate follows the "Library-First" pattern:
//! - **lib.rs** (this file): Pure logic, no CLI concerns
//! - **bin/pokedb.rs**: Thin wrapper that calls the library
//!
//! The heavy lifting lives in two layers:
//! - `core`: API client, generation index, temporal projection, runner,
//!   scraper and output plumbing
//! - `parsers`: one parser per resource kind (ability, move, item, pokemon),
//!   all built on the same discover/process contract

pub mod core;
pub mod parsers;

pub use crate::core::{ApiClient, Config, GenerationIndex, PokedbError, Result};
pub use crate::parsers::{build_parser, Parser, ParserContext, PARSER_NAMES};

/// Returns the version of the pokedb library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
