//! PokemonDB.net change-log scraper
//!
//! PokéAPI carries no `past_values` for Pokémon records, so stat, type and
//! ability history has to come from the community-maintained change lists on
//! pokemondb.net. Each Pokémon page may end with an `<h2>{Name} changes</h2>`
//! heading followed by a `<ul>` of prose bullet points; every bullet carries
//! an `<abbr>` generation annotation and a sentence describing the old value.
//!
//! The sentences are matched against an ordered rule table keyed on
//! characteristic phrases. Scraping is best effort: a page that cannot be
//! fetched or parsed yields an empty change list, never an error.
//!
//! Results are cached as parsed JSON (keyed by page URL), separate from the
//! API response cache.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::client::{cache_path, fetch_with_retries, HttpTransport, Transport};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::text::parse_generation_range;

const PAGE_BASE: &str = "https://pokemondb.net/pokedex/";

lazy_static! {
    static ref HEADINGS: Regex = Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").expect("static regex");
    static ref FIRST_LIST: Regex = Regex::new(r"(?is)<ul[^>]*>(.*?)</ul>").expect("static regex");
    static ref LIST_ITEMS: Regex = Regex::new(r"(?is)<li[^>]*>(.*?)</li>").expect("static regex");
    static ref GEN_ABBR: Regex = Regex::new(r"(?is)<abbr[^>]*>(.*?)</abbr>").expect("static regex");
    static ref ABILITY_LINK: Regex =
        Regex::new(r#"(?is)<a[^>]*href="[^"]*/ability/[^"]*"[^>]*>(.*?)</a>"#)
            .expect("static regex");
    static ref TYPE_LINK: Regex =
        Regex::new(r#"(?is)<a[^>]*class="[^"]*\bitype\b[^"]*"[^>]*>(.*?)</a>"#)
            .expect("static regex");
    static ref TAG: Regex = Regex::new(r"<[^>]+>").expect("static regex");
    static ref STAT_VALUE: Regex = Regex::new(r"of (\d+)").expect("static regex");
    static ref SPECIAL_VALUE: Regex =
        Regex::new(r"base Special stat of (\d+)").expect("static regex");
    static ref EV_VALUE: Regex = Regex::new(r"has (\d+) ([\w\s]+) EV").expect("static regex");
}

/// One stat touched by an EV yield change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvYield {
    pub effort: u32,
    pub stat: String,
}

/// The fields one change bullet overrides. Only the populated field is
/// emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_experience: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_happiness: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<String, u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev_yield: Option<Vec<EvYield>>,
}

/// One change bullet: the generations the old values were in effect, plus
/// the values themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedChange {
    pub generations: Vec<u32>,
    pub change: ChangeSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    pub name: String,
    pub source: String,
}

/// All historical changes scraped for one Pokémon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedChanges {
    pub metadata: ScrapeMetadata,
    pub changes: Vec<ScrapedChange>,
}

impl ScrapedChanges {
    fn empty(name: &str, source: &str) -> Self {
        ScrapedChanges {
            metadata: ScrapeMetadata {
                name: name.to_string(),
                source: source.to_string(),
            },
            changes: Vec::new(),
        }
    }
}

/// Fetches and parses change lists, with its own response cache
pub struct Scraper {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    max_retries: u32,
    cache_dir: Option<PathBuf>,
    cache_ttl: Option<Duration>,
}

impl Scraper {
    pub fn new(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(
            transport,
            config.request_timeout(),
            config.max_retries,
            config.scraper_cache_dir.as_deref().map(PathBuf::from),
            config.cache_ttl(),
        )
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        timeout: Duration,
        max_retries: u32,
        cache_dir: Option<PathBuf>,
        cache_ttl: Option<Duration>,
    ) -> Result<Self> {
        if let Some(dir) = &cache_dir {
            fs::create_dir_all(dir)?;
        }
        Ok(Scraper {
            transport,
            timeout,
            max_retries,
            cache_dir,
            cache_ttl,
        })
    }

    /// Scrape the change list for one Pokémon. Fetch and parse problems
    /// degrade to an empty change list.
    pub async fn pokemon_changes(&self, name: &str) -> ScrapedChanges {
        let url = format!("{PAGE_BASE}{}", name.to_lowercase());

        if let Some(cached) = self.read_cache(&url) {
            debug!(name, "scraper cache hit");
            return cached;
        }

        let html =
            match fetch_with_retries(self.transport.as_ref(), &url, self.timeout, self.max_retries)
                .await
            {
                Ok(body) => body,
                Err(err) => {
                    warn!(name, error = %err, "scrape failed, continuing without changes");
                    return ScrapedChanges::empty(name, &url);
                }
            };

        let changes = parse_changes_html(name, &html);
        info!(name, count = changes.len(), "scraped changes");
        let result = ScrapedChanges {
            metadata: ScrapeMetadata {
                name: name.to_string(),
                source: url.clone(),
            },
            changes,
        };
        self.write_cache(&url, &result);
        result
    }

    fn read_cache(&self, url: &str) -> Option<ScrapedChanges> {
        let dir = self.cache_dir.as_deref()?;
        let ttl = self.cache_ttl?;
        let path = cache_path(dir, url);
        let modified = fs::metadata(&path).and_then(|meta| meta.modified()).ok()?;
        if modified.elapsed().ok()? >= ttl {
            return None;
        }
        let body = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&body).ok()
    }

    fn write_cache(&self, url: &str, result: &ScrapedChanges) {
        let Some(dir) = self.cache_dir.as_deref() else {
            return;
        };
        // A missing or zero TTL means no entry could ever be served back.
        if !self.cache_ttl.is_some_and(|ttl| !ttl.is_zero()) {
            return;
        }
        let path = cache_path(dir, url);
        match serde_json::to_string_pretty(result) {
            Ok(body) => {
                if let Err(err) = fs::write(&path, body) {
                    warn!(path = %path.display(), error = %err, "could not write scraper cache");
                }
            }
            Err(err) => warn!(error = %err, "could not serialise scraped changes"),
        }
    }
}

// ============================================================================
// HTML parsing
// ============================================================================

/// Ordered rule table. The first phrase found in a bullet's text selects the
/// handler; a handler that extracts nothing falls through to later rules.
#[derive(Debug, Clone, Copy)]
enum Rule {
    Ability,
    Types,
    Simple(&'static str),
    EvYield,
    Special,
    BaseStat(&'static str),
}

const RULES: [(&str, Rule); 13] = [
    ("ability", Rule::Ability),
    ("type", Rule::Types),
    ("base experience yield", Rule::Simple("base_experience")),
    ("base Friendship value", Rule::Simple("base_happiness")),
    ("catch rate", Rule::Simple("capture_rate")),
    ("EVs", Rule::EvYield),
    ("base Special stat", Rule::Special),
    ("base HP", Rule::BaseStat("hp")),
    ("base Attack", Rule::BaseStat("attack")),
    ("base Defense", Rule::BaseStat("defense")),
    ("base Special Attack", Rule::BaseStat("special-attack")),
    ("base Special Defense", Rule::BaseStat("special-defense")),
    ("base Speed", Rule::BaseStat("speed")),
];

/// Extract the change list from a Pokémon page. Missing sections and
/// unrecognised bullets produce an empty or partial list, never an error.
pub fn parse_changes_html(name: &str, html: &str) -> Vec<ScrapedChange> {
    let Some(list) = changes_list(name, html) else {
        debug!(name, "no changes section found");
        return Vec::new();
    };

    let mut changes = Vec::new();
    for item in LIST_ITEMS.captures_iter(list) {
        let fragment = &item[1];
        let text = strip_tags(fragment);

        let Some(abbr) = GEN_ABBR.captures(fragment) else {
            continue;
        };
        let Some(generations) = parse_generation_range(&strip_tags(&abbr[1])) else {
            continue;
        };

        let mut matched = false;
        for (phrase, rule) in RULES {
            if !text.contains(phrase) {
                continue;
            }
            if let Some(change) = apply_rule(rule, fragment, &text) {
                changes.push(ScrapedChange {
                    generations: generations.clone(),
                    change,
                });
                matched = true;
                break;
            }
        }
        if !matched {
            warn!(name, text = %text.trim(), "unrecognised change bullet");
        }
    }
    changes
}

/// The inner HTML of the `<ul>` following the `{Name} changes` heading
fn changes_list<'a>(name: &str, html: &'a str) -> Option<&'a str> {
    let needle = format!("{} changes", capitalize(name));
    let heading = HEADINGS
        .captures_iter(html)
        .find(|captures| strip_tags(&captures[1]).contains(&needle))?;
    let rest = &html[heading.get(0)?.end()..];
    Some(FIRST_LIST.captures(rest)?.get(1)?.as_str())
}

fn apply_rule(rule: Rule, fragment: &str, text: &str) -> Option<ChangeSet> {
    match rule {
        Rule::Ability => {
            let ability = ABILITY_LINK.captures(fragment)?;
            Some(ChangeSet {
                ability: Some(strip_tags(&ability[1]).trim().to_lowercase()),
                ..ChangeSet::default()
            })
        }
        Rule::Types => {
            let types: Vec<String> = TYPE_LINK
                .captures_iter(fragment)
                .map(|captures| strip_tags(&captures[1]).trim().to_lowercase())
                .collect();
            (!types.is_empty()).then(|| ChangeSet {
                types: Some(types),
                ..ChangeSet::default()
            })
        }
        Rule::Simple(field) => {
            let value = stat_value(text)?;
            let mut change = ChangeSet::default();
            match field {
                "base_experience" => change.base_experience = Some(value),
                "base_happiness" => change.base_happiness = Some(value),
                _ => change.capture_rate = Some(value),
            }
            Some(change)
        }
        Rule::EvYield => {
            let captures = EV_VALUE.captures(text)?;
            let effort: u32 = captures[1].parse().ok()?;
            let stat = ev_stat_name(captures[2].trim())?;
            Some(ChangeSet {
                ev_yield: Some(vec![EvYield {
                    effort,
                    stat: stat.to_string(),
                }]),
                ..ChangeSet::default()
            })
        }
        Rule::Special => {
            let value: u32 = SPECIAL_VALUE.captures(text)?[1].parse().ok()?;
            // Gen 1 had a single Special stat covering both later halves.
            let stats = BTreeMap::from([
                ("special-attack".to_string(), value),
                ("special-defense".to_string(), value),
            ]);
            Some(ChangeSet {
                stats: Some(stats),
                ..ChangeSet::default()
            })
        }
        Rule::BaseStat(stat) => {
            let value = stat_value(text)?;
            Some(ChangeSet {
                stats: Some(BTreeMap::from([(stat.to_string(), value)])),
                ..ChangeSet::default()
            })
        }
    }
}

fn stat_value(text: &str) -> Option<u32> {
    STAT_VALUE.captures(text)?[1].parse().ok()
}

fn ev_stat_name(raw: &str) -> Option<&'static str> {
    match raw.to_lowercase().as_str() {
        "hp" => Some("hp"),
        "attack" => Some("attack"),
        "defense" => Some("defense"),
        "special attack" => Some("special-attack"),
        "special defense" => Some("special-defense"),
        "speed" => Some("speed"),
        _ => None,
    }
}

/// Remove markup and decode the handful of entities the change lists use
fn strip_tags(fragment: &str) -> String {
    let text = TAG.replace_all(fragment, "");
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"
        <h1>Pikachu</h1>
        <h2>Evolution chart</h2>
        <ul><li>Not the changes list</li></ul>
        <h2>Pikachu changes</h2>
        <ul>
            <li>In <abbr title="Generation 1">Generation 1</abbr>, Pikachu has a base Special stat of 50.</li>
            <li>In <abbr>Generations 1-4</abbr>, Pikachu has a base experience yield of 82.</li>
            <li>In <abbr>Generations 1-5</abbr>, Pikachu has a base Defense of 30.</li>
            <li>Prior to <abbr>Generation 6</abbr>, Pikachu did not have the
                <a href="/ability/lightning-rod">Lightning Rod</a> hidden ability.</li>
        </ul>
    "#;

    #[test]
    fn changes_section_located_by_heading() {
        let changes = parse_changes_html("pikachu", PAGE);
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].generations, vec![1]);
        assert_eq!(changes[1].generations, vec![1, 2, 3, 4]);
    }

    #[test]
    fn special_stat_covers_both_halves() {
        let changes = parse_changes_html("pikachu", PAGE);
        let stats = changes[0].change.stats.as_ref().unwrap();
        assert_eq!(stats["special-attack"], 50);
        assert_eq!(stats["special-defense"], 50);
    }

    #[test]
    fn simple_and_base_stats_parsed() {
        let changes = parse_changes_html("pikachu", PAGE);
        assert_eq!(changes[1].change.base_experience, Some(82));
        let stats = changes[2].change.stats.as_ref().unwrap();
        assert_eq!(stats["defense"], 30);
    }

    #[test]
    fn ability_name_extracted_from_link() {
        let changes = parse_changes_html("pikachu", PAGE);
        assert_eq!(changes[3].change.ability.as_deref(), Some("lightning rod"));
    }

    #[test]
    fn type_links_extracted_in_order() {
        let page = r#"
            <h2>Clefairy changes</h2>
            <ul>
                <li>In <abbr>Generations 1-5</abbr>, Clefairy is
                    <a class="itype normal" href="/type/normal">Normal</a> type.</li>
            </ul>
        "#;
        let changes = parse_changes_html("clefairy", page);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change.types, Some(vec!["normal".to_string()]));
    }

    #[test]
    fn ev_yield_parsed_with_stat_mapping() {
        let page = r#"
            <h2>Mewtwo changes</h2>
            <ul>
                <li>In <abbr>Generations 1-2</abbr>, Mewtwo has 3 Special Attack EVs.</li>
            </ul>
        "#;
        let changes = parse_changes_html("mewtwo", page);
        let ev = changes[0].change.ev_yield.as_ref().unwrap();
        assert_eq!(
            ev[0],
            EvYield {
                effort: 3,
                stat: "special-attack".to_string()
            }
        );
    }

    #[test]
    fn missing_section_yields_no_changes() {
        let page = "<h1>Ditto</h1><h2>Evolution chart</h2><ul><li>x</li></ul>";
        assert!(parse_changes_html("ditto", page).is_empty());
    }

    #[test]
    fn bullets_without_generation_annotation_ignored() {
        let page = r#"
            <h2>Eevee changes</h2>
            <ul><li>Eevee has a base HP of 55.</li></ul>
        "#;
        assert!(parse_changes_html("eevee", page).is_empty());
    }

    #[test]
    fn unrecognised_bullets_are_skipped() {
        // The first bullet matches no rule phrase at all; it is dropped
        // without contributing a change.
        let page = r#"
            <h2>Jynx changes</h2>
            <ul>
                <li>In <abbr>Generation 1</abbr>, Jynx had a different colour scheme.</li>
                <li>In <abbr>Generation 1</abbr>, Jynx has a base Speed of 95.</li>
            </ul>
        "#;
        let changes = parse_changes_html("jynx", page);
        assert_eq!(changes.len(), 1);
        let stats = changes[0].change.stats.as_ref().unwrap();
        assert_eq!(stats["speed"], 95);
    }

    #[test]
    fn unmatched_phrase_falls_through_rules() {
        // "type" matches first but extracts nothing (no itype links); the
        // bullet still resolves through the base stat rule.
        let page = r#"
            <h2>Onix changes</h2>
            <ul>
                <li>In <abbr>Generation 1</abbr>, this type of Onix has a base Attack of 45.</li>
            </ul>
        "#;
        let changes = parse_changes_html("onix", page);
        assert_eq!(changes.len(), 1);
        let stats = changes[0].change.stats.as_ref().unwrap();
        assert_eq!(stats["attack"], 45);
    }
}
