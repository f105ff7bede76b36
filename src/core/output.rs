//! Output files
//!
//! One JSON document per resource, plus a top-level `index.json` summarising
//! the run. Resource documents get their object keys rewritten from the
//! API's kebab-case to snake_case on the way out, so untyped subtrees match
//! the typed fields; the index is written as-is.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::core::error::Result;
use crate::core::text::kebab_keys_to_snake;

/// Serialise `data` to `<output_dir>/<name>.json`, creating the directory as
/// needed.
pub fn write_json_file(output_dir: &Path, name: &str, data: &impl Serialize) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let document = kebab_keys_to_snake(serde_json::to_value(data)?);
    let path = output_dir.join(format!("{name}.json"));
    fs::write(&path, serde_json::to_string_pretty(&document)?)?;
    Ok(path)
}

/// Write the top-level `index.json`: run metadata plus every non-empty
/// summary listing. Returns `None` (and warns) when there is nothing to
/// index.
pub fn write_index(
    output_dir: &Path,
    target_generation: u32,
    version_groups: &[String],
    summaries: &BTreeMap<String, Vec<Value>>,
) -> Result<Option<PathBuf>> {
    let populated: BTreeMap<&String, &Vec<Value>> = summaries
        .iter()
        .filter(|(_, entries)| !entries.is_empty())
        .collect();
    if populated.is_empty() {
        warn!("no summary data was generated, skipping index file");
        return Ok(None);
    }

    let counts: Map<String, Value> = populated
        .iter()
        .map(|(key, entries)| ((*key).clone(), json!(entries.len())))
        .collect();

    let mut index = Map::new();
    index.insert(
        "metadata".to_string(),
        json!({
            "generation": target_generation,
            "version_groups": version_groups,
            "createdAt": Utc::now().to_rfc3339(),
            "counts": counts,
        }),
    );
    for (key, entries) in populated {
        index.insert(key.clone(), json!(entries));
    }

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join("index.json");
    fs::write(&path, serde_json::to_string_pretty(&Value::Object(index))?)?;
    info!(path = %path.display(), "wrote top-level index");
    Ok(Some(path))
}
