//! Temporal projection
//!
//! Reconstructs the value every mutable field held in each version group of
//! the target generation by chronologically replaying override events over
//! the entity's current (latest-known) state.
//!
//! Replay rules, per target version group:
//!
//! - events from strictly earlier generations always apply (the change was
//!   already in effect when the target generation shipped);
//! - events tagged with a version group of the target generation itself
//!   apply only to groups at or before that version group in the
//!   generation's release order. Such an override records values that were
//!   effective up through its version group, so later groups of the same
//!   generation already use the newer values;
//! - events from later generations, or tagged with a version group no
//!   indexed generation owns, never apply.
//!
//! Candidates are replayed sorted by owning generation, ties broken by
//! source array order. The projection is a pure function of its inputs:
//! identical inputs always produce identical snapshots.

use std::collections::BTreeMap;

use crate::core::epoch::GenerationIndex;
use crate::core::error::Result;
use crate::core::models::Versioned;

/// Project `current` through `events` for every version group of the target
/// generation. Returns `(version_group, snapshot)` pairs in release order.
///
/// `version_group_of` names the version group an event is tagged with;
/// `apply` overwrites only the fields the event carries.
pub fn project_versioned<S, E>(
    index: &GenerationIndex,
    current: &S,
    events: &[E],
    version_group_of: impl Fn(&E) -> &str,
    mut apply: impl FnMut(&mut S, &E),
) -> Result<Vec<(String, S)>>
where
    S: Clone,
{
    let target = index.target_generation();
    let groups = index.target_version_groups()?;

    // Events mapped into the indexed timeline, future/unknown ones dropped.
    let mut candidates: Vec<(u32, &E)> = events
        .iter()
        .filter_map(|event| {
            let generation = index.generation_of(version_group_of(event))?;
            (generation <= target).then_some((generation, event))
        })
        .collect();
    candidates.sort_by_key(|(generation, _)| *generation);

    let mut snapshots = Vec::with_capacity(groups.len());
    for (position, group) in groups.iter().enumerate() {
        let mut snapshot = current.clone();
        for &(generation, event) in &candidates {
            let applies = generation < target
                || index
                    .target_position(version_group_of(event))
                    .is_some_and(|event_position| event_position >= position);
            if applies {
                apply(&mut snapshot, event);
            }
        }
        snapshots.push((group.clone(), snapshot));
    }
    Ok(snapshots)
}

/// Collapse per-version-group values into the output field shape: a scalar
/// when every version group agrees, a version-group-keyed map otherwise.
pub fn collapse<T>(values: Vec<(String, T)>) -> Versioned<T>
where
    T: PartialEq,
{
    let uniform = values
        .split_first()
        .is_some_and(|(first, rest)| rest.iter().all(|(_, value)| *value == first.1));
    if uniform {
        match values.into_iter().next() {
            Some((_, value)) => Versioned::Uniform(value),
            None => Versioned::ByVersionGroup(BTreeMap::new()),
        }
    } else {
        Versioned::ByVersionGroup(values.into_iter().collect::<BTreeMap<_, _>>())
    }
}

/// Collapse a single field out of a list of full snapshots
pub fn collapse_field<S, T>(
    snapshots: &[(String, S)],
    field: impl Fn(&S) -> T,
) -> Versioned<T>
where
    T: PartialEq,
{
    collapse(
        snapshots
            .iter()
            .map(|(group, snapshot)| (group.clone(), field(snapshot)))
            .collect(),
    )
}
