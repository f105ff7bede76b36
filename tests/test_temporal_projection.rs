//! End-to-end temporal projection scenarios against the public API:
//! a generation index built from parts, override events replayed per
//! version group, and per-field collapse into output shapes.

use std::collections::{BTreeMap, HashMap, HashSet};

use pretty_assertions::assert_eq;

use pokedb::core::epoch::GenerationIndex;
use pokedb::core::models::Versioned;
use pokedb::core::projector::{collapse_field, project_versioned};

#[derive(Debug, Clone, PartialEq)]
struct MoveState {
    power: Option<i32>,
    accuracy: Option<i32>,
    type_: String,
}

struct Override {
    version_group: &'static str,
    power: Option<i32>,
    type_: Option<&'static str>,
}

fn apply(state: &mut MoveState, event: &Override) {
    if event.power.is_some() {
        state.power = event.power;
    }
    if let Some(type_) = event.type_ {
        state.type_ = type_.to_string();
    }
}

fn index(groups: &[(u32, &[&str])], target: u32) -> GenerationIndex {
    let version_groups: BTreeMap<u32, Vec<String>> = groups
        .iter()
        .map(|(generation, names)| (*generation, names.iter().map(|n| n.to_string()).collect()))
        .collect();
    GenerationIndex::from_parts(version_groups, HashMap::new(), HashSet::new(), target).unwrap()
}

fn project(
    idx: &GenerationIndex,
    current: &MoveState,
    events: &[Override],
) -> Vec<(String, MoveState)> {
    project_versioned(idx, current, events, |e| e.version_group, apply).unwrap()
}

#[test]
fn historical_target_sees_only_changes_already_in_effect() {
    // Base power 100, overridden to 40 from gen 2 and to 60 from gen 4.
    let current = MoveState {
        power: Some(100),
        accuracy: Some(95),
        type_: "normal".to_string(),
    };
    let events = [
        Override {
            version_group: "gen2-vg",
            power: Some(40),
            type_: None,
        },
        Override {
            version_group: "gen4-vg",
            power: Some(60),
            type_: None,
        },
    ];
    let timeline: &[(u32, &[&str])] = &[
        (1, &["gen1-vg"]),
        (2, &["gen2-vg"]),
        (3, &["gen3-vg"]),
        (4, &["gen4-vg"]),
        (5, &["gen5-vg"]),
    ];

    // Targeting gen 3: the gen 2 override is in effect, the gen 4 one is
    // still in the future.
    let snapshots = project(&index(timeline, 3), &current, &events);
    assert_eq!(collapse_field(&snapshots, |s| s.power), Versioned::Uniform(Some(40)));

    // Targeting gen 5: both overrides replay in order, the gen 4 one wins.
    let snapshots = project(&index(timeline, 5), &current, &events);
    assert_eq!(collapse_field(&snapshots, |s| s.power), Versioned::Uniform(Some(60)));

    // Targeting gen 1: before every recorded change, the base value holds.
    let snapshots = project(&index(timeline, 1), &current, &events);
    assert_eq!(collapse_field(&snapshots, |s| s.power), Versioned::Uniform(Some(100)));
}

#[test]
fn override_within_target_generation_splits_the_field() {
    let current = MoveState {
        power: Some(100),
        accuracy: Some(95),
        type_: "normal".to_string(),
    };
    let events = [Override {
        version_group: "vg-b",
        power: Some(70),
        type_: None,
    }];
    let idx = index(&[(1, &["vg-a"]), (2, &["vg-b", "vg-c"])], 2);

    let snapshots = project(&idx, &current, &events);

    let expected: BTreeMap<String, Option<i32>> = [
        ("vg-b".to_string(), Some(70)),
        ("vg-c".to_string(), Some(100)),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        collapse_field(&snapshots, |s| s.power),
        Versioned::ByVersionGroup(expected)
    );
    // Fields no event touched stay scalar.
    assert_eq!(
        collapse_field(&snapshots, |s| s.accuracy),
        Versioned::Uniform(Some(95))
    );
    assert_eq!(
        collapse_field(&snapshots, |s| s.type_.clone()),
        Versioned::Uniform("normal".to_string())
    );
}

#[test]
fn fields_replay_together_as_one_snapshot() {
    // One event changes type, a later one changes power. Only the event
    // that is already in effect at the target may touch the snapshot.
    let current = MoveState {
        power: Some(40),
        accuracy: None,
        type_: "flying".to_string(),
    };
    let events = [
        Override {
            version_group: "gen1-vg",
            power: None,
            type_: Some("normal"),
        },
        Override {
            version_group: "gen3-vg",
            power: Some(35),
            type_: None,
        },
    ];
    let timeline: &[(u32, &[&str])] = &[
        (1, &["gen1-vg"]),
        (2, &["gen2-vg"]),
        (3, &["gen3-vg"]),
        (4, &["gen4-vg"]),
    ];

    let snapshots = project(&index(timeline, 2), &current, &events);
    let (_, state) = &snapshots[0];
    // Gen 2 sits between the two overrides: the type change already
    // happened, the power change has not.
    assert_eq!(state.type_, "normal");
    assert_eq!(state.power, Some(40));
}

#[test]
fn unknown_and_future_version_groups_are_inert() {
    let current = MoveState {
        power: Some(100),
        accuracy: None,
        type_: "normal".to_string(),
    };
    let events = [
        Override {
            version_group: "not-indexed",
            power: Some(1),
            type_: None,
        },
        Override {
            version_group: "gen2-vg",
            power: Some(2),
            type_: None,
        },
    ];
    let idx = index(&[(1, &["gen1-vg"]), (2, &["gen2-vg"])], 1);

    let snapshots = project(&idx, &current, &events);
    assert_eq!(snapshots[0].1.power, Some(100));
}

#[test]
fn projection_output_is_stable_across_runs() {
    let current = MoveState {
        power: Some(100),
        accuracy: Some(95),
        type_: "normal".to_string(),
    };
    let events = [
        Override {
            version_group: "vg-a",
            power: Some(40),
            type_: Some("flying"),
        },
        Override {
            version_group: "vg-b",
            power: Some(70),
            type_: None,
        },
    ];
    let idx = index(&[(1, &["vg-a"]), (2, &["vg-b", "vg-c"])], 2);

    let first = project(&idx, &current, &events);
    let second = project(&idx, &current, &events);
    assert_eq!(first, second);
    // Snapshots come back in the generation's release order.
    assert_eq!(first[0].0, "vg-b");
    assert_eq!(first[1].0, "vg-c");
}
