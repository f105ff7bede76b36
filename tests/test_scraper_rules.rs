//! Change-list extraction over a realistic Pokémon page: heading location,
//! bullet-by-bullet rule matching and generation-range annotation, end to
//! end through the public parsing entry point.

use pretty_assertions::assert_eq;

use pokedb::core::scraper::{parse_changes_html, EvYield};

// Trimmed-down rendition of a pokemondb.net page: navigation, data tables
// and unrelated lists around the changes section.
const BUTTERFREE_PAGE: &str = r#"
<!DOCTYPE html>
<html>
<body>
<nav><ul><li><a href="/pokedex/national">National Dex</a></li></ul></nav>
<main>
<h1>Butterfree</h1>
<h2>Pokédex data</h2>
<table><tr><td>National №</td><td>012</td></tr></table>
<h2>Evolution chart</h2>
<ul>
    <li>Caterpie evolves at level 7</li>
    <li>Metapod evolves at level 10</li>
</ul>
<h2>Butterfree changes</h2>
<ul>
    <li>Prior to <abbr title="Generation 6">Generation 6</abbr>, Butterfree did not have the
        <a href="/ability/tinted-lens">Tinted Lens</a> hidden ability.</li>
    <li>In <abbr title="Generations 1 to 5">Generations 1-5</abbr>, Butterfree has a base
        Special Attack of 80.</li>
    <li>In <abbr title="Generation 1">Generation 1</abbr>, Butterfree has a base Special
        stat of 80.</li>
    <li>In <abbr title="Generations 1 to 4">Generations 1-4</abbr>, Butterfree has a base
        experience yield of 160.</li>
    <li>In <abbr title="Generations 1 to 2">Generations 1-2</abbr>, Butterfree has 2
        Special Attack EVs.</li>
    <li>In <abbr title="Generations 3 to 5">Generations 3-5</abbr>, Butterfree&#39;s catch
        rate has a value of 45.</li>
</ul>
<h2>Name origin</h2>
<ul><li>butter + free</li></ul>
</main>
</body>
</html>
"#;

#[test]
fn full_page_yields_every_recognised_bullet_in_page_order() {
    let changes = parse_changes_html("butterfree", BUTTERFREE_PAGE);
    assert_eq!(changes.len(), 6);

    assert_eq!(changes[0].generations, vec![6]);
    assert_eq!(changes[0].change.ability.as_deref(), Some("tinted lens"));

    assert_eq!(changes[1].generations, vec![1, 2, 3, 4, 5]);
    let stats = changes[1].change.stats.as_ref().unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats["special-attack"], 80);

    // The bare gen 1 Special stat expands into both modern halves.
    assert_eq!(changes[2].generations, vec![1]);
    let stats = changes[2].change.stats.as_ref().unwrap();
    assert_eq!(stats["special-attack"], 80);
    assert_eq!(stats["special-defense"], 80);

    assert_eq!(changes[3].change.base_experience, Some(160));

    assert_eq!(
        changes[4].change.ev_yield.as_deref(),
        Some(
            &[EvYield {
                effort: 2,
                stat: "special-attack".to_string()
            }][..]
        )
    );

    assert_eq!(changes[5].generations, vec![3, 4, 5]);
    assert_eq!(changes[5].change.capture_rate, Some(45));
}

#[test]
fn each_bullet_carries_exactly_one_field() {
    for change in parse_changes_html("butterfree", BUTTERFREE_PAGE) {
        let populated = usize::from(change.change.ability.is_some())
            + usize::from(change.change.types.is_some())
            + usize::from(change.change.base_experience.is_some())
            + usize::from(change.change.base_happiness.is_some())
            + usize::from(change.change.capture_rate.is_some())
            + usize::from(change.change.stats.is_some())
            + usize::from(change.change.ev_yield.is_some());
        assert_eq!(populated, 1);
    }
}

#[test]
fn other_lists_on_the_page_are_never_mistaken_for_changes() {
    // Strip the changes section out entirely; the evolution and name-origin
    // lists must not produce changes.
    let without_changes = BUTTERFREE_PAGE.replace("Butterfree changes", "Something else");
    assert!(parse_changes_html("butterfree", &without_changes).is_empty());
}

#[test]
fn heading_lookup_capitalises_the_api_name() {
    // API names arrive lowercase; page headings are capitalised.
    let page = r#"
        <h2>Nidoran changes</h2>
        <ul><li>In <abbr>Generation 1</abbr>, Nidoran has a base HP of 46.</li></ul>
    "#;
    let changes = parse_changes_html("nidoran", page);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change.stats.as_ref().unwrap()["hp"], 46);
}

#[test]
fn multi_type_bullet_collects_every_type_link() {
    let page = r#"
        <h2>Magnemite changes</h2>
        <ul>
            <li>In <abbr>Generation 1</abbr>, Magnemite is a pure
                <a class="type-icon itype electric" href="/type/electric">Electric</a>
                type, later gaining
                <a class="type-icon itype steel" href="/type/steel">Steel</a>.</li>
        </ul>
    "#;
    let changes = parse_changes_html("magnemite", page);
    assert_eq!(
        changes[0].change.types,
        Some(vec!["electric".to_string(), "steel".to_string()])
    );
}
