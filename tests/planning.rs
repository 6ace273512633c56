mod common;

use common::*;
use sievex::core::collection::IndexedCollection;
use sievex::core::error::ErrorKind;
use sievex::index::hash::HashIndex;
use sievex::index::navigable::NavigableIndex;
use sievex::index::standing::StandingQueryIndex;
use sievex::query::ast::Query;
use sievex::query::options::{Deduplication, IndexHint, QueryOptions};
use sievex::search::plan::PlanStep;

fn indexed() -> IndexedCollection<Car> {
    let mut collection = IndexedCollection::new();
    collection.add_all(cars()).unwrap();
    for index in [HashIndex::on(&model()), HashIndex::on(&manufacturer()), HashIndex::on(&color())] {
        collection.add_index(index, &QueryOptions::new()).unwrap();
    }
    collection.add_index(NavigableIndex::on(&price()), &QueryOptions::new()).unwrap();
    collection
}

#[test]
fn most_selective_child_drives_an_and() {
    let collection = indexed();
    // Six Hondas, two Civics: the Civic leaf must be iterated first whatever the order
    for q in [
        Query::equal(&manufacturer(), "Honda") & Query::equal(&model(), "Civic"),
        Query::equal(&model(), "Civic") & Query::equal(&manufacturer(), "Honda"),
    ] {
        let set = collection.retrieve(&q, &QueryOptions::new()).unwrap();
        let plan = set.explain();
        assert_eq!(plan.step, PlanStep::Intersection);
        assert_eq!(plan.children[0].merge_cost, 2);
        assert_eq!(plan.children[1].merge_cost, 6);
        assert!(matches!(&plan.children[0].step, PlanStep::Index { index, .. } if index == "hash:model"));
        assert_eq!(set.size(), 2);
    }
}

#[test]
fn scanned_children_only_filter() {
    let collection = indexed();
    let q = Query::equal(&doors(), 2) & Query::equal(&manufacturer(), "Ford");
    let set = collection.retrieve(&q, &QueryOptions::new()).unwrap();
    let plan = set.explain();
    assert!(matches!(plan.children[0].step, PlanStep::Index { .. }));
    assert!(matches!(plan.children[1].step, PlanStep::Scan { .. }));
    let expected = cars().iter().filter(|c| c.doors == 2 && c.manufacturer == "Ford").count();
    assert_eq!(set.size(), expected);
}

#[test]
fn or_duplicates_depend_on_deduplication() {
    let collection = indexed();
    // Both Civics are Hondas, so they match both branches
    let q = Query::equal(&model(), "Civic") | Query::equal(&manufacturer(), "Honda");

    let plain = collection.retrieve(&q, &QueryOptions::new()).unwrap();
    assert_eq!(plain.size(), 8);
    assert_eq!(plain.iter().filter(|c| c.model == "Civic").count(), 4);

    let logical = collection
        .retrieve(&q, &QueryOptions::new().with_deduplication(Deduplication::Logical))
        .unwrap();
    assert_eq!(logical.size(), 6);
    assert_eq!(logical.explain().step, PlanStep::Union { deduplicated: true });

    let materialized = collection
        .retrieve(&q, &QueryOptions::new().with_deduplication(Deduplication::Materialize))
        .unwrap();
    assert_eq!(materialized.size(), 6);
}

#[test]
fn repeated_results_come_only_from_the_root_or() {
    let mut collection = indexed();
    let civic_or_honda = Query::equal(&model(), "Civic") | Query::equal(&manufacturer(), "Honda");
    collection
        .add_index(StandingQueryIndex::named("civic-or-honda", civic_or_honda.clone()), &QueryOptions::new())
        .unwrap();

    // The standing index must not collapse the per-branch repeats of a root Or
    let plain = collection.retrieve(&civic_or_honda, &QueryOptions::new()).unwrap();
    assert_eq!(plain.size(), 8);
    assert_eq!(plain.explain().step, PlanStep::Union { deduplicated: false });
    let logical = collection
        .retrieve(&civic_or_honda, &QueryOptions::new().with_deduplication(Deduplication::Logical))
        .unwrap();
    assert_eq!(logical.size(), 6);
    assert_eq!(logical.explain().indexes_used(), vec!["civic-or-honda"]);

    // Below the root the Or is a set, whichever side of the And drives
    for q in [
        civic_or_honda.clone() & Query::equal(&color(), "white"),
        civic_or_honda.clone() & Query::has(&color()),
        Query::has(&doors()) & civic_or_honda.clone(),
    ] {
        let set = collection.retrieve(&q, &QueryOptions::new()).unwrap();
        assert_eq!(set.iter().filter(|c| c.id == 3).count(), 1, "{}", q);
        let mut ids: Vec<u32> = set.iter().map(|c| c.id).collect();
        let found = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), found, "{}", q);
    }
}

#[test]
fn standing_query_answers_matching_subtree() {
    let mut collection = indexed();
    let red_fords = Query::equal(&manufacturer(), "Ford") & Query::equal(&color(), "red");
    collection.add_index(StandingQueryIndex::named("red-fords", red_fords.clone()), &QueryOptions::new()).unwrap();

    let set = collection.retrieve(&red_fords, &QueryOptions::new()).unwrap();
    assert_eq!(set.explain().indexes_used(), vec!["red-fords"]);
    let expected = cars().iter().filter(|c| c.manufacturer == "Ford" && c.color == "red").count();
    assert_eq!(set.size(), expected);
    drop(set);

    let nested = red_fords.clone() | Query::equal(&model(), "M6");
    let plan = collection.retrieve(&nested, &QueryOptions::new()).unwrap().explain();
    assert!(plan.indexes_used().contains(&"red-fords"));

    collection.add(Car { id: 40, color: "red", ..car(0) }).unwrap();
    assert_eq!(collection.retrieve(&red_fords, &QueryOptions::new()).unwrap().size(), expected + 1);
}

#[test]
fn hints_steer_and_restrict_index_choice() {
    let mut collection = indexed();
    collection.add_index(NavigableIndex::on(&model()), &QueryOptions::new()).unwrap();
    let q = Query::equal(&model(), "Civic");

    let default = collection.retrieve(&q, &QueryOptions::new()).unwrap().explain();
    assert_eq!(default.indexes_used(), vec!["hash:model"]);

    let prefer = QueryOptions::new().with_index_hint(IndexHint::Prefer(vec!["navigable:model".into()]));
    assert_eq!(collection.retrieve(&q, &prefer).unwrap().explain().indexes_used(), vec!["navigable:model"]);

    let force_none = QueryOptions::new().with_index_hint(IndexHint::Force(vec!["hash:color".into()]));
    let set = collection.retrieve(&q, &force_none).unwrap();
    assert!(set.explain().uses_scan());
    assert_eq!(set.size(), 2);
}

#[test]
fn construction_errors_surface_from_retrieve() {
    let collection = indexed();
    let err = collection.retrieve(&Query::equal(&price(), "cheap"), &QueryOptions::new()).err().unwrap();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);

    let err = collection.retrieve(&Query::starts_with(&doors(), "4"), &QueryOptions::new()).err().unwrap();
    assert_eq!(err.kind, ErrorKind::TypeMismatch);

    assert_eq!(Query::<Car>::and(Vec::new()).unwrap_err().kind, ErrorKind::InvalidQuery);
    let err = collection.retrieve(&Query::Or(Vec::new()), &QueryOptions::new()).err().unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidQuery);
}

#[test]
fn plans_serialize_for_diagnostics() {
    let collection = indexed();
    let q = Query::equal(&model(), "Civic") & !Query::equal(&color(), "red");
    let set = collection.retrieve(&q, &QueryOptions::new()).unwrap();
    let json = set.explain().to_json().unwrap();
    assert!(json.contains("hash:model"));
    assert!(json.contains("Exclude"));
    assert!(set.explain().to_string().contains("hash:color"));
}
