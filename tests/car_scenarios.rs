mod common;

use common::*;
use sievex::core::collection::IndexedCollection;
use sievex::core::error::ErrorKind;
use sievex::core::types::Value;
use sievex::index::hash::HashIndex;
use sievex::index::navigable::NavigableIndex;
use sievex::index::unique::UniqueIndex;
use sievex::query::ast::Query;
use sievex::query::attribute::Attribute;
use sievex::query::options::{QueryOptions, SortOrder};

fn collection() -> IndexedCollection<Car> {
    let mut collection = IndexedCollection::new();
    collection.add_all(cars()).unwrap();
    collection
}

fn ids<'a>(cars: impl IntoIterator<Item = &'a Car>) -> Vec<u32> {
    let mut ids: Vec<u32> = cars.into_iter().map(|c| c.id).collect();
    ids.sort();
    ids
}

#[test]
fn model_index_over_twenty_cars() {
    let mut collection = collection();
    collection.add_index(HashIndex::on(&model()), &QueryOptions::new()).unwrap();

    let stats = collection.key_statistics("hash:model").unwrap();
    let mut expected: Vec<Value> = MODELS.iter().map(|(_, m)| Value::from(*m)).collect();
    expected.sort();
    assert_eq!(stats.distinct_keys(), expected);
    for key in &expected {
        assert_eq!(stats.count_for_key(key), 2);
    }

    let civics = collection.retrieve(&Query::equal(&model(), "Civic"), &QueryOptions::new()).unwrap();
    assert_eq!(civics.size(), 2);
    assert_eq!(ids(&civics), vec![3, 13]);
    assert!(civics.iter().all(|c| c.model == "Civic"));
    assert_eq!(civics.explain().indexes_used(), vec!["hash:model"]);
}

#[test]
fn update_replaces_object_and_its_keys() {
    let mut collection = collection();
    collection.add_index(HashIndex::on(&model()), &QueryOptions::new()).unwrap();
    collection.add_index(NavigableIndex::on(&price()), &QueryOptions::new()).unwrap();

    let original = car(3);
    let mut modified = original.clone();
    modified.model = "Accord";
    modified.price = 99_000;

    assert!(collection.update(vec![original.clone()], vec![modified.clone()], &QueryOptions::new()).unwrap());
    assert_eq!(collection.len(), 20);

    let civics = collection.retrieve(&Query::equal(&model(), "Civic"), &QueryOptions::new()).unwrap();
    assert!(!civics.contains(&modified));
    assert_eq!(ids(&civics), vec![13]);

    let accords = collection.retrieve(&Query::equal(&model(), "Accord"), &QueryOptions::new()).unwrap();
    assert!(accords.contains(&modified));
    assert_eq!(accords.size(), 3);

    let expensive = collection.retrieve(&Query::greater_than(&price(), 50_000u32), &QueryOptions::new()).unwrap();
    assert_eq!(expensive.unique_result().unwrap(), &modified);
    assert!(collection.stats().health().is_healthy());
}

#[test]
fn range_and_string_queries_over_navigable_index() {
    let mut collection = collection();
    collection.add_index(NavigableIndex::on(&model()), &QueryOptions::new()).unwrap();
    collection.add_index(NavigableIndex::on(&price()), &QueryOptions::new()).unwrap();

    let prefixed = collection.retrieve(&Query::starts_with(&model(), "F"), &QueryOptions::new()).unwrap();
    assert!(prefixed.iter().all(|c| c.model == "Focus" || c.model == "Fusion"));
    assert_eq!(prefixed.size(), 4);
    assert_eq!(prefixed.explain().indexes_used(), vec!["navigable:model"]);

    let ranged = Query::between(&price(), 6000u32, true, 8000u32, false);
    let expected: Vec<u32> = ids(cars().iter().filter(|c| (6000..8000).contains(&c.price)));
    assert_eq!(ids(&collection.retrieve(&ranged, &QueryOptions::new()).unwrap()), expected);

    // No index answers suffix queries, so this one scans
    let suffixed = collection.retrieve(&Query::ends_with(&model(), "s"), &QueryOptions::new()).unwrap();
    assert!(suffixed.explain().uses_scan());
    assert_eq!(suffixed.size(), 8);
}

#[test]
fn multi_valued_attributes_match_any_value() {
    let mut collection = collection();
    collection.add_index(HashIndex::on(&features()), &QueryOptions::new()).unwrap();

    let with_gps = collection.retrieve(&Query::equal(&features(), "gps"), &QueryOptions::new()).unwrap();
    let expected = ids(cars().iter().filter(|c| c.features.contains(&"gps")));
    assert_eq!(ids(&with_gps), expected);

    let bare = collection.retrieve(&!Query::has(&features()), &QueryOptions::new()).unwrap();
    let expected = ids(cars().iter().filter(|c| c.features.is_empty()));
    assert_eq!(ids(&bare), expected);
}

#[test]
fn ordering_and_unique_lookup() {
    let mut collection = collection();
    collection.add_index(UniqueIndex::on(&car_id()), &QueryOptions::new()).unwrap();

    let options = QueryOptions::new().order_by(&price(), SortOrder::Desc).order_by(&car_id(), SortOrder::Asc);
    let hondas = collection.retrieve(&Query::equal(&manufacturer(), "Honda"), &options).unwrap();
    let prices: Vec<u32> = hondas.iter().map(|c| c.price).collect();
    let mut sorted = prices.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(prices, sorted);
    assert_eq!(hondas.size(), 6);

    let seven = collection.retrieve(&Query::equal(&car_id(), 7u32), &QueryOptions::new()).unwrap();
    assert_eq!(seven.unique_result().unwrap().model, "Prius");
    let missing = collection.retrieve(&Query::equal(&car_id(), 70u32), &QueryOptions::new()).unwrap();
    assert_eq!(missing.unique_result().unwrap_err().kind, ErrorKind::NotFound);
}

#[test]
fn regex_and_contains_scan_text_attributes() {
    let collection = collection();
    let q = Query::matches_regex(&model(), "[A-F].*").unwrap();
    let set = collection.retrieve(&q, &QueryOptions::new()).unwrap();
    assert_eq!(ids(&set), ids(cars().iter().filter(|c| ('A'..='F').contains(&c.model.chars().next().unwrap()))));

    let set = collection.retrieve(&Query::contains(&model(), "iu"), &QueryOptions::new()).unwrap();
    assert!(set.iter().all(|c| c.model == "Prius"));
    assert_eq!(set.size(), 2);

    assert_eq!(Query::matches_regex(&model(), "(").unwrap_err().kind, ErrorKind::InvalidQuery);
}

#[test]
fn attributes_sharing_name_and_type_share_indexes() {
    let mut collection = collection();
    collection.add_index(HashIndex::on(&model()), &QueryOptions::new()).unwrap();

    // Same name and type as `model()`, so the model index answers with model values
    let misnamed = Attribute::simple("model", |c: &Car| c.manufacturer);
    let set = collection.retrieve(&Query::equal(&misnamed, "Accord"), &QueryOptions::new()).unwrap();
    assert_eq!(set.explain().indexes_used(), vec!["hash:model"]);
    assert_eq!(ids(set.iter()), vec![5, 15]);

    // A distinct name gets its own scan
    let maker = Attribute::simple("maker", |c: &Car| c.manufacturer);
    let set = collection.retrieve(&Query::equal(&maker, "Honda"), &QueryOptions::new()).unwrap();
    assert!(set.explain().uses_scan());
    assert_eq!(set.size(), 6);

    // Same name with another declared type is a different attribute
    let model_doors = Attribute::simple("model", |c: &Car| c.doors);
    let set = collection.retrieve(&Query::equal(&model_doors, 4), &QueryOptions::new()).unwrap();
    assert!(set.explain().uses_scan());
    assert_eq!(set.size(), 13);
}
