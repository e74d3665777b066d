use std::sync::Arc;
use std::thread;

use quiver::domain::{BasicKind, DomainModel, EntityType};
use quiver::engine::{CacheStats, QueryEngine};
use quiver::settings::QuerySettings;

fn zoo_model() -> DomainModel {
    let mut model = DomainModel::new();
    let (pet, _) = model.add_entity(
        EntityType::new("Pet")
            .with_basic("name", BasicKind::String)
            .with_to_one("owner", "Person"),
    );
    model.add_entity(
        EntityType::new("Cat")
            .with_supertype(&pet)
            .with_basic("lives", BasicKind::Integer),
    );
    model.add_entity(
        EntityType::new("Person")
            .with_basic("name", BasicKind::String)
            .with_to_many("pets", "Pet"),
    );
    model
}

fn engine() -> QueryEngine {
    QueryEngine::new(zoo_model(), QuerySettings::default())
}

#[test]
fn interpretations_are_cached_and_shared() {
    let engine = engine();
    let hql = "select p from Person p";
    let first = engine
        .interpretation_cache()
        .resolve_hql_interpretation(hql, |hql| engine.translate(hql, None))
        .expect("interpretation");
    let second = engine
        .interpretation_cache()
        .resolve_hql_interpretation(hql, |_| panic!("must not reinterpret"))
        .expect("cached interpretation");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        engine.interpretation_cache().stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            size: 1
        }
    );
}

#[test]
fn a_full_cache_hands_out_uncached_plans() {
    let settings = QuerySettings {
        interpretation_cache_capacity: 1,
        ..QuerySettings::default()
    };
    let engine = QueryEngine::new(zoo_model(), settings);
    let cache = engine.interpretation_cache();
    cache
        .resolve_hql_interpretation("select p from Person p", |hql| engine.translate(hql, None))
        .expect("interpretation");
    assert_eq!(cache.len(), 1);
    let plan = cache
        .resolve_hql_interpretation("select c from Cat c", |hql| engine.translate(hql, None))
        .expect("interpretation");
    assert_eq!(plan.sql(), "SELECT c.* FROM cat c");
    assert_eq!(cache.len(), 1, "a full cache keeps what it has");
    assert!(cache.cached("select c from Cat c").is_none());
    // the kept entry still serves
    cache
        .resolve_hql_interpretation("select p from Person p", |_| panic!("must not reinterpret"))
        .expect("cached interpretation");
}

// Racing threads may interpret the same text more than once; each still
// gets a usable plan and the cache ends up with one entry.
#[test]
fn racing_first_interpretations_all_get_a_plan() {
    let engine = Arc::new(engine());
    let hql = "select p from Person p where p.name = :name";
    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            engine
                .interpretation_cache()
                .resolve_hql_interpretation(hql, |hql| engine.translate(hql, None))
                .expect("interpretation")
        }));
    }
    for handle in handles {
        let plan = handle.join().expect("interpreting thread");
        assert_eq!(plan.hql(), hql);
        assert_eq!(plan.parameter_names(), vec![String::from("name")]);
    }
    assert_eq!(engine.interpretation_cache().len(), 1);
}

#[test]
fn clear_empties_the_cache() {
    let engine = engine();
    let cache = engine.interpretation_cache();
    cache
        .resolve_hql_interpretation("select p from Person p", |hql| engine.translate(hql, None))
        .expect("interpretation");
    assert!(!cache.is_empty());
    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.cached("select p from Person p").is_none());
}
