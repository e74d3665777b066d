use std::sync::Arc;

use quiver::boot::{BootQueryModel, NamedHqlQueryDefinition};
use quiver::domain::{BasicKind, DomainModel, EntityType};
use quiver::engine::QueryEngine;
use quiver::error::QueryError;
use quiver::memento::{
    NamedNativeQueryMemento, NamedResultSetMappingMemento, NamedSqmQueryMemento, ResultMapping,
};
use quiver::repository::NamedObjectRepository;
use quiver::settings::QuerySettings;

fn zoo_model() -> DomainModel {
    let mut model = DomainModel::new();
    let (pet, _) = model.add_entity(
        EntityType::new("Pet")
            .with_basic("name", BasicKind::String)
            .with_basic("birth", BasicKind::Date)
            .with_to_one("owner", "Person"),
    );
    model.add_entity(
        EntityType::new("Dog")
            .with_supertype(&pet)
            .with_basic("trained", BasicKind::Boolean),
    );
    model.add_entity(
        EntityType::new("Cat")
            .with_supertype(&pet)
            .with_basic("lives", BasicKind::Integer),
    );
    model.add_entity(
        EntityType::new("Person")
            .with_basic("name", BasicKind::String)
            .with_basic("age", BasicKind::Integer)
            .with_to_many("pets", "Pet"),
    );
    model
}

fn setup() -> (QueryEngine, NamedObjectRepository) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    (
        QueryEngine::new(zoo_model(), QuerySettings::default()),
        NamedObjectRepository::new(),
    )
}

#[test]
fn empty_repository_checks_clean() {
    let (engine, repository) = setup();
    assert!(repository.check_named_queries(&engine).is_empty());
    repository
        .validate_named_queries(&engine)
        .expect("no failures");
}

#[test]
fn check_reports_only_the_broken_query() {
    let (engine, repository) = setup();
    repository.register_sqm_query_memento(
        "good",
        Arc::new(NamedSqmQueryMemento::new(
            "good",
            "select p from Person p where p.name = :name",
        )),
    );
    repository.register_sqm_query_memento(
        "bad",
        Arc::new(NamedSqmQueryMemento::new(
            "bad",
            "select p from Pet p where p.nope = 1",
        )),
    );
    let failures = repository.check_named_queries(&engine);
    assert_eq!(failures.len(), 1);
    let err = failures.get("bad").expect("failure for the broken query");
    assert!(matches!(err, QueryError::Interpretation { .. }));
    assert!(err.to_string().contains("nope"));
    let err = repository
        .validate_named_queries(&engine)
        .expect_err("validation failure");
    match err {
        QueryError::Validation(validation) => {
            assert_eq!(validation.failures().len(), 1);
            assert!(validation.failures().contains_key("bad"));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn failures_keep_the_check_going() {
    let (engine, repository) = setup();
    repository.register_sqm_query_memento(
        "bad.attribute",
        Arc::new(NamedSqmQueryMemento::new(
            "bad.attribute",
            "select p from Pet p where p.nope = 1",
        )),
    );
    repository.register_sqm_query_memento(
        "bad.statement",
        Arc::new(NamedSqmQueryMemento::new("bad.statement", "delete from Person")),
    );
    repository.register_native_query_memento(
        "bad.blank",
        Arc::new(NamedNativeQueryMemento::new("bad.blank", "   ")),
    );
    repository.register_sqm_query_memento(
        "bad.control",
        Arc::new(NamedSqmQueryMemento::new(
            "bad.control",
            "select p from Person p where p.name = \u{000F}0",
        )),
    );
    repository.register_sqm_query_memento(
        "good",
        Arc::new(NamedSqmQueryMemento::new("good", "select p from Person p")),
    );
    let failures = repository.check_named_queries(&engine);
    assert_eq!(failures.len(), 4);
    assert!(failures.contains_key("bad.attribute"));
    assert!(failures.contains_key("bad.statement"));
    assert!(failures.contains_key("bad.blank"));
    assert!(failures.contains_key("bad.control"));
}

#[test]
fn validate_raises_one_aggregate_error() {
    let (engine, repository) = setup();
    repository.register_sqm_query_memento(
        "bad.one",
        Arc::new(NamedSqmQueryMemento::new(
            "bad.one",
            "select p from Pet p where p.nope = 1",
        )),
    );
    repository.register_sqm_query_memento(
        "bad.two",
        Arc::new(NamedSqmQueryMemento::new("bad.two", "delete from Person")),
    );
    let err = repository
        .validate_named_queries(&engine)
        .expect_err("validation failure");
    match err {
        QueryError::Validation(validation) => {
            assert_eq!(validation.failures().len(), 2);
            let message = validation.to_string();
            assert!(message.starts_with("Errors in named queries:"));
            assert!(message.contains("[1] Error in query named 'bad.one'"));
            assert!(message.contains("[2] Error in query named 'bad.two'"));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn native_mapping_references_are_checked_against_the_repository() {
    let (engine, repository) = setup();
    repository.register_native_query_memento(
        "mapped",
        Arc::new(
            NamedNativeQueryMemento::new("mapped", "SELECT name FROM person")
                .with_result_set_mapping("person.names"),
        ),
    );
    let failures = repository.check_named_queries(&engine);
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures.get("mapped"),
        Some(QueryError::UnknownResultSetMapping(name)) if name == "person.names"
    ));
    repository.register_result_set_mapping_memento(
        "person.names",
        Arc::new(
            NamedResultSetMappingMemento::new("person.names").with_mapping(
                ResultMapping::Scalar {
                    column_alias: String::from("name"),
                    kind: BasicKind::String,
                },
            ),
        ),
    );
    assert!(
        repository.check_named_queries(&engine).is_empty(),
        "registering the mapping clears the failure"
    );
}

#[test]
fn checks_go_through_the_interpretation_cache() {
    let (engine, repository) = setup();
    let hql = "select p from Person p where p.age > 18";
    repository.register_sqm_query_memento(
        "adults",
        Arc::new(NamedSqmQueryMemento::new("adults", hql)),
    );
    assert!(repository.check_named_queries(&engine).is_empty());
    let stats = engine.interpretation_cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 1);
    assert!(engine.interpretation_cache().cached(hql).is_some());
    assert!(repository.check_named_queries(&engine).is_empty());
    let stats = engine.interpretation_cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[test]
fn startup_check_follows_the_settings() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut boot = BootQueryModel::new();
    boot.add_hql_query(NamedHqlQueryDefinition::new(
        "bad",
        "select p from Pet p where p.nope = 1",
    ));

    let lenient = QuerySettings {
        validate_on_boot: false,
        ..QuerySettings::default()
    };
    let engine = QueryEngine::new(zoo_model(), lenient);
    let repository = NamedObjectRepository::new();
    repository
        .prepare_and_validate(&engine, &boot)
        .expect("validation skipped");

    let engine = QueryEngine::new(zoo_model(), QuerySettings::default());
    let repository = NamedObjectRepository::new();
    let err = repository
        .prepare_and_validate(&engine, &boot)
        .expect_err("startup check failure");
    assert!(matches!(err, QueryError::Validation(_)));
}
