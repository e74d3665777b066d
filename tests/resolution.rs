use std::sync::Arc;

use quiver::boot::{
    BootQueryModel, NamedHqlQueryDefinition, NamedNativeQueryDefinition, NamedProcedureDefinition,
    ProcedureParameterDefinition,
};
use quiver::domain::{BasicKind, DomainModel, EntityType};
use quiver::engine::QueryEngine;
use quiver::error::QueryError;
use quiver::memento::{
    NamedCallableQueryMemento, NamedQueryMemento, NamedSqmQueryMemento, ParameterMode,
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

fn engine() -> QueryEngine {
    QueryEngine::new(zoo_model(), QuerySettings::default())
}

#[test]
fn lazy_resolution_publishes_the_memento() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let mut boot = BootQueryModel::new();
    boot.add_hql_query(NamedHqlQueryDefinition::new(
        "Person.byName",
        "select p from Person p where p.name = :name",
    ));
    let resolved = repository
        .resolve(&engine, &boot, "Person.byName")
        .expect("resolution")
        .expect("memento");
    match resolved {
        NamedQueryMemento::Sqm(memento) => {
            assert_eq!(memento.hql(), "select p from Person p where p.name = :name");
        }
        other => panic!("expected an sqm memento, got {:?}", other),
    }
    assert!(
        repository.sqm_query_memento("Person.byName").is_some(),
        "resolved memento published to the repository"
    );
}

#[test]
fn unknown_name_resolves_to_none() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let boot = BootQueryModel::new();
    let resolved = repository
        .resolve(&engine, &boot, "no.such.query")
        .expect("resolution");
    assert!(resolved.is_none());
}

#[test]
fn registered_memento_beats_boot_definition() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let mut boot = BootQueryModel::new();
    boot.add_hql_query(NamedHqlQueryDefinition::new(
        "Person.all",
        "select p from Person p where p.age > 0",
    ));
    repository.register_sqm_query_memento(
        "Person.all",
        Arc::new(NamedSqmQueryMemento::new(
            "Person.all",
            "select p from Person p",
        )),
    );
    let resolved = repository
        .resolve(&engine, &boot, "Person.all")
        .expect("resolution")
        .expect("memento");
    match resolved {
        NamedQueryMemento::Sqm(memento) => {
            assert_eq!(memento.hql(), "select p from Person p");
        }
        other => panic!("expected an sqm memento, got {:?}", other),
    }
}

// A name declared as both an hql and a native query lands in both maps
// during prepare. Among registered mementos the native one is consulted
// first, even though boot resolution tries the hql definition first.
#[test]
fn registered_lookup_prefers_native_over_sqm() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let mut boot = BootQueryModel::new();
    boot.add_hql_query(NamedHqlQueryDefinition::new(
        "shared",
        "select p from Person p",
    ));
    boot.add_native_query(NamedNativeQueryDefinition::new(
        "shared",
        "SELECT * FROM person",
    ));
    repository.prepare(&engine, &boot).expect("preparation");
    assert_eq!(repository.counts(), (1, 1, 0, 0));
    let resolved = repository
        .resolve(&engine, &boot, "shared")
        .expect("resolution")
        .expect("memento");
    assert!(matches!(resolved, NamedQueryMemento::Native(_)));
}

#[test]
fn registered_lookup_prefers_sqm_over_callable() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let boot = BootQueryModel::new();
    repository.register_sqm_query_memento(
        "shared",
        Arc::new(NamedSqmQueryMemento::new("shared", "select p from Person p")),
    );
    repository.register_callable_query_memento(
        "shared",
        Arc::new(NamedCallableQueryMemento::new("shared", "some_procedure")),
    );
    let resolved = repository
        .resolve(&engine, &boot, "shared")
        .expect("resolution")
        .expect("memento");
    assert!(matches!(resolved, NamedQueryMemento::Sqm(_)));
}

// With nothing registered yet, the boot definitions are tried in the
// same order: hql first.
#[test]
fn boot_resolution_prefers_the_hql_definition() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let mut boot = BootQueryModel::new();
    boot.add_hql_query(NamedHqlQueryDefinition::new(
        "shared",
        "select p from Person p",
    ));
    boot.add_native_query(NamedNativeQueryDefinition::new(
        "shared",
        "SELECT * FROM person",
    ));
    let resolved = repository
        .resolve(&engine, &boot, "shared")
        .expect("resolution")
        .expect("memento");
    assert!(matches!(resolved, NamedQueryMemento::Sqm(_)));
    assert_eq!(
        repository.counts(),
        (1, 0, 0, 0),
        "only the winning kind published"
    );
}

#[test]
fn prepare_fails_fast_and_publishes_nothing() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let mut boot = BootQueryModel::new();
    boot.add_hql_query(NamedHqlQueryDefinition::new(
        "Person.good",
        "select p from Person p",
    ));
    boot.add_hql_query(NamedHqlQueryDefinition::new("Person.bad", "   "));
    let err = repository
        .prepare(&engine, &boot)
        .expect_err("blank query text rejected");
    assert!(matches!(err, QueryError::Boot(_)));
    assert_eq!(
        repository.counts(),
        (0, 0, 0, 0),
        "a failing prepare leaves the repository untouched"
    );
}

#[test]
fn prepare_populates_every_kind() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let boot = BootQueryModel::from_json(
        r#"{
            "hql_queries": [
                {"registration_name": "Person.byName", "hql": "select p from Person p where p.name = :name"}
            ],
            "native_queries": [
                {"registration_name": "Person.raw", "sql": "SELECT * FROM person"}
            ],
            "procedures": [
                {"registration_name": "Person.audit", "procedure_name": "audit_person"}
            ],
            "result_set_mappings": [
                {"registration_name": "Person.names", "mappings": [
                    {"kind": "scalar", "column_alias": "name", "basic_type": "String"}
                ]}
            ]
        }"#,
    )
    .expect("query document");
    repository.prepare(&engine, &boot).expect("preparation");
    assert_eq!(repository.counts(), (1, 1, 1, 1));
    // mappings describe result shapes, not queries, so a mapping name
    // does not resolve
    let resolved = repository
        .resolve(&engine, &boot, "Person.names")
        .expect("resolution");
    assert!(resolved.is_none());
    assert!(
        repository
            .result_set_mapping_memento("Person.names")
            .is_some()
    );
}

#[test]
fn resolve_surfaces_a_bad_definition() {
    let engine = engine();
    let repository = NamedObjectRepository::new();
    let mut boot = BootQueryModel::new();
    let mut definition = NamedProcedureDefinition::new("Person.audit", "audit_person");
    definition.parameters.push(ProcedureParameterDefinition {
        name: Some(String::from("who")),
        position: Some(1),
        mode: ParameterMode::In,
    });
    boot.add_procedure(definition);
    let err = repository
        .resolve(&engine, &boot, "Person.audit")
        .expect_err("ambiguous parameter rejected");
    assert!(matches!(err, QueryError::Boot(_)));
    assert!(
        repository.callable_query_memento("Person.audit").is_none(),
        "nothing published on failure"
    );
}
