use quiver::boot::{
    BootQueryModel, NamedHqlQueryDefinition, NamedProcedureDefinition,
    ProcedureParameterDefinition,
};
use quiver::domain::{BasicKind, DomainModel, EntityType};
use quiver::engine::QueryEngine;
use quiver::error::QueryError;
use quiver::memento::ParameterMode;
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
fn from_json_loads_every_kind() {
    let boot = BootQueryModel::from_json(
        r#"{
            "hql_queries": [
                {"registration_name": "Person.byName", "hql": "select p from Person p where p.name = :name"}
            ],
            "native_queries": [
                {"registration_name": "Person.raw", "sql": "SELECT * FROM person", "query_spaces": ["person"]}
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
    assert_eq!(boot.len(), 4);
    assert!(!boot.is_empty());
    assert!(boot.named_hql_query_definition("Person.byName").is_some());
    assert!(boot.named_native_query_definition("Person.raw").is_some());
    assert!(boot.named_procedure_definition("Person.audit").is_some());
    assert!(
        boot.named_result_set_mapping_definition("Person.names")
            .is_some()
    );
}

#[test]
fn malformed_document_is_a_boot_error() {
    let err = BootQueryModel::from_json("{ not json").expect_err("malformed document");
    match err {
        QueryError::Boot(message) => {
            assert!(message.starts_with("malformed query document"));
        }
        other => panic!("expected a boot error, got {:?}", other),
    }
}

#[test]
fn blank_query_text_is_rejected_at_resolve() {
    let engine = engine();
    let definition = NamedHqlQueryDefinition::new("empty", "  ");
    let err = definition.resolve(&engine).expect_err("blank query text");
    match err {
        QueryError::Boot(message) => assert!(message.contains("has no query text")),
        other => panic!("expected a boot error, got {:?}", other),
    }
}

#[test]
fn parameter_types_must_be_known() {
    let engine = engine();
    let mut definition = NamedHqlQueryDefinition::new(
        "Person.byName",
        "select p from Person p where p.name = :name",
    );
    definition
        .parameter_types
        .insert(String::from("name"), String::from("Varchar"));
    let err = definition.resolve(&engine).expect_err("unknown parameter type");
    match err {
        QueryError::Boot(message) => {
            assert!(message.contains("parameter 'name'"));
            assert!(message.contains("'Varchar'"));
        }
        other => panic!("expected a boot error, got {:?}", other),
    }
    // both basic kinds and entities qualify as parameter types
    let mut definition = NamedHqlQueryDefinition::new(
        "Pet.byOwner",
        "select p from Pet p where p.owner = :owner",
    );
    definition
        .parameter_types
        .insert(String::from("owner"), String::from("Person"));
    let memento = definition.resolve(&engine).expect("entity typed parameter");
    assert_eq!(
        memento.parameter_types().get("owner").map(String::as_str),
        Some("Person")
    );
}

#[test]
fn result_types_must_be_known() {
    let engine = engine();
    let mut definition = NamedHqlQueryDefinition::new("aliens", "select a from Alien a");
    definition.result_type = Some(String::from("Alien"));
    let err = definition.resolve(&engine).expect_err("unknown result type");
    match err {
        QueryError::Boot(message) => assert!(message.contains("result type 'Alien'")),
        other => panic!("expected a boot error, got {:?}", other),
    }
}

#[test]
fn procedure_parameters_need_exactly_one_identity() {
    let engine = engine();
    let mut definition = NamedProcedureDefinition::new("proc", "do_things");
    definition.parameters.push(ProcedureParameterDefinition {
        name: Some(String::from("a")),
        position: Some(1),
        mode: ParameterMode::In,
    });
    assert!(definition.resolve(&engine).is_err(), "name and position");

    let mut definition = NamedProcedureDefinition::new("proc", "do_things");
    definition.parameters.push(ProcedureParameterDefinition {
        name: None,
        position: None,
        mode: ParameterMode::In,
    });
    assert!(definition.resolve(&engine).is_err(), "neither name nor position");

    let mut definition = NamedProcedureDefinition::new("proc", "do_things");
    definition.parameters.push(ProcedureParameterDefinition {
        name: Some(String::from("a")),
        position: None,
        mode: ParameterMode::In,
    });
    definition.parameters.push(ProcedureParameterDefinition {
        name: None,
        position: Some(2),
        mode: ParameterMode::Out,
    });
    let err = definition.resolve(&engine).expect_err("mixed parameter styles");
    assert!(err.to_string().contains("mixes named and positional"));
}

#[test]
fn procedure_modes_deserialize_from_snake_case() {
    let engine = engine();
    let boot = BootQueryModel::from_json(
        r#"{
            "procedures": [
                {"registration_name": "proc", "procedure_name": "do_things", "parameters": [
                    {"name": "a"},
                    {"name": "b", "mode": "in_out"},
                    {"name": "c", "mode": "ref_cursor"}
                ]}
            ]
        }"#,
    )
    .expect("query document");
    let memento = boot
        .named_procedure_definition("proc")
        .expect("definition")
        .resolve(&engine)
        .expect("resolution");
    assert_eq!(memento.callable_name(), "do_things");
    let modes: Vec<ParameterMode> = memento.parameters().iter().map(|p| p.mode()).collect();
    assert_eq!(
        modes,
        vec![ParameterMode::In, ParameterMode::InOut, ParameterMode::RefCursor]
    );
    assert_eq!(memento.parameters()[0].name(), Some("a"));
}

#[test]
fn result_set_mappings_check_their_references() {
    let engine = engine();
    let boot = BootQueryModel::from_json(
        r#"{
            "result_set_mappings": [
                {"registration_name": "broken", "mappings": [
                    {"kind": "entity", "entity_name": "Alien"}
                ]},
                {"registration_name": "mixed", "mappings": [
                    {"kind": "entity", "entity_name": "Pet", "discriminator_column": "species"},
                    {"kind": "scalar", "column_alias": "owner_name", "basic_type": "String"}
                ]}
            ]
        }"#,
    )
    .expect("query document");
    let err = boot
        .named_result_set_mapping_definition("broken")
        .expect("definition")
        .resolve(&engine)
        .expect_err("unknown entity");
    assert!(err.to_string().contains("unknown entity 'Alien'"));
    let memento = boot
        .named_result_set_mapping_definition("mixed")
        .expect("definition")
        .resolve(&engine)
        .expect("resolution");
    assert_eq!(memento.mappings().len(), 2);
}

#[test]
fn hints_survive_resolution() {
    let engine = engine();
    let boot = BootQueryModel::from_json(
        r#"{
            "hql_queries": [
                {"registration_name": "capped", "hql": "select p from Person p",
                 "hints": {"max_results": 50, "cacheable": true, "cache_region": "people", "timeout_secs": 5}}
            ]
        }"#,
    )
    .expect("query document");
    let memento = boot
        .named_hql_query_definition("capped")
        .expect("definition")
        .resolve(&engine)
        .expect("resolution");
    assert_eq!(memento.hints().max_results, Some(50));
    assert!(memento.hints().cacheable);
    assert_eq!(memento.hints().cache_region.as_deref(), Some("people"));
    assert_eq!(memento.hints().timeout_secs, Some(5));
    assert_eq!(memento.hints().first_result, None);
}

#[test]
fn later_declaration_wins() {
    let mut boot = BootQueryModel::new();
    boot.add_hql_query(NamedHqlQueryDefinition::new("dup", "select p from Person p"));
    boot.add_hql_query(NamedHqlQueryDefinition::new("dup", "select c from Cat c"));
    assert_eq!(boot.len(), 1);
    assert_eq!(
        boot.named_hql_query_definition("dup").expect("definition").hql,
        "select c from Cat c"
    );
}
