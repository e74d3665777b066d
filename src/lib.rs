//! Quiver – a named query repository and structured query model core.
//!
//! Quiver keeps the queries an application declares up front and hands them
//! out at runtime by name:
//! * A [`domain::EntityType`] describes an entity shape: typed attributes,
//!   associations and a supertype chain. Entities are owned and deduplicated
//!   by the [`domain::DomainModel`] keeper and shared through `Arc`.
//! * A [`tree::SqmFrom`] is a node in the structured query model: a root, an
//!   entity join, an attribute join, or a treated join that narrows another
//!   join to a subtype. Trees support identity preserving deep copies through
//!   a [`tree::SqmCopyContext`].
//! * A [`memento::NamedSqmQueryMemento`] (and its native, callable and result
//!   set mapping counterparts) is the keep-around form of a named query: the
//!   source text plus everything needed to re-interpret it.
//! * The [`repository::NamedObjectRepository`] maps registration names to
//!   mementos of all four kinds, resolves names lazily against the boot
//!   model, and checks or validates every registered query.
//!
//! ## Modules
//! * [`domain`] – Entity types, attributes and the domain model keeper.
//! * [`path`] – Logical dotted paths from a query root down to a node.
//! * [`tree`] – The structured query model: from nodes, expressions,
//!   predicates, select statements and the copy protocol.
//! * [`memento`] – Runtime mementos for the four named query kinds.
//! * [`boot`] – Declared-but-unresolved query definitions and the boot model.
//! * [`translate`] – The query language interpreter and SQL lowering.
//! * [`engine`] – The query engine: settings, translator and the bounded
//!   interpretation cache.
//! * [`repository`] – The named object repository itself.
//! * [`settings`] – Layered configuration (file, environment, defaults).
//! * [`error`] – The crate wide error type.
//!
//! ## Resolution
//! A name is looked up among registered mementos first (native, then sqm,
//! then callable), and only on a miss resolved lazily from the boot model
//! (hql, then native, then procedure definitions). Lazily resolved mementos
//! are published back into the repository, so the next lookup is a plain
//! read. [`repository::NamedObjectRepository::prepare`] does the same work
//! eagerly for every definition, failing fast on the first bad one.
//!
//! ## Quick Start
//! ```
//! use quiver::boot::BootQueryModel;
//! use quiver::domain::{BasicKind, DomainModel, EntityType};
//! use quiver::engine::QueryEngine;
//! use quiver::repository::NamedObjectRepository;
//! use quiver::settings::QuerySettings;
//!
//! let mut model = DomainModel::new();
//! model.add_entity(
//!     EntityType::new("Person")
//!         .with_basic("name", BasicKind::String)
//!         .with_basic("age", BasicKind::Integer),
//! );
//! let engine = QueryEngine::new(model, QuerySettings::default());
//! let boot = BootQueryModel::from_json(
//!     r#"{
//!         "hql_queries": [
//!             { "registration_name": "Person.byName",
//!               "hql": "select p from Person p where p.name = :name" }
//!         ]
//!     }"#,
//! )
//! .unwrap();
//! let repository = NamedObjectRepository::new();
//! repository.prepare_and_validate(&engine, &boot).unwrap();
//! assert!(repository.sqm_query_memento("Person.byName").is_some());
//! ```
//!
//! ## Status
//! The interpreter understands a deliberate subset of the query language:
//! select statements with joins (including `fetch`, `on` and
//! `treat(... as ...)` targets), uniform and/or conditions, comparisons,
//! `like` and nullness checks. The SQL lowering targets a plain relational
//! naming convention and leaves execution to the caller.

pub mod boot;
pub mod domain;
pub mod engine;
pub mod error;
pub mod memento;
pub mod path;
pub mod repository;
pub mod settings;
pub mod translate;
pub mod tree;
