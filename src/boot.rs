use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::domain::{BasicKind, DomainModel, OtherHasher};
use crate::engine::QueryEngine;
use crate::error::{QueryError, Result};
use crate::memento::{
    CallableParameter, NamedCallableQueryMemento, NamedNativeQueryMemento,
    NamedResultSetMappingMemento, NamedSqmQueryMemento, ParameterMode, QueryHints, ResultMapping,
};

// Type names in definitions may refer to a basic kind or to an entity.
fn known_type(model: &DomainModel, type_name: &str) -> bool {
    BasicKind::parse(type_name).is_some() || model.entity(type_name).is_some()
}

// ------------- HQL query definition -------------
// Definitions are the as-declared form of a named query, deserialized
// from the query document. Resolution turns a definition into a memento,
// failing on anything the runtime form could not represent.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedHqlQueryDefinition {
    pub registration_name: String,
    pub hql: String,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub parameter_types: HashMap<String, String, OtherHasher>,
    #[serde(default)]
    pub hints: QueryHints,
}
impl NamedHqlQueryDefinition {
    pub fn new(registration_name: &str, hql: &str) -> Self {
        Self {
            registration_name: String::from(registration_name),
            hql: String::from(hql),
            result_type: None,
            parameter_types: HashMap::default(),
            hints: QueryHints::default(),
        }
    }
    pub fn resolve(&self, engine: &QueryEngine) -> Result<Arc<NamedSqmQueryMemento>> {
        if self.hql.trim().is_empty() {
            return Err(QueryError::Boot(format!(
                "named query '{}' has no query text",
                self.registration_name
            )));
        }
        let model = engine.domain_model();
        let mut memento = NamedSqmQueryMemento::new(&self.registration_name, &self.hql);
        if let Some(result_type) = &self.result_type {
            if !known_type(model, result_type) {
                return Err(QueryError::Boot(format!(
                    "named query '{}' declares unknown result type '{}'",
                    self.registration_name, result_type
                )));
            }
            memento = memento.with_result_type(result_type);
        }
        // sorted so a definition with several bad parameters always
        // reports the same one
        let mut names: Vec<&String> = self.parameter_types.keys().collect();
        names.sort();
        for name in names {
            let type_name = &self.parameter_types[name];
            if !known_type(model, type_name) {
                return Err(QueryError::Boot(format!(
                    "named query '{}' declares parameter '{}' of unknown type '{}'",
                    self.registration_name, name, type_name
                )));
            }
            memento = memento.with_parameter_type(name, type_name);
        }
        Ok(Arc::new(memento.with_hints(self.hints.clone())))
    }
}

// ------------- Native query definition -------------
#[derive(Debug, Clone, Deserialize)]
pub struct NamedNativeQueryDefinition {
    pub registration_name: String,
    pub sql: String,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub result_set_mapping: Option<String>,
    #[serde(default)]
    pub query_spaces: Vec<String>,
    #[serde(default)]
    pub hints: QueryHints,
}
impl NamedNativeQueryDefinition {
    pub fn new(registration_name: &str, sql: &str) -> Self {
        Self {
            registration_name: String::from(registration_name),
            sql: String::from(sql),
            result_type: None,
            result_set_mapping: None,
            query_spaces: Vec::new(),
            hints: QueryHints::default(),
        }
    }
    // A referenced result set mapping is deliberately not resolved here.
    // Mappings may be registered after the query, so the reference is
    // checked by memento validation against the repository instead.
    pub fn resolve(&self, engine: &QueryEngine) -> Result<Arc<NamedNativeQueryMemento>> {
        if self.sql.trim().is_empty() {
            return Err(QueryError::Boot(format!(
                "named native query '{}' has no SQL",
                self.registration_name
            )));
        }
        let mut memento = NamedNativeQueryMemento::new(&self.registration_name, &self.sql);
        if let Some(result_type) = &self.result_type {
            if !known_type(engine.domain_model(), result_type) {
                return Err(QueryError::Boot(format!(
                    "named native query '{}' declares unknown result type '{}'",
                    self.registration_name, result_type
                )));
            }
            memento = memento.with_result_type(result_type);
        }
        if let Some(mapping_name) = &self.result_set_mapping {
            memento = memento.with_result_set_mapping(mapping_name);
        }
        for space in &self.query_spaces {
            memento = memento.with_query_space(space);
        }
        Ok(Arc::new(memento.with_hints(self.hints.clone())))
    }
}

// ------------- Procedure definition -------------
#[derive(Debug, Clone, Deserialize)]
pub struct ProcedureParameterDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<usize>,
    #[serde(default = "ProcedureParameterDefinition::default_mode")]
    pub mode: ParameterMode,
}
impl ProcedureParameterDefinition {
    fn default_mode() -> ParameterMode {
        ParameterMode::In
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedProcedureDefinition {
    pub registration_name: String,
    pub procedure_name: String,
    #[serde(default)]
    pub parameters: Vec<ProcedureParameterDefinition>,
    #[serde(default)]
    pub hints: QueryHints,
}
impl NamedProcedureDefinition {
    pub fn new(registration_name: &str, procedure_name: &str) -> Self {
        Self {
            registration_name: String::from(registration_name),
            procedure_name: String::from(procedure_name),
            parameters: Vec::new(),
            hints: QueryHints::default(),
        }
    }
    pub fn resolve(&self, _engine: &QueryEngine) -> Result<Arc<NamedCallableQueryMemento>> {
        if self.procedure_name.trim().is_empty() {
            return Err(QueryError::Boot(format!(
                "named procedure '{}' has no procedure name",
                self.registration_name
            )));
        }
        let mut memento =
            NamedCallableQueryMemento::new(&self.registration_name, &self.procedure_name);
        let mut named = 0;
        let mut positional = 0;
        for parameter in &self.parameters {
            match (&parameter.name, parameter.position) {
                (Some(name), None) => {
                    named += 1;
                    memento =
                        memento.with_parameter(CallableParameter::named(name, parameter.mode));
                }
                (None, Some(position)) => {
                    positional += 1;
                    memento = memento
                        .with_parameter(CallableParameter::positional(position, parameter.mode));
                }
                _ => {
                    return Err(QueryError::Boot(format!(
                        "named procedure '{}' has a parameter without exactly one of name or position",
                        self.registration_name
                    )));
                }
            }
        }
        if named > 0 && positional > 0 {
            return Err(QueryError::Boot(format!(
                "named procedure '{}' mixes named and positional parameters",
                self.registration_name
            )));
        }
        Ok(Arc::new(memento.with_hints(self.hints.clone())))
    }
}

// ------------- Result set mapping definition -------------
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultMappingDefinition {
    Entity {
        entity_name: String,
        #[serde(default)]
        discriminator_column: Option<String>,
    },
    Scalar {
        column_alias: String,
        basic_type: BasicKind,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedResultSetMappingDefinition {
    pub registration_name: String,
    #[serde(default)]
    pub mappings: Vec<ResultMappingDefinition>,
}
impl NamedResultSetMappingDefinition {
    pub fn new(registration_name: &str) -> Self {
        Self {
            registration_name: String::from(registration_name),
            mappings: Vec::new(),
        }
    }
    pub fn resolve(&self, engine: &QueryEngine) -> Result<Arc<NamedResultSetMappingMemento>> {
        let model = engine.domain_model();
        let mut memento = NamedResultSetMappingMemento::new(&self.registration_name);
        for mapping in &self.mappings {
            match mapping {
                ResultMappingDefinition::Entity {
                    entity_name,
                    discriminator_column,
                } => {
                    if model.entity(entity_name).is_none() {
                        return Err(QueryError::Boot(format!(
                            "result set mapping '{}' references unknown entity '{}'",
                            self.registration_name, entity_name
                        )));
                    }
                    memento = memento.with_mapping(ResultMapping::Entity {
                        entity_name: entity_name.clone(),
                        discriminator_column: discriminator_column.clone(),
                    });
                }
                ResultMappingDefinition::Scalar {
                    column_alias,
                    basic_type,
                } => {
                    if column_alias.trim().is_empty() {
                        return Err(QueryError::Boot(format!(
                            "result set mapping '{}' has a scalar mapping with no column alias",
                            self.registration_name
                        )));
                    }
                    memento = memento.with_mapping(ResultMapping::Scalar {
                        column_alias: column_alias.clone(),
                        kind: *basic_type,
                    });
                }
            }
        }
        Ok(Arc::new(memento))
    }
}

// ------------- Boot query model -------------
// The declared-but-unresolved side of the world. The repository pulls
// definitions from here lazily on a miss or eagerly during prepare.
#[derive(Debug, Default)]
pub struct BootQueryModel {
    hql_queries: HashMap<String, NamedHqlQueryDefinition, OtherHasher>,
    native_queries: HashMap<String, NamedNativeQueryDefinition, OtherHasher>,
    procedures: HashMap<String, NamedProcedureDefinition, OtherHasher>,
    result_set_mappings: HashMap<String, NamedResultSetMappingDefinition, OtherHasher>,
}

#[derive(Deserialize)]
struct BootQueryDocument {
    #[serde(default)]
    hql_queries: Vec<NamedHqlQueryDefinition>,
    #[serde(default)]
    native_queries: Vec<NamedNativeQueryDefinition>,
    #[serde(default)]
    procedures: Vec<NamedProcedureDefinition>,
    #[serde(default)]
    result_set_mappings: Vec<NamedResultSetMappingDefinition>,
}

impl BootQueryModel {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_json(json: &str) -> Result<BootQueryModel> {
        let document: BootQueryDocument = serde_json::from_str(json)
            .map_err(|err| QueryError::Boot(format!("malformed query document: {}", err)))?;
        let mut model = BootQueryModel::new();
        for definition in document.hql_queries {
            model.add_hql_query(definition);
        }
        for definition in document.native_queries {
            model.add_native_query(definition);
        }
        for definition in document.procedures {
            model.add_procedure(definition);
        }
        for definition in document.result_set_mappings {
            model.add_result_set_mapping(definition);
        }
        Ok(model)
    }
    // Same name declared twice keeps the later declaration.
    pub fn add_hql_query(&mut self, definition: NamedHqlQueryDefinition) {
        self.hql_queries
            .insert(definition.registration_name.clone(), definition);
    }
    pub fn add_native_query(&mut self, definition: NamedNativeQueryDefinition) {
        self.native_queries
            .insert(definition.registration_name.clone(), definition);
    }
    pub fn add_procedure(&mut self, definition: NamedProcedureDefinition) {
        self.procedures
            .insert(definition.registration_name.clone(), definition);
    }
    pub fn add_result_set_mapping(&mut self, definition: NamedResultSetMappingDefinition) {
        self.result_set_mappings
            .insert(definition.registration_name.clone(), definition);
    }
    pub fn named_hql_query_definition(&self, name: &str) -> Option<&NamedHqlQueryDefinition> {
        self.hql_queries.get(name)
    }
    pub fn named_native_query_definition(&self, name: &str) -> Option<&NamedNativeQueryDefinition> {
        self.native_queries.get(name)
    }
    pub fn named_procedure_definition(&self, name: &str) -> Option<&NamedProcedureDefinition> {
        self.procedures.get(name)
    }
    pub fn named_result_set_mapping_definition(
        &self,
        name: &str,
    ) -> Option<&NamedResultSetMappingDefinition> {
        self.result_set_mappings.get(name)
    }
    pub fn visit_named_hql_query_definitions(
        &self,
        visitor: &mut dyn FnMut(&NamedHqlQueryDefinition),
    ) {
        for definition in self.hql_queries.values() {
            visitor(definition);
        }
    }
    pub fn visit_named_native_query_definitions(
        &self,
        visitor: &mut dyn FnMut(&NamedNativeQueryDefinition),
    ) {
        for definition in self.native_queries.values() {
            visitor(definition);
        }
    }
    pub fn visit_named_procedure_definitions(
        &self,
        visitor: &mut dyn FnMut(&NamedProcedureDefinition),
    ) {
        for definition in self.procedures.values() {
            visitor(definition);
        }
    }
    pub fn visit_named_result_set_mapping_definitions(
        &self,
        visitor: &mut dyn FnMut(&NamedResultSetMappingDefinition),
    ) {
        for definition in self.result_set_mappings.values() {
            visitor(definition);
        }
    }
    pub fn len(&self) -> usize {
        self.hql_queries.len()
            + self.native_queries.len()
            + self.procedures.len()
            + self.result_set_mappings.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
