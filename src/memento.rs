use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::domain::{BasicKind, OtherHasher};
use crate::error::{QueryError, Result};
use crate::repository::NamedObjectRepository;

// ------------- Execution hints -------------
// Carried verbatim from definition to memento. The query core stores
// hints, the executor that runs the plan interprets them.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct QueryHints {
    pub first_result: Option<usize>,
    pub max_results: Option<usize>,
    pub cacheable: bool,
    pub cache_region: Option<String>,
    pub read_only: bool,
    pub timeout_secs: Option<u64>,
    pub fetch_size: Option<u32>,
    pub comment: Option<String>,
}

// ------------- SQM query memento -------------
// The keep-around form of a translatable query: the source text plus
// everything needed to re-interpret it, never the interpretation itself.
#[derive(Debug)]
pub struct NamedSqmQueryMemento {
    registration_name: String,
    hql: String,
    result_type: Option<String>,
    parameter_types: HashMap<String, String, OtherHasher>,
    hints: QueryHints,
}
impl NamedSqmQueryMemento {
    pub fn new(registration_name: &str, hql: &str) -> Self {
        Self {
            registration_name: String::from(registration_name),
            hql: String::from(hql),
            result_type: None,
            parameter_types: HashMap::default(),
            hints: QueryHints::default(),
        }
    }
    pub fn with_result_type(mut self, result_type: &str) -> Self {
        self.result_type = Some(String::from(result_type));
        self
    }
    pub fn with_parameter_type(mut self, name: &str, type_name: &str) -> Self {
        self.parameter_types
            .insert(String::from(name), String::from(type_name));
        self
    }
    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.hints = hints;
        self
    }
    pub fn registration_name(&self) -> &str {
        &self.registration_name
    }
    pub fn hql(&self) -> &str {
        &self.hql
    }
    pub fn result_type(&self) -> Option<&str> {
        self.result_type.as_deref()
    }
    pub fn parameter_types(&self) -> &HashMap<String, String, OtherHasher> {
        &self.parameter_types
    }
    pub fn hints(&self) -> &QueryHints {
        &self.hints
    }
    pub fn make_copy(&self, new_name: &str) -> NamedSqmQueryMemento {
        NamedSqmQueryMemento {
            registration_name: String::from(new_name),
            hql: self.hql.clone(),
            result_type: self.result_type.clone(),
            parameter_types: self.parameter_types.clone(),
            hints: self.hints.clone(),
        }
    }
}

// ------------- Native query memento -------------
#[derive(Debug)]
pub struct NamedNativeQueryMemento {
    registration_name: String,
    sql: String,
    result_type: Option<String>,
    result_set_mapping: Option<String>,
    query_spaces: Vec<String>,
    hints: QueryHints,
}
impl NamedNativeQueryMemento {
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
    pub fn with_result_type(mut self, result_type: &str) -> Self {
        self.result_type = Some(String::from(result_type));
        self
    }
    pub fn with_result_set_mapping(mut self, mapping_name: &str) -> Self {
        self.result_set_mapping = Some(String::from(mapping_name));
        self
    }
    pub fn with_query_space(mut self, space: &str) -> Self {
        self.query_spaces.push(String::from(space));
        self
    }
    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.hints = hints;
        self
    }
    pub fn registration_name(&self) -> &str {
        &self.registration_name
    }
    pub fn sql(&self) -> &str {
        &self.sql
    }
    pub fn result_type(&self) -> Option<&str> {
        self.result_type.as_deref()
    }
    pub fn result_set_mapping(&self) -> Option<&str> {
        self.result_set_mapping.as_deref()
    }
    pub fn query_spaces(&self) -> &[String] {
        &self.query_spaces
    }
    pub fn hints(&self) -> &QueryHints {
        &self.hints
    }
    // Native SQL is opaque to the interpreter, so the only checks are
    // that there is any SQL at all and that a referenced result set
    // mapping is actually registered.
    pub fn validate(&self, repository: &NamedObjectRepository) -> Result<()> {
        if self.sql.trim().is_empty() {
            return Err(QueryError::Interpretation {
                query: self.registration_name.clone(),
                message: String::from("no SQL specified"),
            });
        }
        if let Some(mapping_name) = &self.result_set_mapping {
            if repository
                .result_set_mapping_memento(mapping_name)
                .is_none()
            {
                return Err(QueryError::UnknownResultSetMapping(mapping_name.clone()));
            }
        }
        Ok(())
    }
    pub fn make_copy(&self, new_name: &str) -> NamedNativeQueryMemento {
        NamedNativeQueryMemento {
            registration_name: String::from(new_name),
            sql: self.sql.clone(),
            result_type: self.result_type.clone(),
            result_set_mapping: self.result_set_mapping.clone(),
            query_spaces: self.query_spaces.clone(),
            hints: self.hints.clone(),
        }
    }
}

// ------------- Callable query memento -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    In,
    Out,
    InOut,
    RefCursor,
}
impl fmt::Display for ParameterMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterMode::In => write!(f, "in"),
            ParameterMode::Out => write!(f, "out"),
            ParameterMode::InOut => write!(f, "in_out"),
            ParameterMode::RefCursor => write!(f, "ref_cursor"),
        }
    }
}

// Either name or position identifies the parameter, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableParameter {
    name: Option<String>,
    position: Option<usize>,
    mode: ParameterMode,
}
impl CallableParameter {
    pub fn named(name: &str, mode: ParameterMode) -> Self {
        Self {
            name: Some(String::from(name)),
            position: None,
            mode,
        }
    }
    pub fn positional(position: usize, mode: ParameterMode) -> Self {
        Self {
            name: None,
            position: Some(position),
            mode,
        }
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn position(&self) -> Option<usize> {
        self.position
    }
    pub fn mode(&self) -> ParameterMode {
        self.mode
    }
}

#[derive(Debug)]
pub struct NamedCallableQueryMemento {
    registration_name: String,
    callable_name: String,
    parameters: Vec<CallableParameter>,
    hints: QueryHints,
}
impl NamedCallableQueryMemento {
    pub fn new(registration_name: &str, callable_name: &str) -> Self {
        Self {
            registration_name: String::from(registration_name),
            callable_name: String::from(callable_name),
            parameters: Vec::new(),
            hints: QueryHints::default(),
        }
    }
    pub fn with_parameter(mut self, parameter: CallableParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.hints = hints;
        self
    }
    pub fn registration_name(&self) -> &str {
        &self.registration_name
    }
    pub fn callable_name(&self) -> &str {
        &self.callable_name
    }
    pub fn parameters(&self) -> &[CallableParameter] {
        &self.parameters
    }
    pub fn hints(&self) -> &QueryHints {
        &self.hints
    }
    pub fn make_copy(&self, new_name: &str) -> NamedCallableQueryMemento {
        NamedCallableQueryMemento {
            registration_name: String::from(new_name),
            callable_name: self.callable_name.clone(),
            parameters: self.parameters.clone(),
            hints: self.hints.clone(),
        }
    }
}

// ------------- Result set mapping memento -------------
#[derive(Debug, Clone, PartialEq)]
pub enum ResultMapping {
    Entity {
        entity_name: String,
        discriminator_column: Option<String>,
    },
    Scalar {
        column_alias: String,
        kind: BasicKind,
    },
}

#[derive(Debug)]
pub struct NamedResultSetMappingMemento {
    registration_name: String,
    mappings: Vec<ResultMapping>,
}
impl NamedResultSetMappingMemento {
    pub fn new(registration_name: &str) -> Self {
        Self {
            registration_name: String::from(registration_name),
            mappings: Vec::new(),
        }
    }
    pub fn with_mapping(mut self, mapping: ResultMapping) -> Self {
        self.mappings.push(mapping);
        self
    }
    pub fn registration_name(&self) -> &str {
        &self.registration_name
    }
    pub fn mappings(&self) -> &[ResultMapping] {
        &self.mappings
    }
}

// ------------- Resolved memento -------------
// What a name resolves to when the caller does not know the kind ahead
// of time. Result set mappings describe result shapes rather than
// executable queries and are left out on purpose.
#[derive(Debug, Clone)]
pub enum NamedQueryMemento {
    Sqm(Arc<NamedSqmQueryMemento>),
    Native(Arc<NamedNativeQueryMemento>),
    Callable(Arc<NamedCallableQueryMemento>),
}
impl NamedQueryMemento {
    pub fn registration_name(&self) -> &str {
        match self {
            NamedQueryMemento::Sqm(memento) => memento.registration_name(),
            NamedQueryMemento::Native(memento) => memento.registration_name(),
            NamedQueryMemento::Callable(memento) => memento.registration_name(),
        }
    }
}
