use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::boot::BootQueryModel;
use crate::domain::OtherHasher;
use crate::engine::QueryEngine;
use crate::error::{NamedQueryValidationError, QueryError, Result};
use crate::memento::{
    NamedCallableQueryMemento, NamedNativeQueryMemento, NamedQueryMemento,
    NamedResultSetMappingMemento, NamedSqmQueryMemento,
};

#[derive(Default)]
struct MementoMaps {
    sqm: HashMap<String, Arc<NamedSqmQueryMemento>, OtherHasher>,
    native: HashMap<String, Arc<NamedNativeQueryMemento>, OtherHasher>,
    callable: HashMap<String, Arc<NamedCallableQueryMemento>, OtherHasher>,
    result_set_mappings: HashMap<String, Arc<NamedResultSetMappingMemento>, OtherHasher>,
}

// ------------- Named object repository -------------
// The runtime registry of named queries. All four maps sit behind one
// lock, so a registration that evicts the same name of another kind is
// a single atomic step to readers.
pub struct NamedObjectRepository {
    maps: RwLock<MementoMaps>,
}
impl NamedObjectRepository {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(MementoMaps::default()),
        }
    }

    // ------------- lookup -------------
    pub fn sqm_query_memento(&self, name: &str) -> Option<Arc<NamedSqmQueryMemento>> {
        self.maps.read().unwrap().sqm.get(name).cloned()
    }
    pub fn native_query_memento(&self, name: &str) -> Option<Arc<NamedNativeQueryMemento>> {
        self.maps.read().unwrap().native.get(name).cloned()
    }
    pub fn callable_query_memento(&self, name: &str) -> Option<Arc<NamedCallableQueryMemento>> {
        self.maps.read().unwrap().callable.get(name).cloned()
    }
    pub fn result_set_mapping_memento(
        &self,
        name: &str,
    ) -> Option<Arc<NamedResultSetMappingMemento>> {
        self.maps
            .read()
            .unwrap()
            .result_set_mappings
            .get(name)
            .cloned()
    }
    pub fn visit_sqm_query_mementos(&self, visitor: &mut dyn FnMut(&Arc<NamedSqmQueryMemento>)) {
        for memento in self.maps.read().unwrap().sqm.values() {
            visitor(memento);
        }
    }
    pub fn visit_native_query_mementos(
        &self,
        visitor: &mut dyn FnMut(&Arc<NamedNativeQueryMemento>),
    ) {
        for memento in self.maps.read().unwrap().native.values() {
            visitor(memento);
        }
    }
    pub fn visit_callable_query_mementos(
        &self,
        visitor: &mut dyn FnMut(&Arc<NamedCallableQueryMemento>),
    ) {
        for memento in self.maps.read().unwrap().callable.values() {
            visitor(memento);
        }
    }
    pub fn visit_result_set_mapping_mementos(
        &self,
        visitor: &mut dyn FnMut(&Arc<NamedResultSetMappingMemento>),
    ) {
        for memento in self.maps.read().unwrap().result_set_mappings.values() {
            visitor(memento);
        }
    }

    // ------------- registration -------------
    // A name means one query. Registering an sqm query under a name a
    // native query holds evicts the native one, and the other way
    // around. Callable queries and result set mappings name different
    // things and never evict across kinds.
    pub fn register_sqm_query_memento(&self, name: &str, memento: Arc<NamedSqmQueryMemento>) {
        let mut maps = self.maps.write().unwrap();
        if maps.native.remove(name).is_some() {
            debug!(name, "evicted native query during sqm registration");
        }
        maps.sqm.insert(String::from(name), memento);
    }
    pub fn register_native_query_memento(&self, name: &str, memento: Arc<NamedNativeQueryMemento>) {
        let mut maps = self.maps.write().unwrap();
        if maps.sqm.remove(name).is_some() {
            debug!(name, "evicted sqm query during native registration");
        }
        maps.native.insert(String::from(name), memento);
    }
    pub fn register_callable_query_memento(
        &self,
        name: &str,
        memento: Arc<NamedCallableQueryMemento>,
    ) {
        self.maps
            .write()
            .unwrap()
            .callable
            .insert(String::from(name), memento);
    }
    pub fn register_result_set_mapping_memento(
        &self,
        name: &str,
        memento: Arc<NamedResultSetMappingMemento>,
    ) {
        self.maps
            .write()
            .unwrap()
            .result_set_mappings
            .insert(String::from(name), memento);
    }

    // ------------- resolution -------------
    // Registered mementos win over boot definitions. Among the
    // registered kinds native is consulted before sqm before callable,
    // while unresolved names fall back to the boot definitions in hql,
    // native, procedure order. A boot definition is resolved with no
    // lock held and published with a plain insert: the resolving
    // thread's memento replaces a concurrently registered one of the
    // same kind, never evicts one of another kind. Result set mappings
    // describe shapes, not queries, and are not consulted here.
    pub fn resolve(
        &self,
        engine: &QueryEngine,
        boot_model: &BootQueryModel,
        registration_name: &str,
    ) -> Result<Option<NamedQueryMemento>> {
        {
            let maps = self.maps.read().unwrap();
            if let Some(memento) = maps.native.get(registration_name) {
                return Ok(Some(NamedQueryMemento::Native(Arc::clone(memento))));
            }
            if let Some(memento) = maps.sqm.get(registration_name) {
                return Ok(Some(NamedQueryMemento::Sqm(Arc::clone(memento))));
            }
            if let Some(memento) = maps.callable.get(registration_name) {
                return Ok(Some(NamedQueryMemento::Callable(Arc::clone(memento))));
            }
        }
        if let Some(definition) = boot_model.named_hql_query_definition(registration_name) {
            let memento = definition.resolve(engine)?;
            self.maps
                .write()
                .unwrap()
                .sqm
                .insert(String::from(registration_name), Arc::clone(&memento));
            debug!(name = registration_name, kind = "sqm", "resolved named query definition");
            return Ok(Some(NamedQueryMemento::Sqm(memento)));
        }
        if let Some(definition) = boot_model.named_native_query_definition(registration_name) {
            let memento = definition.resolve(engine)?;
            self.maps
                .write()
                .unwrap()
                .native
                .insert(String::from(registration_name), Arc::clone(&memento));
            debug!(name = registration_name, kind = "native", "resolved named query definition");
            return Ok(Some(NamedQueryMemento::Native(memento)));
        }
        if let Some(definition) = boot_model.named_procedure_definition(registration_name) {
            let memento = definition.resolve(engine)?;
            self.maps
                .write()
                .unwrap()
                .callable
                .insert(String::from(registration_name), Arc::clone(&memento));
            debug!(name = registration_name, kind = "callable", "resolved named query definition");
            return Ok(Some(NamedQueryMemento::Callable(memento)));
        }
        Ok(None)
    }

    // ------------- preparation -------------
    // Eager pass over every boot definition, failing on the first bad
    // one. All resolution happens before the write lock is taken, so
    // readers never observe a partially prepared repository.
    pub fn prepare(&self, engine: &QueryEngine, boot_model: &BootQueryModel) -> Result<()> {
        let mut failure: Option<QueryError> = None;

        let mut sqm = Vec::new();
        boot_model.visit_named_hql_query_definitions(&mut |definition| {
            if failure.is_none() {
                match definition.resolve(engine) {
                    Ok(memento) => sqm.push((definition.registration_name.clone(), memento)),
                    Err(err) => failure = Some(err),
                }
            }
        });
        if let Some(err) = failure.take() {
            return Err(err);
        }

        let mut native = Vec::new();
        boot_model.visit_named_native_query_definitions(&mut |definition| {
            if failure.is_none() {
                match definition.resolve(engine) {
                    Ok(memento) => native.push((definition.registration_name.clone(), memento)),
                    Err(err) => failure = Some(err),
                }
            }
        });
        if let Some(err) = failure.take() {
            return Err(err);
        }

        let mut mappings = Vec::new();
        boot_model.visit_named_result_set_mapping_definitions(&mut |definition| {
            if failure.is_none() {
                match definition.resolve(engine) {
                    Ok(memento) => mappings.push((definition.registration_name.clone(), memento)),
                    Err(err) => failure = Some(err),
                }
            }
        });
        if let Some(err) = failure.take() {
            return Err(err);
        }

        let mut callable = Vec::new();
        boot_model.visit_named_procedure_definitions(&mut |definition| {
            if failure.is_none() {
                match definition.resolve(engine) {
                    Ok(memento) => callable.push((definition.registration_name.clone(), memento)),
                    Err(err) => failure = Some(err),
                }
            }
        });
        if let Some(err) = failure.take() {
            return Err(err);
        }

        // plain inserts: a name declared as both an hql and a native
        // query ends up in both maps, and resolution order decides
        let mut maps = self.maps.write().unwrap();
        for (name, memento) in sqm {
            maps.sqm.insert(name, memento);
        }
        for (name, memento) in native {
            maps.native.insert(name, memento);
        }
        for (name, memento) in mappings {
            maps.result_set_mappings.insert(name, memento);
        }
        for (name, memento) in callable {
            maps.callable.insert(name, memento);
        }
        Ok(())
    }

    // Boot time entry point: prepare, then validate when the settings
    // ask for startup checking.
    pub fn prepare_and_validate(
        &self,
        engine: &QueryEngine,
        boot_model: &BootQueryModel,
    ) -> Result<()> {
        self.prepare(engine, boot_model)?;
        if engine.settings().validate_on_boot {
            self.validate_named_queries(engine)?;
        }
        Ok(())
    }

    // ------------- validation -------------
    // Non-throwing check of everything registered. A failing query
    // never stops the rest from being checked; failures come back
    // keyed by registration name. Sqm queries go through the engine's
    // interpretation cache, so a later execution of a query that
    // checked out reuses the plan. Callable queries hold no text the
    // engine could interpret and are not checked.
    pub fn check_named_queries(
        &self,
        engine: &QueryEngine,
    ) -> HashMap<String, QueryError, OtherHasher> {
        let (sqm, native) = {
            let maps = self.maps.read().unwrap();
            (
                maps.sqm.values().cloned().collect::<Vec<_>>(),
                maps.native.values().cloned().collect::<Vec<_>>(),
            )
        };
        let mut failures: HashMap<String, QueryError, OtherHasher> = HashMap::default();
        for memento in sqm {
            debug!(name = memento.registration_name(), "checking named query");
            let outcome = engine
                .interpretation_cache()
                .resolve_hql_interpretation(memento.hql(), |hql| engine.translate(hql, None));
            if let Err(err) = outcome {
                failures.insert(String::from(memento.registration_name()), err);
            }
        }
        for memento in native {
            debug!(name = memento.registration_name(), "checking named native query");
            if let Err(err) = memento.validate(self) {
                failures.insert(String::from(memento.registration_name()), err);
            }
        }
        failures
    }

    // Same checks, escalated: every failure is logged and the whole
    // set is raised as one aggregate error.
    pub fn validate_named_queries(&self, engine: &QueryEngine) -> Result<()> {
        let failures = self.check_named_queries(engine);
        if failures.is_empty() {
            return Ok(());
        }
        for (name, err) in &failures {
            error!(name = name.as_str(), error = %err, "invalid named query");
        }
        Err(QueryError::Validation(NamedQueryValidationError::new(
            failures,
        )))
    }

    // ------------- lifecycle -------------
    pub fn close(&self) {
        let mut maps = self.maps.write().unwrap();
        maps.sqm.clear();
        maps.native.clear();
        maps.callable.clear();
        maps.result_set_mappings.clear();
    }
    // One read lock over all four maps, so the counts are a consistent
    // snapshot even while registrations run.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let maps = self.maps.read().unwrap();
        (
            maps.sqm.len(),
            maps.native.len(),
            maps.callable.len(),
            maps.result_set_mappings.len(),
        )
    }
}
impl Default for NamedObjectRepository {
    fn default() -> Self {
        Self::new()
    }
}
