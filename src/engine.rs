use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::domain::{DomainModel, OtherHasher};
use crate::error::Result;
use crate::settings::QuerySettings;
use crate::translate::{CompiledQueryPlan, HqlTranslator, StandardHqlTranslator};

// ------------- Interpretation cache -------------
// Query text to compiled plan. Bounded but never evicting: once full,
// further plans are handed to the caller without being kept.
pub struct QueryInterpretationCache {
    plans: RwLock<HashMap<String, Arc<CompiledQueryPlan>, OtherHasher>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl QueryInterpretationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            plans: RwLock::new(HashMap::default()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
    // Read lock probe first; interpretation runs with no lock held, so
    // two racing callers may both interpret the same text. Last write
    // wins and both callers get a usable plan.
    pub fn resolve_hql_interpretation<F>(
        &self,
        hql: &str,
        interpret: F,
    ) -> Result<Arc<CompiledQueryPlan>>
    where
        F: FnOnce(&str) -> Result<CompiledQueryPlan>,
    {
        if let Some(plan) = self.plans.read().unwrap().get(hql) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(plan));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let plan = Arc::new(interpret(hql)?);
        let mut plans = self.plans.write().unwrap();
        if plans.len() < self.capacity || plans.contains_key(hql) {
            plans.insert(String::from(hql), Arc::clone(&plan));
        }
        Ok(plan)
    }
    pub fn cached(&self, hql: &str) -> Option<Arc<CompiledQueryPlan>> {
        self.plans.read().unwrap().get(hql).cloned()
    }
    pub fn len(&self) -> usize {
        self.plans.read().unwrap().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn clear(&self) {
        self.plans.write().unwrap().clear();
    }
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

// ------------- Query engine -------------
// Ties the domain model, the translator and the interpretation cache
// together. Everything the repository needs to resolve and check
// queries hangs off this one value.
pub struct QueryEngine {
    settings: QuerySettings,
    model: Arc<DomainModel>,
    translator: Arc<dyn HqlTranslator>,
    interpretation_cache: QueryInterpretationCache,
}
impl QueryEngine {
    pub fn new(model: DomainModel, settings: QuerySettings) -> Self {
        let model = Arc::new(model);
        let translator: Arc<dyn HqlTranslator> = Arc::new(StandardHqlTranslator::new(&model));
        let interpretation_cache =
            QueryInterpretationCache::new(settings.interpretation_cache_capacity);
        Self {
            settings,
            model,
            translator,
            interpretation_cache,
        }
    }
    pub fn with_translator(
        model: DomainModel,
        settings: QuerySettings,
        translator: Arc<dyn HqlTranslator>,
    ) -> Self {
        let interpretation_cache =
            QueryInterpretationCache::new(settings.interpretation_cache_capacity);
        Self {
            settings,
            model: Arc::new(model),
            translator,
            interpretation_cache,
        }
    }
    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }
    pub fn domain_model(&self) -> &Arc<DomainModel> {
        &self.model
    }
    pub fn translator(&self) -> &Arc<dyn HqlTranslator> {
        &self.translator
    }
    pub fn interpretation_cache(&self) -> &QueryInterpretationCache {
        &self.interpretation_cache
    }
    pub fn translate(&self, hql: &str, expected_result: Option<&str>) -> Result<CompiledQueryPlan> {
        let plan = self.translator.translate(hql, expected_result)?;
        if self.settings.log_translations {
            debug!(hql = plan.hql(), sql = plan.sql(), "translated query");
        }
        Ok(plan)
    }
}
