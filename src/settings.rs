use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{QueryError, Result};

// ------------- QuerySettings -------------
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    // run the full named query validation after prepare
    pub validate_on_boot: bool,
    // interpreted plans kept at most; further plans are uncached
    pub interpretation_cache_capacity: usize,
    // log every translation at debug level
    pub log_translations: bool,
}
impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            validate_on_boot: true,
            interpretation_cache_capacity: 2048,
            log_translations: false,
        }
    }
}
impl QuerySettings {
    // Layered lookup: file values first when a path is given, then
    // QUIVER_ prefixed environment variables, defaults for the rest.
    pub fn load(path: Option<&str>) -> Result<QuerySettings> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder
            .add_source(Environment::with_prefix("QUIVER"))
            .build()
            .map_err(|err| QueryError::Config(err.to_string()))?
            .try_deserialize()
            .map_err(|err| QueryError::Config(err.to_string()))
    }
}
