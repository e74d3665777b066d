
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::OtherHasher;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Error in query '{query}': {message}")]
    Interpretation { query: String, message: String },
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
    #[error("Unknown attribute '{attribute}' of entity '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },
    #[error("Attribute '{attribute}' of entity '{entity}' is not an association")]
    NotAssociation { entity: String, attribute: String },
    // "source" is off limits as a field name here, thiserror would take
    // it for a wrapped error
    #[error("Cannot treat '{treated}' as '{target}'")]
    InvalidTreat { treated: String, target: String },
    #[error("Named query definition error: {0}")]
    Boot(String),
    #[error("Unknown result set mapping: {0}")]
    UnknownResultSetMapping(String),
    #[error(transparent)]
    Validation(#[from] NamedQueryValidationError),
}

pub type Result<T> = std::result::Result<T, QueryError>;

// Carries every individual failure so a caller can report all problems in
// one pass instead of fixing named queries one at a time.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct NamedQueryValidationError {
    message: String,
    failures: HashMap<String, QueryError, OtherHasher>,
}

impl NamedQueryValidationError {
    pub fn new(failures: HashMap<String, QueryError, OtherHasher>) -> Self {
        let mut names: Vec<&String> = failures.keys().collect();
        names.sort();
        let mut message = String::from("Errors in named queries: ");
        for (i, name) in names.iter().enumerate() {
            message.push_str(&format!(
                "\n  [{}] Error in query named '{}': {}",
                i + 1,
                name,
                failures.get(*name).unwrap()
            ));
        }
        Self { message, failures }
    }
    pub fn failures(&self) -> &HashMap<String, QueryError, OtherHasher> {
        &self.failures
    }
}
