use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// ------------- NavigablePath -------------
// The logical dotted attribute path from a query root down to a node.
// Paths identify nodes for display and diagnostics; structural identity
// during copying is tracked by pointer, never by path.
#[derive(Debug)]
pub struct NavigablePath {
    parent: Option<Arc<NavigablePath>>,
    local_name: String,
    alias: Option<String>,
    full: String,
}
impl NavigablePath {
    pub fn root(name: &str, alias: Option<&str>) -> Arc<NavigablePath> {
        Arc::new(Self {
            parent: None,
            local_name: String::from(name),
            alias: alias.map(String::from),
            full: String::from(name),
        })
    }
    pub fn append(self: &Arc<Self>, attribute: &str) -> Arc<NavigablePath> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            local_name: String::from(attribute),
            alias: None,
            full: format!("{}.{}", self.full, attribute),
        })
    }
    // Annotates this path with a type narrowing marker. The target name
    // becomes part of the rendering, the alias part of the identity.
    pub fn treat_as(self: &Arc<Self>, entity_name: &str, alias: Option<&str>) -> Arc<NavigablePath> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            local_name: String::from(entity_name),
            alias: alias.map(String::from),
            full: format!("treat({} as {})", self.full, entity_name),
        })
    }
    pub fn parent(&self) -> Option<&Arc<NavigablePath>> {
        self.parent.as_ref()
    }
    pub fn local_name(&self) -> &str {
        &self.local_name
    }
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
    pub fn full(&self) -> &str {
        &self.full
    }
}
impl PartialEq for NavigablePath {
    fn eq(&self, other: &Self) -> bool {
        self.full == other.full && self.alias == other.alias
    }
}
impl Eq for NavigablePath {}
impl Hash for NavigablePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full.hash(state);
        self.alias.hash(state);
    }
}
impl fmt::Display for NavigablePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.full)
    }
}
