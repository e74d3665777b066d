use std::sync::Arc;

// string keyed maps use a fast non-cryptographic hasher
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::HashMap;

// used to print out readable forms of the domain constructs
use std::fmt;

use serde::Deserialize;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;
pub type NodeHasher = BuildHasherDefault<SeaHasher>;

// ------------- BasicKind -------------
// Type tags only. The engine never carries values, it plans over shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum BasicKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
}
impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BasicKind::String => write!(f, "String"),
            BasicKind::Integer => write!(f, "Integer"),
            BasicKind::Float => write!(f, "Float"),
            BasicKind::Boolean => write!(f, "Boolean"),
            BasicKind::Date => write!(f, "Date"),
        }
    }
}
impl BasicKind {
    pub fn parse(tag: &str) -> Option<BasicKind> {
        match tag {
            "String" => Some(BasicKind::String),
            "Integer" => Some(BasicKind::Integer),
            "Float" => Some(BasicKind::Float),
            "Boolean" => Some(BasicKind::Boolean),
            "Date" => Some(BasicKind::Date),
            _ => None,
        }
    }
}

// ------------- Attribute -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Basic(BasicKind),
    ToOne(String),
    ToMany(String),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
}
impl Attribute {
    pub fn new(name: &str, kind: AttributeKind) -> Self {
        Self {
            name: String::from(name),
            kind,
        }
    }
    // It's intentional to encapsulate the fields in the struct
    // and only expose them using "getters", because this yields
    // true immutability for objects after creation.
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }
    pub fn association_target(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Basic(_) => None,
            AttributeKind::ToOne(target) => Some(target),
            AttributeKind::ToMany(target) => Some(target),
        }
    }
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, AttributeKind::ToMany(_))
    }
}

// ------------- EntityType -------------
#[derive(Debug)]
pub struct EntityType {
    name: String,
    supertype: Option<Arc<EntityType>>,
    attributes: Vec<Attribute>,
}
impl EntityType {
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            supertype: None,
            attributes: Vec::new(),
        }
    }
    pub fn with_supertype(mut self, supertype: &Arc<EntityType>) -> Self {
        self.supertype = Some(Arc::clone(supertype));
        self
    }
    pub fn with_basic(mut self, name: &str, kind: BasicKind) -> Self {
        self.attributes
            .push(Attribute::new(name, AttributeKind::Basic(kind)));
        self
    }
    pub fn with_to_one(mut self, name: &str, target: &str) -> Self {
        self.attributes.push(Attribute::new(
            name,
            AttributeKind::ToOne(String::from(target)),
        ));
        self
    }
    pub fn with_to_many(mut self, name: &str, target: &str) -> Self {
        self.attributes.push(Attribute::new(
            name,
            AttributeKind::ToMany(String::from(target)),
        ));
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn supertype(&self) -> Option<&Arc<EntityType>> {
        self.supertype.as_ref()
    }
    // Attribute lookup walks the supertype chain, so a subtype sees
    // everything its ancestors declare.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        match self.attributes.iter().find(|a| a.name() == name) {
            Some(attribute) => Some(attribute),
            None => match &self.supertype {
                Some(supertype) => supertype.attribute(name),
                None => None,
            },
        }
    }
    pub fn is_subtype_of(&self, other: &EntityType) -> bool {
        if self == other {
            return true;
        }
        let mut ancestor = self.supertype.as_ref();
        while let Some(entity) = ancestor {
            if entity.as_ref() == other {
                return true;
            }
            ancestor = entity.supertype();
        }
        false
    }
}
impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for EntityType {}
impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ------------- DomainModel -------------
#[derive(Debug)]
pub struct DomainModel {
    kept: HashMap<String, Arc<EntityType>, OtherHasher>,
}
impl DomainModel {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
        }
    }
    pub fn add_entity(&mut self, entity: EntityType) -> (Arc<EntityType>, bool) {
        let keepsake = String::from(entity.name());
        let previously_kept = self.kept.contains_key(&keepsake);
        if !previously_kept {
            self.kept.insert(keepsake.clone(), Arc::new(entity));
        }
        (Arc::clone(self.kept.get(&keepsake).unwrap()), previously_kept)
    }
    pub fn entity(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.kept.get(name)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl Default for DomainModel {
    fn default() -> Self {
        Self::new()
    }
}
