use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::domain::{DomainModel, EntityType, NodeHasher};
use crate::error::{QueryError, Result};
use crate::path::NavigablePath;

// ------------- JoinKind -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}
impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "inner"),
            JoinKind::Left => write!(f, "left"),
            JoinKind::Right => write!(f, "right"),
            JoinKind::Full => write!(f, "full"),
        }
    }
}

// ------------- From nodes -------------
// A closed set of variants instead of an open class hierarchy. Nodes are
// shared as Arc<SqmFrom> and immutable once built; the join predicate slot
// is the single write-once decoration applied after construction.
#[derive(Debug)]
pub enum SqmFrom {
    Root(SqmRoot),
    EntityJoin(SqmEntityJoin),
    AttributeJoin(SqmAttributeJoin),
    TreatedJoin(SqmTreatedJoin),
}

#[derive(Debug)]
pub struct SqmRoot {
    path: Arc<NavigablePath>,
    entity: Arc<EntityType>,
    alias: Option<String>,
}

#[derive(Debug)]
pub struct SqmEntityJoin {
    path: Arc<NavigablePath>,
    entity: Arc<EntityType>,
    alias: Option<String>,
    kind: JoinKind,
    on: OnceLock<SqmPredicate>,
}

#[derive(Debug)]
pub struct SqmAttributeJoin {
    path: Arc<NavigablePath>,
    lhs: Arc<SqmFrom>,
    attribute: String,
    entity: Arc<EntityType>,
    alias: Option<String>,
    kind: JoinKind,
    fetched: bool,
    on: OnceLock<SqmPredicate>,
}

// A type narrowing view over a join it wraps. The static type of the
// treated node is the subtype, not the wrapped node's type.
#[derive(Debug)]
pub struct SqmTreatedJoin {
    path: Arc<NavigablePath>,
    wrapped: Arc<SqmFrom>,
    treat_target: Arc<EntityType>,
    alias: Option<String>,
    on: OnceLock<SqmPredicate>,
}

impl SqmFrom {
    pub fn root(entity: &Arc<EntityType>, alias: Option<&str>) -> Arc<SqmFrom> {
        Arc::new(SqmFrom::Root(SqmRoot {
            path: NavigablePath::root(entity.name(), alias),
            entity: Arc::clone(entity),
            alias: alias.map(String::from),
        }))
    }
    pub fn entity_join(
        entity: &Arc<EntityType>,
        kind: JoinKind,
        alias: Option<&str>,
    ) -> Arc<SqmFrom> {
        Arc::new(SqmFrom::EntityJoin(SqmEntityJoin {
            path: NavigablePath::root(entity.name(), alias),
            entity: Arc::clone(entity),
            alias: alias.map(String::from),
            kind,
            on: OnceLock::new(),
        }))
    }
    pub fn attribute_join(
        lhs: &Arc<SqmFrom>,
        attribute: &str,
        model: &DomainModel,
        kind: JoinKind,
        alias: Option<&str>,
        fetched: bool,
    ) -> Result<Arc<SqmFrom>> {
        let source_type = lhs.node_type();
        let attr =
            source_type
                .attribute(attribute)
                .ok_or_else(|| QueryError::UnknownAttribute {
                    entity: String::from(source_type.name()),
                    attribute: String::from(attribute),
                })?;
        let target_name = attr
            .association_target()
            .ok_or_else(|| QueryError::NotAssociation {
                entity: String::from(source_type.name()),
                attribute: String::from(attribute),
            })?;
        let target = model
            .entity(target_name)
            .ok_or_else(|| QueryError::UnknownEntity(String::from(target_name)))?;
        Ok(Arc::new(SqmFrom::AttributeJoin(SqmAttributeJoin {
            path: lhs.path().append(attribute),
            lhs: Arc::clone(lhs),
            attribute: String::from(attribute),
            entity: Arc::clone(target),
            alias: alias.map(String::from),
            kind,
            fetched,
            on: OnceLock::new(),
        })))
    }
    // Only joins can be narrowed, and only towards a subtype of what the
    // wrapped join already produces.
    pub fn treated_join(
        wrapped: &Arc<SqmFrom>,
        treat_target: &Arc<EntityType>,
        alias: Option<&str>,
    ) -> Result<Arc<SqmFrom>> {
        match wrapped.as_ref() {
            SqmFrom::EntityJoin(_) | SqmFrom::AttributeJoin(_) => (),
            _ => {
                return Err(QueryError::InvalidTreat {
                    treated: String::from(wrapped.path().full()),
                    target: String::from(treat_target.name()),
                });
            }
        }
        let wrapped_type = wrapped.node_type();
        if !treat_target.is_subtype_of(wrapped_type) {
            return Err(QueryError::InvalidTreat {
                treated: String::from(wrapped_type.name()),
                target: String::from(treat_target.name()),
            });
        }
        Ok(Arc::new(SqmFrom::TreatedJoin(SqmTreatedJoin {
            path: wrapped.path().treat_as(treat_target.name(), alias),
            wrapped: Arc::clone(wrapped),
            treat_target: Arc::clone(treat_target),
            alias: alias.map(String::from),
            on: OnceLock::new(),
        })))
    }

    pub fn path(&self) -> &Arc<NavigablePath> {
        match self {
            SqmFrom::Root(root) => &root.path,
            SqmFrom::EntityJoin(join) => &join.path,
            SqmFrom::AttributeJoin(join) => &join.path,
            SqmFrom::TreatedJoin(treated) => &treated.path,
        }
    }
    pub fn alias(&self) -> Option<&str> {
        match self {
            SqmFrom::Root(root) => root.alias.as_deref(),
            SqmFrom::EntityJoin(join) => join.alias.as_deref(),
            SqmFrom::AttributeJoin(join) => join.alias.as_deref(),
            SqmFrom::TreatedJoin(treated) => treated.alias.as_deref(),
        }
    }
    // The effective static type of the node. A treated join resolves to
    // its narrowing target, everything else to the joined entity.
    pub fn node_type(&self) -> &Arc<EntityType> {
        match self {
            SqmFrom::Root(root) => &root.entity,
            SqmFrom::EntityJoin(join) => &join.entity,
            SqmFrom::AttributeJoin(join) => &join.entity,
            SqmFrom::TreatedJoin(treated) => &treated.treat_target,
        }
    }
    pub fn join_kind(&self) -> Option<JoinKind> {
        match self {
            SqmFrom::Root(_) => None,
            SqmFrom::EntityJoin(join) => Some(join.kind),
            SqmFrom::AttributeJoin(join) => Some(join.kind),
            SqmFrom::TreatedJoin(treated) => treated.wrapped.join_kind(),
        }
    }
    pub fn fetched(&self) -> bool {
        match self {
            SqmFrom::AttributeJoin(join) => join.fetched,
            SqmFrom::TreatedJoin(treated) => treated.wrapped.fetched(),
            _ => false,
        }
    }
    pub fn wrapped(&self) -> Option<&Arc<SqmFrom>> {
        match self {
            SqmFrom::TreatedJoin(treated) => Some(&treated.wrapped),
            _ => None,
        }
    }
    pub fn treat_target(&self) -> Option<&Arc<EntityType>> {
        match self {
            SqmFrom::TreatedJoin(treated) => Some(&treated.treat_target),
            _ => None,
        }
    }
    pub fn attribute(&self) -> Option<&str> {
        match self {
            SqmFrom::AttributeJoin(join) => Some(&join.attribute),
            _ => None,
        }
    }
    pub fn lhs(&self) -> Option<&Arc<SqmFrom>> {
        match self {
            SqmFrom::AttributeJoin(join) => Some(&join.lhs),
            _ => None,
        }
    }
    // How the node is referred to from within query text: the explicit
    // alias when one was given, the logical path otherwise.
    pub fn reference_name(&self) -> &str {
        match self.alias() {
            Some(alias) => alias,
            None => self.path().full(),
        }
    }

    fn on_slot(&self) -> Option<&OnceLock<SqmPredicate>> {
        match self {
            SqmFrom::Root(_) => None,
            SqmFrom::EntityJoin(join) => Some(&join.on),
            SqmFrom::AttributeJoin(join) => Some(&join.on),
            SqmFrom::TreatedJoin(treated) => Some(&treated.on),
        }
    }
    // Write-once decoration. Returns false when the node takes no join
    // predicate (roots) or one was already set.
    pub fn set_join_predicate(&self, predicate: SqmPredicate) -> bool {
        match self.on_slot() {
            Some(slot) => slot.set(predicate).is_ok(),
            None => false,
        }
    }
    // A treat that was given no condition of its own answers with the
    // wrapped join's, like join_kind and fetched.
    pub fn join_predicate(&self) -> Option<&SqmPredicate> {
        match self {
            SqmFrom::TreatedJoin(treated) => treated
                .on
                .get()
                .or_else(|| treated.wrapped.join_predicate()),
            _ => self.on_slot().and_then(|slot| slot.get()),
        }
    }

    // Structural copy with identity memoization. The context is the single
    // source of truth for "has this node been copied yet": an original
    // referenced twice yields one copy referenced twice. Inputs (the lhs
    // or wrapped node) are copied before the new node is built, the new
    // node is registered before its decorations are copied, since a join
    // predicate may refer back to the node being copied.
    pub fn copy(self: &Arc<Self>, context: &mut SqmCopyContext) -> Arc<SqmFrom> {
        if let Some(existing) = context.get_copy(self) {
            return existing;
        }
        let copy = match self.as_ref() {
            SqmFrom::Root(root) => context.register_copy(
                self,
                Arc::new(SqmFrom::Root(SqmRoot {
                    path: Arc::clone(&root.path),
                    entity: Arc::clone(&root.entity),
                    alias: root.alias.clone(),
                })),
            ),
            SqmFrom::EntityJoin(join) => context.register_copy(
                self,
                Arc::new(SqmFrom::EntityJoin(SqmEntityJoin {
                    path: Arc::clone(&join.path),
                    entity: Arc::clone(&join.entity),
                    alias: join.alias.clone(),
                    kind: join.kind,
                    on: OnceLock::new(),
                })),
            ),
            SqmFrom::AttributeJoin(join) => {
                let lhs = join.lhs.copy(context);
                context.register_copy(
                    self,
                    Arc::new(SqmFrom::AttributeJoin(SqmAttributeJoin {
                        path: Arc::clone(&join.path),
                        lhs,
                        attribute: join.attribute.clone(),
                        entity: Arc::clone(&join.entity),
                        alias: join.alias.clone(),
                        kind: join.kind,
                        fetched: join.fetched,
                        on: OnceLock::new(),
                    })),
                )
            }
            SqmFrom::TreatedJoin(treated) => {
                let wrapped = treated.wrapped.copy(context);
                context.register_copy(
                    self,
                    Arc::new(SqmFrom::TreatedJoin(SqmTreatedJoin {
                        path: Arc::clone(&treated.path),
                        wrapped,
                        treat_target: Arc::clone(&treated.treat_target),
                        alias: treated.alias.clone(),
                        on: OnceLock::new(),
                    })),
                )
            }
        };
        // own slot only: a treat answering with the wrapped join's
        // condition has nothing of its own to carry over
        if let Some(on) = self.on_slot().and_then(|slot| slot.get()) {
            if let Some(slot) = copy.on_slot() {
                let _ = slot.set(on.copy(context));
            }
        }
        copy
    }

    pub fn render_hql(&self, sb: &mut String) {
        match self {
            SqmFrom::Root(root) => sb.push_str(root.entity.name()),
            SqmFrom::EntityJoin(join) => sb.push_str(join.entity.name()),
            SqmFrom::AttributeJoin(join) => {
                sb.push_str(join.lhs.reference_name());
                sb.push('.');
                sb.push_str(&join.attribute);
            }
            SqmFrom::TreatedJoin(treated) => {
                sb.push_str("treat(");
                treated.wrapped.render_hql(sb);
                sb.push_str(" as ");
                sb.push_str(treated.treat_target.name());
                sb.push(')');
            }
        }
    }
}
impl fmt::Display for SqmFrom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut sb = String::new();
        self.render_hql(&mut sb);
        write!(f, "{}", sb)
    }
}

// ------------- Copy context -------------
// Transient identity map for one copy pass. Keys are the pointer identity
// of the original node, never its path: two distinct nodes may share a
// logical path, yet must copy separately.
pub struct SqmCopyContext {
    copies: HashMap<usize, Arc<SqmFrom>, NodeHasher>,
}
impl SqmCopyContext {
    pub fn new() -> Self {
        Self {
            copies: HashMap::default(),
        }
    }
    pub fn get_copy(&self, original: &Arc<SqmFrom>) -> Option<Arc<SqmFrom>> {
        self.copies.get(&(Arc::as_ptr(original) as usize)).cloned()
    }
    pub fn register_copy(&mut self, original: &Arc<SqmFrom>, copy: Arc<SqmFrom>) -> Arc<SqmFrom> {
        let previous = self
            .copies
            .insert(Arc::as_ptr(original) as usize, Arc::clone(&copy));
        debug_assert!(
            previous.is_none(),
            "from node registered twice within one copy pass"
        );
        copy
    }
    pub fn len(&self) -> usize {
        self.copies.len()
    }
}
impl Default for SqmCopyContext {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Expressions -------------
#[derive(Debug, Clone, PartialEq)]
pub enum SqmLiteral {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqmParameter {
    Named(String),
    Positional(usize),
}

#[derive(Debug)]
pub struct SqmPath {
    lhs: Arc<SqmFrom>,
    attribute: String,
    path: Arc<NavigablePath>,
}
impl SqmPath {
    pub fn new(lhs: &Arc<SqmFrom>, attribute: &str) -> Result<SqmPath> {
        let source_type = lhs.node_type();
        if source_type.attribute(attribute).is_none() {
            return Err(QueryError::UnknownAttribute {
                entity: String::from(source_type.name()),
                attribute: String::from(attribute),
            });
        }
        Ok(SqmPath {
            lhs: Arc::clone(lhs),
            attribute: String::from(attribute),
            path: lhs.path().append(attribute),
        })
    }
    pub fn lhs(&self) -> &Arc<SqmFrom> {
        &self.lhs
    }
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
    pub fn path(&self) -> &Arc<NavigablePath> {
        &self.path
    }
    pub fn copy(&self, context: &mut SqmCopyContext) -> SqmPath {
        SqmPath {
            lhs: self.lhs.copy(context),
            attribute: self.attribute.clone(),
            path: Arc::clone(&self.path),
        }
    }
    pub fn render_hql(&self, sb: &mut String) {
        sb.push_str(self.lhs.reference_name());
        sb.push('.');
        sb.push_str(&self.attribute);
    }
}

#[derive(Debug)]
pub enum SqmExpression {
    From(Arc<SqmFrom>),
    Path(SqmPath),
    Literal(SqmLiteral),
    Parameter(SqmParameter),
}
impl SqmExpression {
    pub fn copy(&self, context: &mut SqmCopyContext) -> SqmExpression {
        match self {
            SqmExpression::From(node) => SqmExpression::From(node.copy(context)),
            SqmExpression::Path(path) => SqmExpression::Path(path.copy(context)),
            SqmExpression::Literal(literal) => SqmExpression::Literal(literal.clone()),
            SqmExpression::Parameter(parameter) => SqmExpression::Parameter(parameter.clone()),
        }
    }
    pub fn render_hql(&self, sb: &mut String) {
        match self {
            SqmExpression::From(node) => sb.push_str(node.reference_name()),
            SqmExpression::Path(path) => path.render_hql(sb),
            SqmExpression::Literal(literal) => match literal {
                SqmLiteral::String(s) => {
                    sb.push('\'');
                    sb.push_str(&s.replace('\'', "''"));
                    sb.push('\'');
                }
                SqmLiteral::Integer(i) => sb.push_str(&i.to_string()),
                SqmLiteral::Float(x) => sb.push_str(&x.to_string()),
                SqmLiteral::Boolean(b) => sb.push_str(if *b { "true" } else { "false" }),
            },
            SqmExpression::Parameter(parameter) => match parameter {
                SqmParameter::Named(name) => {
                    sb.push(':');
                    sb.push_str(name);
                }
                SqmParameter::Positional(position) => {
                    sb.push('?');
                    sb.push_str(&position.to_string());
                }
            },
        }
    }
}

// ------------- Predicates -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}
impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComparisonOp::Eq => write!(f, "="),
            ComparisonOp::Ne => write!(f, "!="),
            ComparisonOp::Gt => write!(f, ">"),
            ComparisonOp::Ge => write!(f, ">="),
            ComparisonOp::Lt => write!(f, "<"),
            ComparisonOp::Le => write!(f, "<="),
            ComparisonOp::Like => write!(f, "like"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionKind {
    And,
    Or,
}
impl fmt::Display for JunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JunctionKind::And => write!(f, "and"),
            JunctionKind::Or => write!(f, "or"),
        }
    }
}

#[derive(Debug)]
pub enum SqmPredicate {
    Comparison {
        lhs: SqmExpression,
        op: ComparisonOp,
        rhs: SqmExpression,
    },
    Junction {
        kind: JunctionKind,
        predicates: Vec<SqmPredicate>,
    },
    IsNull {
        path: SqmPath,
        negated: bool,
    },
}
impl SqmPredicate {
    pub fn copy(&self, context: &mut SqmCopyContext) -> SqmPredicate {
        match self {
            SqmPredicate::Comparison { lhs, op, rhs } => SqmPredicate::Comparison {
                lhs: lhs.copy(context),
                op: *op,
                rhs: rhs.copy(context),
            },
            SqmPredicate::Junction { kind, predicates } => SqmPredicate::Junction {
                kind: *kind,
                predicates: predicates.iter().map(|p| p.copy(context)).collect(),
            },
            SqmPredicate::IsNull { path, negated } => SqmPredicate::IsNull {
                path: path.copy(context),
                negated: *negated,
            },
        }
    }
    pub fn render_hql(&self, sb: &mut String) {
        match self {
            SqmPredicate::Comparison { lhs, op, rhs } => {
                lhs.render_hql(sb);
                sb.push(' ');
                sb.push_str(&op.to_string());
                sb.push(' ');
                rhs.render_hql(sb);
            }
            SqmPredicate::Junction { kind, predicates } => {
                sb.push('(');
                for (i, predicate) in predicates.iter().enumerate() {
                    if i > 0 {
                        sb.push(' ');
                        sb.push_str(&kind.to_string());
                        sb.push(' ');
                    }
                    predicate.render_hql(sb);
                }
                sb.push(')');
            }
            SqmPredicate::IsNull { path, negated } => {
                path.render_hql(sb);
                sb.push_str(if *negated { " is not null" } else { " is null" });
            }
        }
    }
}

// ------------- Select statement -------------
#[derive(Debug)]
pub struct SqmSelectStatement {
    root: Arc<SqmFrom>,
    joins: Vec<Arc<SqmFrom>>,
    selections: Vec<SqmExpression>,
    predicate: Option<SqmPredicate>,
}
impl SqmSelectStatement {
    pub fn new(root: Arc<SqmFrom>) -> Self {
        Self {
            root,
            joins: Vec::new(),
            selections: Vec::new(),
            predicate: None,
        }
    }
    pub fn add_join(&mut self, join: Arc<SqmFrom>) {
        self.joins.push(join);
    }
    pub fn add_selection(&mut self, selection: SqmExpression) {
        self.selections.push(selection);
    }
    pub fn set_predicate(&mut self, predicate: SqmPredicate) {
        self.predicate = Some(predicate);
    }
    pub fn root(&self) -> &Arc<SqmFrom> {
        &self.root
    }
    pub fn joins(&self) -> &[Arc<SqmFrom>] {
        &self.joins
    }
    pub fn selections(&self) -> &[SqmExpression] {
        &self.selections
    }
    pub fn predicate(&self) -> Option<&SqmPredicate> {
        self.predicate.as_ref()
    }

    // Whole tree copy through a fresh context. Two copies made through
    // two invocations share no nodes with each other or the original.
    pub fn copy(&self) -> SqmSelectStatement {
        let mut context = SqmCopyContext::new();
        let root = self.root.copy(&mut context);
        let joins = self.joins.iter().map(|j| j.copy(&mut context)).collect();
        let selections = self
            .selections
            .iter()
            .map(|s| s.copy(&mut context))
            .collect();
        let predicate = self.predicate.as_ref().map(|p| p.copy(&mut context));
        SqmSelectStatement {
            root,
            joins,
            selections,
            predicate,
        }
    }

    pub fn render_hql(&self) -> String {
        let mut sb = String::from("select ");
        if self.selections.is_empty() {
            sb.push_str(self.root.reference_name());
        } else {
            for (i, selection) in self.selections.iter().enumerate() {
                if i > 0 {
                    sb.push_str(", ");
                }
                selection.render_hql(&mut sb);
            }
        }
        sb.push_str(" from ");
        self.root.render_hql(&mut sb);
        if let Some(alias) = self.root.alias() {
            sb.push(' ');
            sb.push_str(alias);
        }
        for join in &self.joins {
            sb.push(' ');
            sb.push_str(&join.join_kind().unwrap_or(JoinKind::Inner).to_string());
            sb.push_str(" join ");
            if join.fetched() {
                sb.push_str("fetch ");
            }
            join.render_hql(&mut sb);
            if let Some(alias) = join.alias() {
                sb.push(' ');
                sb.push_str(alias);
            }
            if let Some(on) = join.join_predicate() {
                sb.push_str(" on ");
                on.render_hql(&mut sb);
            }
        }
        if let Some(predicate) = &self.predicate {
            sb.push_str(" where ");
            predicate.render_hql(&mut sb);
        }
        sb
    }
}
impl fmt::Display for SqmSelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render_hql())
    }
}
