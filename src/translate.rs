use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{AttributeKind, BasicKind, DomainModel, EntityType, NodeHasher, OtherHasher};
use crate::error::{QueryError, Result};
use crate::tree::{
    ComparisonOp, JoinKind, JunctionKind, SqmExpression, SqmFrom, SqmLiteral, SqmParameter,
    SqmPath, SqmPredicate, SqmSelectStatement,
};

lazy_static! {
    static ref SELECT_REGEX: Regex =
        Regex::new(r"(?i)^select\s+(?P<selections>.+?)\s+from\s+(?P<from>.+)$").unwrap();
    static ref FROM_ONLY_REGEX: Regex = Regex::new(r"(?i)^from\s+(?P<from>.+)$").unwrap();
    static ref WHERE_SPLIT_REGEX: Regex = Regex::new(r"(?i)\s+where\s+").unwrap();
    static ref JOIN_REGEX: Regex =
        Regex::new(r"(?i)\b(?:(inner|left|right|full)(?:\s+outer)?\s+)?join\b").unwrap();
    static ref FETCH_REGEX: Regex = Regex::new(r"(?i)^fetch\s+").unwrap();
    static ref ON_SPLIT_REGEX: Regex = Regex::new(r"(?i)\s+on\s+").unwrap();
    static ref TREAT_REGEX: Regex = Regex::new(
        r"(?i)^treat\(\s*(?P<path>[^\s\)]+)\s+as\s+(?P<target>[^\s\)]+)\s*\)(?:\s+(?P<alias>\S+))?$"
    )
    .unwrap();
    static ref JUNCTION_REGEX: Regex = Regex::new(r"(?i)\s+(and|or)\s+").unwrap();
    static ref NULLNESS_REGEX: Regex =
        Regex::new(r"(?i)^(?P<path>\S+)\s+is\s+(?P<not>not\s+)?null$").unwrap();
    static ref LIKE_REGEX: Regex =
        Regex::new(r"(?i)^(?P<lhs>\S+)\s+like\s+(?P<rhs>\S+)$").unwrap();
    static ref COMPARISON_REGEX: Regex =
        Regex::new(r"^(?P<lhs>.+?)\s*(?P<op><>|!=|>=|<=|=|>|<)\s*(?P<rhs>.+)$").unwrap();
}

// ------------- Compiled plan -------------
// The durable outcome of one interpretation: source text, the query
// tree, the SQL it lowers to and the named parameters in use order.
// Plans are shared; a caller that wants a mutable tree copies it.
#[derive(Debug)]
pub struct CompiledQueryPlan {
    hql: String,
    sqm: SqmSelectStatement,
    sql: String,
    parameter_names: Vec<String>,
}
impl CompiledQueryPlan {
    pub fn new(
        hql: &str,
        sqm: SqmSelectStatement,
        sql: String,
        parameter_names: Vec<String>,
    ) -> Self {
        Self {
            hql: String::from(hql),
            sqm,
            sql,
            parameter_names,
        }
    }
    pub fn hql(&self) -> &str {
        &self.hql
    }
    pub fn sqm(&self) -> &SqmSelectStatement {
        &self.sqm
    }
    pub fn sql(&self) -> &str {
        &self.sql
    }
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }
}

// ------------- Translator -------------
pub trait HqlTranslator: Send + Sync {
    fn translate(&self, hql: &str, expected_result: Option<&str>) -> Result<CompiledQueryPlan>;
}

pub struct StandardHqlTranslator {
    model: Arc<DomainModel>,
}
impl StandardHqlTranslator {
    const SUBSTITUTE: char = 26 as char;
    const STRIPMARK: char = 15 as char;

    pub fn new(model: &Arc<DomainModel>) -> Self {
        Self {
            model: Arc::clone(model),
        }
    }

    // Replaces every single quoted string with a marker and an index
    // into the returned strip list, collapsing whitespace on the way.
    // A doubled quote inside a string is an escaped quote.
    fn strip(hql: &str) -> Result<(String, Vec<String>)> {
        let mut in_string = false;
        let mut previous_c = Self::SUBSTITUTE;
        let mut stripped = String::new();
        let mut strip = String::new();
        let mut strips: Vec<String> = Vec::new();
        for c in hql.chars() {
            // first determine mode
            if c == '\'' && !in_string {
                in_string = true;
            } else if c == '\'' && previous_c != '\'' && in_string {
                in_string = false;
            }
            // mode dependent push
            if in_string {
                if c == '\'' && previous_c == '\'' {
                    strip.push('\'');
                    previous_c = Self::SUBSTITUTE;
                } else {
                    if c != '\'' {
                        strip.push(c);
                    }
                    previous_c = c;
                }
            } else if c.is_whitespace() && previous_c.is_whitespace() {
                previous_c = c;
            } else {
                if previous_c == '\'' {
                    strips.push(strip);
                    strip = String::new();
                    stripped += &(Self::STRIPMARK.to_string() + &strips.len().to_string());
                }
                if c != '\'' {
                    stripped.push(if c.is_whitespace() { ' ' } else { c });
                }
                previous_c = c;
            }
        }
        if in_string {
            return Err(QueryError::Interpretation {
                query: String::from(hql),
                message: String::from("unterminated string literal"),
            });
        }
        if previous_c == '\'' {
            strips.push(strip);
            stripped += &(Self::STRIPMARK.to_string() + &strips.len().to_string());
        }
        Ok((String::from(stripped.trim()), strips))
    }

    fn translate_inner(&self, hql: &str, expected_result: Option<&str>) -> Result<CompiledQueryPlan> {
        let (stripped, strips) = Self::strip(hql)?;
        let (selections_part, from_part) = if let Some(caps) = SELECT_REGEX.captures(&stripped) {
            (
                Some(caps.name("selections").unwrap().as_str()),
                caps.name("from").unwrap().as_str(),
            )
        } else if let Some(caps) = FROM_ONLY_REGEX.captures(&stripped) {
            (None, caps.name("from").unwrap().as_str())
        } else {
            return Err(QueryError::Interpretation {
                query: String::from(hql),
                message: String::from("only select statements are understood"),
            });
        };
        let (from_part, where_part) = match WHERE_SPLIT_REGEX.find(from_part) {
            Some(found) => (
                &from_part[..found.start()],
                Some(&from_part[found.end()..]),
            ),
            None => (from_part, None),
        };
        let mut interpreter = Interpreter {
            model: self.model.as_ref(),
            strips: &strips,
            hql,
            refs: HashMap::default(),
        };
        let mut statement = interpreter.build_from_clause(from_part)?;
        if let Some(selections_part) = selections_part {
            interpreter.build_selections(&mut statement, selections_part)?;
        }
        if let Some(where_part) = where_part {
            let predicate = interpreter.parse_predicate(where_part)?;
            statement.set_predicate(predicate);
        }
        if let Some(expected) = expected_result {
            interpreter.check_expected_result(&statement, expected)?;
        }
        let mut renderer = SqlRenderer::new();
        let sql = renderer.render_statement(&statement);
        Ok(CompiledQueryPlan::new(hql, statement, sql, renderer.parameters))
    }
}
impl HqlTranslator for StandardHqlTranslator {
    fn translate(&self, hql: &str, expected_result: Option<&str>) -> Result<CompiledQueryPlan> {
        self.translate_inner(hql, expected_result).map_err(|err| match err {
            QueryError::Interpretation { .. } => err,
            other => QueryError::Interpretation {
                query: String::from(hql),
                message: other.to_string(),
            },
        })
    }
}

// ------------- Interpreter -------------
// One interpretation pass over stripped query text. The refs map holds
// every name a later clause may refer to: explicit aliases, plus the
// entity name itself for unaliased roots and entity joins.
struct Interpreter<'a> {
    model: &'a DomainModel,
    strips: &'a [String],
    hql: &'a str,
    refs: HashMap<String, Arc<SqmFrom>, OtherHasher>,
}
impl<'a> Interpreter<'a> {
    fn fail(&self, message: String) -> QueryError {
        QueryError::Interpretation {
            query: String::from(self.hql),
            message,
        }
    }
    fn register_ref(&mut self, key: &str, node: &Arc<SqmFrom>) -> Result<()> {
        if self.refs.contains_key(key) {
            return Err(self.fail(format!("duplicate alias '{}'", key)));
        }
        self.refs.insert(String::from(key), Arc::clone(node));
        Ok(())
    }
    fn resolve_ref(&self, name: &str) -> Result<Arc<SqmFrom>> {
        self.refs
            .get(name)
            .cloned()
            .ok_or_else(|| self.fail(format!("unknown alias or entity '{}'", name)))
    }

    fn build_from_clause(&mut self, text: &str) -> Result<SqmSelectStatement> {
        let mut boundaries: Vec<(usize, usize, JoinKind)> = Vec::new();
        for caps in JOIN_REGEX.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            let kind = match caps.get(1) {
                Some(kind) => match kind.as_str().to_lowercase().as_str() {
                    "left" => JoinKind::Left,
                    "right" => JoinKind::Right,
                    "full" => JoinKind::Full,
                    _ => JoinKind::Inner,
                },
                None => JoinKind::Inner,
            };
            boundaries.push((whole.start(), whole.end(), kind));
        }
        let root_decl = match boundaries.first() {
            Some((start, _, _)) => &text[..*start],
            None => text,
        };
        let mut decl = root_decl.split_whitespace();
        let entity_name = decl
            .next()
            .ok_or_else(|| self.fail(String::from("missing root entity")))?;
        let alias = decl.next();
        if decl.next().is_some() {
            return Err(self.fail(format!("unrecognized from clause '{}'", root_decl.trim())));
        }
        let entity = self
            .model
            .entity(entity_name)
            .ok_or_else(|| QueryError::UnknownEntity(String::from(entity_name)))?;
        let root = SqmFrom::root(entity, alias);
        self.register_ref(alias.unwrap_or(entity_name), &root)?;
        let mut statement = SqmSelectStatement::new(root);
        for (i, (_, end, kind)) in boundaries.iter().enumerate() {
            let body_end = match boundaries.get(i + 1) {
                Some((next_start, _, _)) => *next_start,
                None => text.len(),
            };
            self.build_join(&mut statement, *kind, &text[*end..body_end])?;
        }
        Ok(statement)
    }

    fn build_join(
        &mut self,
        statement: &mut SqmSelectStatement,
        kind: JoinKind,
        body: &str,
    ) -> Result<()> {
        let mut body = body.trim();
        let mut fetched = false;
        if let Some(found) = FETCH_REGEX.find(body) {
            fetched = true;
            body = &body[found.end()..];
        }
        let (decl, on_text) = match ON_SPLIT_REGEX.find(body) {
            Some(found) => (&body[..found.start()], Some(&body[found.end()..])),
            None => (body, None),
        };
        let decl = decl.trim();
        // a treat target contains spaces, so it is matched whole before
        // the declaration is split into target and alias
        let (node, alias) = if let Some(caps) = TREAT_REGEX.captures(decl) {
            let inner_path = caps.name("path").unwrap().as_str();
            let target_name = caps.name("target").unwrap().as_str();
            let alias = caps.name("alias").map(|found| found.as_str());
            let wrapped = self.join_target(statement, inner_path, kind, fetched, None)?;
            let treat_entity = self
                .model
                .entity(target_name)
                .ok_or_else(|| QueryError::UnknownEntity(String::from(target_name)))?;
            (SqmFrom::treated_join(&wrapped, treat_entity, alias)?, alias)
        } else {
            let mut parts = decl.split_whitespace();
            let target = parts
                .next()
                .ok_or_else(|| self.fail(String::from("missing join target")))?;
            let alias = parts.next();
            if parts.next().is_some() {
                return Err(self.fail(format!("unrecognized join '{}'", decl)));
            }
            (self.join_target(statement, target, kind, fetched, alias)?, alias)
        };
        match alias {
            Some(alias) => self.register_ref(alias, &node)?,
            None => {
                if matches!(node.as_ref(), SqmFrom::EntityJoin(_)) {
                    let name = String::from(node.node_type().name());
                    self.register_ref(&name, &node)?;
                }
            }
        }
        if let Some(on_text) = on_text {
            let predicate = self.parse_predicate(on_text)?;
            node.set_join_predicate(predicate);
        }
        statement.add_join(node);
        Ok(())
    }

    // A dotted target walks the attribute chain, materializing one join
    // per hop. Only the last hop carries the alias and the fetch flag;
    // intermediate joins go straight into the statement. The final node
    // is returned unadded so a treat can wrap it first.
    fn join_target(
        &mut self,
        statement: &mut SqmSelectStatement,
        target: &str,
        kind: JoinKind,
        fetched: bool,
        alias: Option<&str>,
    ) -> Result<Arc<SqmFrom>> {
        match target.split_once('.') {
            None => {
                if fetched {
                    return Err(self.fail(format!("entity join '{}' cannot be fetched", target)));
                }
                let entity = self
                    .model
                    .entity(target)
                    .ok_or_else(|| QueryError::UnknownEntity(String::from(target)))?;
                Ok(SqmFrom::entity_join(entity, kind, alias))
            }
            Some((base, hops)) => {
                let mut node = self.resolve_ref(base)?;
                let hop_list: Vec<&str> = hops.split('.').collect();
                for (i, hop) in hop_list.iter().enumerate() {
                    let last = i == hop_list.len() - 1;
                    let join = SqmFrom::attribute_join(
                        &node,
                        hop,
                        self.model,
                        kind,
                        if last { alias } else { None },
                        fetched && last,
                    )?;
                    if !last {
                        statement.add_join(Arc::clone(&join));
                    }
                    node = join;
                }
                Ok(node)
            }
        }
    }

    fn build_selections(&self, statement: &mut SqmSelectStatement, text: &str) -> Result<()> {
        for raw in text.split(',') {
            let selection = raw.trim();
            if selection.is_empty() {
                return Err(self.fail(String::from("empty selection")));
            }
            let expression = match selection.split_once('.') {
                None => SqmExpression::From(self.resolve_ref(selection)?),
                Some((base, attribute)) => {
                    if attribute.contains('.') {
                        return Err(
                            self.fail(format!("unsupported selection path '{}'", selection))
                        );
                    }
                    let lhs = self.resolve_ref(base)?;
                    SqmExpression::Path(SqmPath::new(&lhs, attribute)?)
                }
            };
            statement.add_selection(expression);
        }
        Ok(())
    }

    fn parse_predicate(&self, text: &str) -> Result<SqmPredicate> {
        let mut atoms: Vec<&str> = Vec::new();
        let mut kinds: Vec<JunctionKind> = Vec::new();
        let mut last = 0;
        for caps in JUNCTION_REGEX.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            atoms.push(&text[last..whole.start()]);
            let word = caps.get(1).unwrap().as_str();
            kinds.push(if word.eq_ignore_ascii_case("and") {
                JunctionKind::And
            } else {
                JunctionKind::Or
            });
            last = whole.end();
        }
        atoms.push(&text[last..]);
        if kinds.is_empty() {
            return self.parse_atom(atoms[0]);
        }
        let kind = kinds[0];
        if kinds.iter().any(|k| *k != kind) {
            return Err(self.fail(String::from("mixed and/or conditions are ambiguous")));
        }
        let predicates = atoms
            .iter()
            .map(|atom| self.parse_atom(atom))
            .collect::<Result<Vec<_>>>()?;
        Ok(SqmPredicate::Junction { kind, predicates })
    }

    fn parse_atom(&self, text: &str) -> Result<SqmPredicate> {
        let text = text.trim();
        if let Some(caps) = NULLNESS_REGEX.captures(text) {
            let path = self.parse_path(caps.name("path").unwrap().as_str())?;
            return Ok(SqmPredicate::IsNull {
                path,
                negated: caps.name("not").is_some(),
            });
        }
        if let Some(caps) = LIKE_REGEX.captures(text) {
            let lhs = SqmExpression::Path(self.parse_path(caps.name("lhs").unwrap().as_str())?);
            let rhs = self.parse_operand(caps.name("rhs").unwrap().as_str())?;
            return Ok(SqmPredicate::Comparison {
                lhs,
                op: ComparisonOp::Like,
                rhs,
            });
        }
        if let Some(caps) = COMPARISON_REGEX.captures(text) {
            let op = match caps.name("op").unwrap().as_str() {
                "=" => ComparisonOp::Eq,
                "!=" | "<>" => ComparisonOp::Ne,
                ">" => ComparisonOp::Gt,
                ">=" => ComparisonOp::Ge,
                "<" => ComparisonOp::Lt,
                _ => ComparisonOp::Le,
            };
            let lhs =
                SqmExpression::Path(self.parse_path(caps.name("lhs").unwrap().as_str().trim())?);
            let rhs = self.parse_operand(caps.name("rhs").unwrap().as_str().trim())?;
            return Ok(SqmPredicate::Comparison { lhs, op, rhs });
        }
        Err(self.fail(format!("unrecognized condition '{}'", text)))
    }

    fn parse_path(&self, text: &str) -> Result<SqmPath> {
        let Some((base, attribute)) = text.split_once('.') else {
            return Err(self.fail(format!("expected an attribute path, got '{}'", text)));
        };
        if attribute.contains('.') {
            return Err(self.fail(format!("unsupported nested path '{}'", text)));
        }
        let lhs = self.resolve_ref(base)?;
        SqmPath::new(&lhs, attribute)
    }

    fn parse_operand(&self, text: &str) -> Result<SqmExpression> {
        if text.starts_with(StandardHqlTranslator::STRIPMARK) {
            let index: usize = text
                .replace(StandardHqlTranslator::STRIPMARK, "")
                .parse()
                .map_err(|_| self.fail(format!("unrecognized value '{}'", text)))?;
            // marks count from one; a raw mark in hostile text can carry
            // any index, zero included
            let value = index
                .checked_sub(1)
                .and_then(|i| self.strips.get(i))
                .ok_or_else(|| self.fail(format!("unrecognized value '{}'", text)))?;
            return Ok(SqmExpression::Literal(SqmLiteral::String(value.clone())));
        }
        if let Some(name) = text.strip_prefix(':') {
            if name.is_empty() {
                return Err(self.fail(String::from("named parameter without a name")));
            }
            return Ok(SqmExpression::Parameter(SqmParameter::Named(String::from(
                name,
            ))));
        }
        if let Some(position) = text.strip_prefix('?') {
            let position: usize = position
                .parse()
                .map_err(|_| self.fail(format!("unrecognized parameter '{}'", text)))?;
            return Ok(SqmExpression::Parameter(SqmParameter::Positional(position)));
        }
        if text.eq_ignore_ascii_case("true") {
            return Ok(SqmExpression::Literal(SqmLiteral::Boolean(true)));
        }
        if text.eq_ignore_ascii_case("false") {
            return Ok(SqmExpression::Literal(SqmLiteral::Boolean(false)));
        }
        if let Ok(integer) = text.parse::<i64>() {
            return Ok(SqmExpression::Literal(SqmLiteral::Integer(integer)));
        }
        if let Ok(float) = text.parse::<f64>() {
            return Ok(SqmExpression::Literal(SqmLiteral::Float(float)));
        }
        if text.contains('.') {
            return Ok(SqmExpression::Path(self.parse_path(text)?));
        }
        Err(self.fail(format!("unrecognized value '{}'", text)))
    }

    fn check_expected_result(
        &self,
        statement: &SqmSelectStatement,
        expected: &str,
    ) -> Result<()> {
        if let Some(kind) = BasicKind::parse(expected) {
            if statement.selections().len() == 1 {
                if let SqmExpression::Path(path) = &statement.selections()[0] {
                    if let Some(attribute) =
                        path.lhs().node_type().attribute(path.attribute())
                    {
                        if attribute.kind() == &AttributeKind::Basic(kind) {
                            return Ok(());
                        }
                    }
                }
            }
            return Err(self.fail(format!(
                "query does not return expected result type '{}'",
                expected
            )));
        }
        let Some(expected_entity) = self.model.entity(expected) else {
            return Err(QueryError::UnknownEntity(String::from(expected)));
        };
        let produced: &Arc<EntityType> = if statement.selections().is_empty() {
            statement.root().node_type()
        } else if statement.selections().len() == 1 {
            match &statement.selections()[0] {
                SqmExpression::From(node) => node.node_type(),
                SqmExpression::Path(path) => {
                    let lhs_type = path.lhs().node_type();
                    match lhs_type.attribute(path.attribute()).map(|a| a.kind()) {
                        Some(AttributeKind::ToOne(target)) => {
                            match self.model.entity(target) {
                                Some(entity) => entity,
                                None => {
                                    return Err(QueryError::UnknownEntity(target.clone()));
                                }
                            }
                        }
                        _ => {
                            return Err(self.fail(format!(
                                "query does not return expected result type '{}'",
                                expected
                            )));
                        }
                    }
                }
                _ => {
                    return Err(self.fail(format!(
                        "query does not return expected result type '{}'",
                        expected
                    )));
                }
            }
        } else {
            return Err(self.fail(format!(
                "query does not return expected result type '{}'",
                expected
            )));
        };
        if produced.is_subtype_of(expected_entity) {
            Ok(())
        } else {
            Err(self.fail(format!(
                "query returns '{}' where '{}' was expected",
                produced.name(),
                expected
            )))
        }
    }
}

// ------------- SQL lowering -------------
// Table and column names follow the model conventions: the table is the
// lowercased entity name, a to-one association keeps a "<attribute>_id"
// column, a to-many association is reached through a "<owner>_id" column
// on the target table.
struct SqlRenderer {
    aliases: HashMap<usize, String, NodeHasher>,
    counter: usize,
    parameters: Vec<String>,
}
impl SqlRenderer {
    fn new() -> Self {
        Self {
            aliases: HashMap::default(),
            counter: 0,
            parameters: Vec::new(),
        }
    }
    fn sql_alias(&mut self, node: &Arc<SqmFrom>) -> String {
        let key = Arc::as_ptr(node) as usize;
        if let Some(alias) = self.aliases.get(&key) {
            return alias.clone();
        }
        let alias = match node.alias() {
            Some(alias) => String::from(alias),
            None => {
                let synthesized = format!("t{}", self.counter);
                self.counter += 1;
                synthesized
            }
        };
        self.aliases.insert(key, alias.clone());
        alias
    }
    fn table(node: &Arc<SqmFrom>) -> String {
        node.node_type().name().to_lowercase()
    }

    fn render_statement(&mut self, statement: &SqmSelectStatement) -> String {
        let mut sql = String::from("SELECT ");
        if statement.selections().is_empty() {
            let alias = self.sql_alias(statement.root());
            sql.push_str(&format!("{}.*", alias));
        } else {
            for (i, selection) in statement.selections().iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                self.render_expression(&mut sql, selection);
            }
        }
        let root_alias = self.sql_alias(statement.root());
        sql.push_str(&format!(
            " FROM {} {}",
            Self::table(statement.root()),
            root_alias
        ));
        for join in statement.joins() {
            self.render_join(&mut sql, join);
        }
        if let Some(predicate) = statement.predicate() {
            sql.push_str(" WHERE ");
            self.render_predicate(&mut sql, predicate);
        }
        sql
    }

    fn render_join(&mut self, sql: &mut String, node: &Arc<SqmFrom>) {
        let keyword = match node.join_kind().unwrap_or(JoinKind::Inner) {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        };
        match node.as_ref() {
            SqmFrom::Root(_) => (),
            SqmFrom::EntityJoin(_) => {
                let alias = self.sql_alias(node);
                match node.join_predicate() {
                    Some(on) => {
                        sql.push_str(&format!(" {} {} {} ON ", keyword, Self::table(node), alias));
                        self.render_predicate(sql, on);
                    }
                    None => {
                        sql.push_str(&format!(" CROSS JOIN {} {}", Self::table(node), alias));
                    }
                }
            }
            SqmFrom::AttributeJoin(_) => self.linked_join(sql, keyword, node, node),
            SqmFrom::TreatedJoin(_) => {
                if let Some(wrapped) = node.wrapped() {
                    match wrapped.as_ref() {
                        SqmFrom::AttributeJoin(_) => self.linked_join(sql, keyword, node, wrapped),
                        _ => {
                            let alias = self.sql_alias(node);
                            match node.join_predicate() {
                                Some(on) => {
                                    sql.push_str(&format!(
                                        " {} {} {} ON ",
                                        keyword,
                                        Self::table(node),
                                        alias
                                    ));
                                    self.render_predicate(sql, on);
                                }
                                None => {
                                    sql.push_str(&format!(
                                        " CROSS JOIN {} {}",
                                        Self::table(node),
                                        alias
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    // The rendered node provides table and alias, the source join the
    // linkage columns. They differ only for treated joins, where the
    // subtype table is joined through the wrapped join's association.
    fn linked_join(
        &mut self,
        sql: &mut String,
        keyword: &str,
        rendered: &Arc<SqmFrom>,
        source: &Arc<SqmFrom>,
    ) {
        let (Some(lhs), Some(attribute)) = (source.lhs(), source.attribute()) else {
            return;
        };
        let Some(attr) = lhs.node_type().attribute(attribute) else {
            return;
        };
        let collection = attr.is_collection();
        let owner = lhs.node_type().name().to_lowercase();
        let lhs_alias = self.sql_alias(lhs);
        let alias = self.sql_alias(rendered);
        let table = Self::table(rendered);
        if collection {
            sql.push_str(&format!(
                " {} {} {} ON {}.{}_id = {}.id",
                keyword, table, alias, alias, owner, lhs_alias
            ));
        } else {
            sql.push_str(&format!(
                " {} {} {} ON {}.{}_id = {}.id",
                keyword, table, alias, lhs_alias, attribute, alias
            ));
        }
        if let Some(on) = rendered.join_predicate() {
            sql.push_str(" AND (");
            self.render_predicate(sql, on);
            sql.push(')');
        }
    }

    fn render_predicate(&mut self, sql: &mut String, predicate: &SqmPredicate) {
        match predicate {
            SqmPredicate::Comparison { lhs, op, rhs } => {
                self.render_expression(sql, lhs);
                sql.push(' ');
                sql.push_str(match op {
                    ComparisonOp::Eq => "=",
                    ComparisonOp::Ne => "<>",
                    ComparisonOp::Gt => ">",
                    ComparisonOp::Ge => ">=",
                    ComparisonOp::Lt => "<",
                    ComparisonOp::Le => "<=",
                    ComparisonOp::Like => "LIKE",
                });
                sql.push(' ');
                self.render_expression(sql, rhs);
            }
            SqmPredicate::Junction { kind, predicates } => {
                sql.push('(');
                for (i, predicate) in predicates.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(match kind {
                            JunctionKind::And => " AND ",
                            JunctionKind::Or => " OR ",
                        });
                    }
                    self.render_predicate(sql, predicate);
                }
                sql.push(')');
            }
            SqmPredicate::IsNull { path, negated } => {
                let rendered = self.path_sql(path);
                sql.push_str(&rendered);
                sql.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
        }
    }

    fn render_expression(&mut self, sql: &mut String, expression: &SqmExpression) {
        match expression {
            SqmExpression::From(node) => {
                let alias = self.sql_alias(node);
                sql.push_str(&format!("{}.*", alias));
            }
            SqmExpression::Path(path) => {
                let rendered = self.path_sql(path);
                sql.push_str(&rendered);
            }
            SqmExpression::Literal(literal) => match literal {
                SqmLiteral::String(s) => {
                    sql.push('\'');
                    sql.push_str(&s.replace('\'', "''"));
                    sql.push('\'');
                }
                SqmLiteral::Integer(i) => sql.push_str(&i.to_string()),
                SqmLiteral::Float(x) => sql.push_str(&x.to_string()),
                SqmLiteral::Boolean(b) => sql.push_str(if *b { "TRUE" } else { "FALSE" }),
            },
            SqmExpression::Parameter(parameter) => {
                if let SqmParameter::Named(name) = parameter {
                    if !self.parameters.contains(name) {
                        self.parameters.push(name.clone());
                    }
                }
                sql.push('?');
            }
        }
    }

    fn path_sql(&mut self, path: &SqmPath) -> String {
        let alias = self.sql_alias(path.lhs());
        match path.lhs().node_type().attribute(path.attribute()).map(|a| a.kind()) {
            Some(AttributeKind::ToOne(_)) => format!("{}.{}_id", alias, path.attribute()),
            _ => format!("{}.{}", alias, path.attribute()),
        }
    }
}
