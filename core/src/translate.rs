//! Translation of [`Expr`] predicates and selectors into SQL fragments.
//!
//! Properties are looked up in a caller-built [`ColumnScope`], so
//! navigation-qualified access always uses the aliases the emitter allocated.
//! Free variables are recorded in [`Parameters`] and rendered with the
//! dialect's placeholder syntax.

use eagerload_types::{Dialect, ScalarKind, Value};
use hashbrown::HashMap;

use crate::error::{EagerError, Result};
use crate::expr::{BinaryOp, Expr, LogicalOp, Method, PropertyPath, UnaryOp};
use crate::metadata::{EntityDescriptor, MetadataProvider};
use crate::navigation::{AliasAllocator, NavigationResolver};

/// SQL for one addressable property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedColumn {
    pub sql: String,
    pub kind: ScalarKind,
}

/// Dotted property paths visible to a statement level, mapped to the SQL that
/// reads them there.
#[derive(Debug, Clone, Default)]
pub struct ColumnScope {
    columns: HashMap<String, ScopedColumn>,
    root_entity: Option<String>,
}

impl ColumnScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope rooted at `entity`, whose own columns are read through `alias`.
    pub fn for_entity(entity: &EntityDescriptor, alias: &str, dialect: Dialect) -> Self {
        let mut scope = Self {
            columns: HashMap::new(),
            root_entity: Some(entity.name.clone()),
        };
        scope.add_entity(None, entity, alias, dialect);
        scope
    }

    /// Entity whose collections `any` resolves against.
    pub fn root_entity(&self) -> Option<&str> {
        self.root_entity.as_deref()
    }

    pub fn set_root_entity(&mut self, entity: impl Into<String>) {
        self.root_entity = Some(entity.into());
    }

    pub fn insert(&mut self, path: impl Into<String>, sql: impl Into<String>, kind: ScalarKind) {
        self.columns.insert(
            path.into(),
            ScopedColumn {
                sql: sql.into(),
                kind,
            },
        );
    }

    /// Adds every mapped column of `entity` as `<prefix>.<property>` read from
    /// `alias."<column>"`.
    pub fn add_entity(
        &mut self,
        prefix: Option<&PropertyPath>,
        entity: &EntityDescriptor,
        alias: &str,
        dialect: Dialect,
    ) {
        for column in entity.mapped_columns() {
            let path = match prefix {
                Some(prefix) => prefix.child(column.property.as_str()).to_string(),
                None => column.property.clone(),
            };
            self.insert(
                path,
                format!("{alias}.{}", dialect.quote_ident(&column.column)),
                column.kind,
            );
        }
    }

    pub fn get(&self, path: &str) -> Option<&ScopedColumn> {
        self.columns.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.columns.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Named parameters in binding order.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: Vec<(String, Value)>,
    /// Every name in `entries`, mapped to the last suffix tried with it as base.
    names: HashMap<String, usize>,
}

impl PartialEq for Parameters {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` under `name` and returns the name actually used and its
    /// 1-based position. A name already taken gets a numeric suffix.
    pub fn bind(&mut self, name: &str, value: Value) -> (String, usize) {
        let base = sanitize(name);
        let unique = match self.names.get(&base).copied() {
            None => base,
            Some(mut n) => {
                let unique = loop {
                    n += 1;
                    let candidate = format!("{base}_{n}");
                    if !self.names.contains_key(&candidate) {
                        break candidate;
                    }
                };
                self.names.insert(base, n);
                unique
            }
        };
        self.names.insert(unique.clone(), 1);
        self.entries.push((unique.clone(), value));
        (unique, self.entries.len())
    }

    /// Drops every parameter bound after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.entries.len() {
            return;
        }
        for (name, _) in self.entries.drain(len..) {
            self.names.remove(&name);
        }
    }

    /// Binds and renders the placeholder for `dialect`.
    pub fn placeholder(&mut self, dialect: Dialect, name: &str, value: Value) -> String {
        let (name, index) = self.bind(name, value);
        dialect.placeholder(&name, index)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("p{cleaned}")
    } else {
        cleaned
    }
}

/// Renders `value` as an inline SQL literal.
pub fn literal(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Bool(b) => dialect.bool_literal(*b).to_string(),
        Value::Text(s) => quote_str(s),
        Value::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for byte in bytes {
                out.push_str(&format!("{byte:02X}"));
            }
            out.push('\'');
            out
        }
        temporal => quote_str(&temporal.to_string()),
    }
}

fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[derive(Debug, Clone)]
struct Fragment {
    sql: String,
    kind: Option<ScalarKind>,
    /// Already a SQL condition.
    condition: bool,
}

impl Fragment {
    fn value(sql: String, kind: Option<ScalarKind>) -> Self {
        Self {
            sql,
            kind,
            condition: false,
        }
    }

    fn condition(sql: String) -> Self {
        Self {
            sql,
            kind: Some(ScalarKind::Bool),
            condition: true,
        }
    }
}

#[derive(Clone, Copy)]
enum LikeShape {
    Contains,
    Prefix,
    Suffix,
}

impl LikeShape {
    fn wrap(self, text: &str) -> String {
        match self {
            LikeShape::Contains => format!("%{text}%"),
            LikeShape::Prefix => format!("{text}%"),
            LikeShape::Suffix => format!("%{text}"),
        }
    }
}

/// Converts expressions into SQL against a [`ColumnScope`].
pub struct PredicateTranslator<'a> {
    provider: &'a dyn MetadataProvider,
    dialect: Dialect,
    params: &'a mut Parameters,
    aliases: &'a mut AliasAllocator,
}

impl<'a> PredicateTranslator<'a> {
    pub fn new(
        provider: &'a dyn MetadataProvider,
        dialect: Dialect,
        params: &'a mut Parameters,
        aliases: &'a mut AliasAllocator,
    ) -> Self {
        Self {
            provider,
            dialect,
            params,
            aliases,
        }
    }

    /// Translates `expr` as a WHERE/ON condition.
    pub fn predicate(&mut self, expr: &Expr, scope: &ColumnScope) -> Result<String> {
        let fragment = self.fragment(expr, scope)?;
        if fragment.condition {
            return Ok(fragment.sql);
        }
        match fragment.kind {
            Some(ScalarKind::Bool) => Ok(format!(
                "{} = {}",
                fragment.sql,
                self.dialect.bool_literal(true)
            )),
            _ => Err(EagerError::Translation(format!("`{expr}` is not a condition"))),
        }
    }

    /// Translates `expr` as a value (order-by key, projection).
    pub fn value(&mut self, expr: &Expr, scope: &ColumnScope) -> Result<String> {
        self.fragment(expr, scope).map(|f| f.sql)
    }

    fn fragment(&mut self, expr: &Expr, scope: &ColumnScope) -> Result<Fragment> {
        match expr {
            Expr::Property(path) => {
                let column = scope.get(&path.to_string()).ok_or_else(|| {
                    EagerError::Translation(format!("property `{path}` is not in scope"))
                })?;
                Ok(Fragment::value(column.sql.clone(), Some(column.kind)))
            }
            Expr::Constant(value) => Ok(Fragment::value(literal(value, self.dialect), value.kind())),
            Expr::Parameter { name, value } => {
                let sql = self.params.placeholder(self.dialect, name, value.clone());
                Ok(Fragment::value(sql, value.kind()))
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, scope),
            Expr::Unary { op, operand } => self.unary(*op, operand, scope),
            Expr::Logical { op, lhs, rhs } => {
                let keyword = match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                let lhs = self.predicate(lhs, scope)?;
                let rhs = self.predicate(rhs, scope)?;
                Ok(Fragment::condition(format!("({lhs} {keyword} {rhs})")))
            }
            Expr::MethodCall {
                method,
                target,
                args,
            } => self.method(*method, target, args, scope),
            Expr::In { target, values } => {
                if values.is_empty() {
                    return Ok(Fragment::condition("1=0".to_string()));
                }
                let target = self.fragment(target, scope)?;
                let list = values
                    .iter()
                    .map(|v| literal(v, self.dialect))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(Fragment::condition(format!("{} IN ({list})", target.sql)))
            }
            Expr::Any {
                navigation,
                predicate,
            } => self.any(navigation, predicate.as_deref(), scope),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: &ColumnScope) -> Result<Fragment> {
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let null_test = if op == BinaryOp::Eq { "IS NULL" } else { "IS NOT NULL" };
            if is_null(rhs) {
                let lhs = self.fragment(lhs, scope)?;
                return Ok(Fragment::condition(format!("{} {null_test}", lhs.sql)));
            }
            if is_null(lhs) {
                let rhs = self.fragment(rhs, scope)?;
                return Ok(Fragment::condition(format!("{} {null_test}", rhs.sql)));
            }
        }

        let l = self.fragment(lhs, scope)?;
        let r = self.fragment(rhs, scope)?;
        if op.is_comparison() {
            Ok(Fragment::condition(format!("{} {} {}", l.sql, op.as_sql(), r.sql)))
        } else {
            let kind = match (l.kind, r.kind) {
                (Some(ScalarKind::Real), _) | (_, Some(ScalarKind::Real)) => Some(ScalarKind::Real),
                (kind, _) => kind,
            };
            Ok(Fragment::value(format!("({} {} {})", l.sql, op.as_sql(), r.sql), kind))
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr, scope: &ColumnScope) -> Result<Fragment> {
        match op {
            UnaryOp::Not => {
                let inner = self.predicate(operand, scope)?;
                Ok(Fragment::condition(format!("NOT ({inner})")))
            }
            UnaryOp::Negate => {
                let inner = self.fragment(operand, scope)?;
                Ok(Fragment::value(format!("-({})", inner.sql), inner.kind))
            }
            UnaryOp::IsNull => {
                let inner = self.fragment(operand, scope)?;
                Ok(Fragment::condition(format!("{} IS NULL", inner.sql)))
            }
            UnaryOp::IsNotNull => {
                let inner = self.fragment(operand, scope)?;
                Ok(Fragment::condition(format!("{} IS NOT NULL", inner.sql)))
            }
        }
    }

    fn method(&mut self, method: Method, target: &Expr, args: &[Expr], scope: &ColumnScope) -> Result<Fragment> {
        let (min, max) = method.arity();
        if args.len() < min || args.len() > max {
            return Err(EagerError::Translation(format!(
                "`{}` takes {min}..={max} arguments, got {}",
                method.name(),
                args.len()
            )));
        }

        let t = self.fragment(target, scope)?;
        let dialect = self.dialect;
        let text = |sql: String| -> Result<Fragment> { Ok(Fragment::value(sql, Some(ScalarKind::Text))) };
        let integer =
            |sql: String| -> Result<Fragment> { Ok(Fragment::value(sql, Some(ScalarKind::Integer))) };

        match method {
            Method::Contains => self.like(&t.sql, &args[0], LikeShape::Contains, scope),
            Method::StartsWith => self.like(&t.sql, &args[0], LikeShape::Prefix, scope),
            Method::EndsWith => self.like(&t.sql, &args[0], LikeShape::Suffix, scope),
            Method::ToLower => text(format!("LOWER({})", t.sql)),
            Method::ToUpper => text(format!("UPPER({})", t.sql)),
            Method::Length => match dialect {
                Dialect::MySQL => integer(format!("CHAR_LENGTH({})", t.sql)),
                _ => integer(format!("LENGTH({})", t.sql)),
            },
            Method::Substring => {
                let start = match &args[0] {
                    Expr::Constant(Value::Integer(i)) => (i + 1).to_string(),
                    other => format!("({} + 1)", self.fragment(other, scope)?.sql),
                };
                match args.get(1) {
                    Some(len) => {
                        let len = self.fragment(len, scope)?;
                        text(format!("SUBSTR({}, {start}, {})", t.sql, len.sql))
                    }
                    None => text(format!("SUBSTR({}, {start})", t.sql)),
                }
            }
            Method::Trim => text(format!("TRIM({})", t.sql)),
            Method::TrimStart => text(format!("LTRIM({})", t.sql)),
            Method::TrimEnd => text(format!("RTRIM({})", t.sql)),
            Method::Replace => {
                let from = self.fragment(&args[0], scope)?;
                let to = self.fragment(&args[1], scope)?;
                text(format!("REPLACE({}, {}, {})", t.sql, from.sql, to.sql))
            }
            Method::Year | Method::Month | Method::Day | Method::Hour | Method::Minute | Method::Second => {
                integer(date_part(method, &t.sql, dialect))
            }
            Method::Abs => Ok(Fragment::value(format!("ABS({})", t.sql), t.kind)),
            Method::Round => match args.first() {
                Some(digits) => {
                    let digits = self.fragment(digits, scope)?;
                    Ok(Fragment::value(
                        format!("ROUND({}, {})", t.sql, digits.sql),
                        Some(ScalarKind::Real),
                    ))
                }
                None => Ok(Fragment::value(format!("ROUND({})", t.sql), t.kind)),
            },
            Method::Ceiling => integer(match dialect {
                Dialect::SQLite => format!(
                    "(CAST({0} AS INTEGER) + ({0} > CAST({0} AS INTEGER)))",
                    t.sql
                ),
                _ => format!("CEIL({})", t.sql),
            }),
            Method::Floor => integer(match dialect {
                Dialect::SQLite => format!(
                    "(CAST({0} AS INTEGER) - ({0} < CAST({0} AS INTEGER)))",
                    t.sql
                ),
                _ => format!("FLOOR({})", t.sql),
            }),
        }
    }

    fn like(&mut self, target: &str, pattern: &Expr, shape: LikeShape, scope: &ColumnScope) -> Result<Fragment> {
        // MySQL already escapes LIKE patterns with a backslash.
        let escape = match self.dialect {
            Dialect::MySQL => "",
            _ => " ESCAPE '\\'",
        };
        let pattern = match pattern {
            Expr::Constant(value) => {
                let wrapped = shape.wrap(&escape_like(&value.to_string()));
                format!("{}{escape}", quote_str(&wrapped))
            }
            Expr::Parameter { name, value } => {
                let wrapped = shape.wrap(&escape_like(&value.to_string()));
                let placeholder = self.params.placeholder(self.dialect, name, Value::Text(wrapped));
                format!("{placeholder}{escape}")
            }
            other => {
                let inner = self.fragment(other, scope)?.sql;
                let (head, tail) = match shape {
                    LikeShape::Contains => (Some("'%'"), Some("'%'")),
                    LikeShape::Prefix => (None, Some("'%'")),
                    LikeShape::Suffix => (Some("'%'"), None),
                };
                let parts: Vec<&str> = head.into_iter().chain([inner.as_str()]).chain(tail).collect();
                match self.dialect {
                    Dialect::MySQL => format!("CONCAT({})", parts.join(", ")),
                    _ => parts.join(" || "),
                }
            }
        };
        Ok(Fragment::condition(format!("{target} LIKE {pattern}")))
    }

    /// `EXISTS` over a collection navigation of the scope's root entity.
    fn any(&mut self, navigation: &PropertyPath, predicate: Option<&Expr>, scope: &ColumnScope) -> Result<Fragment> {
        let root = scope.root_entity().ok_or_else(|| {
            EagerError::Translation(format!("`{navigation}.any` has no entity to resolve against"))
        })?;
        let chain = NavigationResolver::new(self.provider)
            .resolve(root, navigation)
            .map_err(|e| EagerError::Translation(e.to_string()))?;
        let Some(collection) = chain.last().filter(|n| n.is_collection()) else {
            return Err(EagerError::Translation(format!(
                "`{navigation}` is not a collection navigation"
            )));
        };

        let owner = self.require(&collection.source)?;
        let owner_key_path = match navigation.parent() {
            Some(prefix) => prefix.child(owner.primary_key.as_str()).to_string(),
            None => owner.primary_key.clone(),
        };
        let owner_key = scope
            .get(&owner_key_path)
            .ok_or_else(|| EagerError::Translation(format!("`{owner_key_path}` is not in scope")))?
            .sql
            .clone();

        let dialect = self.dialect;
        let target = self.require(&collection.target)?;
        let alias = self.aliases.table(&collection.name);

        let (from, correlation) = match &collection.join {
            None => (
                format!("{} AS {alias}", dialect.quote_ident(&target.table)),
                format!(
                    "{alias}.{} = {owner_key}",
                    dialect.quote_ident(&column_of(&target, &collection.foreign_key.property)?)
                ),
            ),
            Some(hop) => {
                let join = self.require(&hop.entity)?;
                let join_alias = self.aliases.table(&hop.entity);
                (
                    format!(
                        "{} AS {join_alias} INNER JOIN {} AS {alias} ON {alias}.{} = {join_alias}.{}",
                        dialect.quote_ident(&join.table),
                        dialect.quote_ident(&target.table),
                        dialect.quote_ident(&column_of(&target, &target.primary_key)?),
                        dialect.quote_ident(&column_of(&join, &hop.related_fk)?),
                    ),
                    format!(
                        "{join_alias}.{} = {owner_key}",
                        dialect.quote_ident(&column_of(&join, &hop.parent_fk)?)
                    ),
                )
            }
        };

        let condition = match predicate {
            Some(predicate) => {
                let inner_scope = ColumnScope::for_entity(&target, &alias, dialect);
                let inner = self.predicate(predicate, &inner_scope)?;
                format!("{correlation} AND ({inner})")
            }
            None => correlation,
        };
        Ok(Fragment::condition(format!(
            "EXISTS (SELECT 1 FROM {from} WHERE {condition})"
        )))
    }

    fn require(&self, entity: &str) -> Result<std::sync::Arc<EntityDescriptor>> {
        self.provider
            .require(entity)
            .map_err(|e| EagerError::Translation(e.to_string()))
    }
}

/// Column name of `property` on `entity`.
pub(crate) fn column_of(entity: &EntityDescriptor, property: &str) -> Result<String> {
    entity
        .column(property)
        .map(|c| c.column.clone())
        .ok_or_else(|| {
            EagerError::Metadata(format!("`{}` has no property `{property}`", entity.name))
        })
}

fn is_null(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Constant(Value::Null)
            | Expr::Parameter {
                value: Value::Null,
                ..
            }
    )
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn date_part(method: Method, target: &str, dialect: Dialect) -> String {
    let (format, field) = match method {
        Method::Year => ("%Y", "YEAR"),
        Method::Month => ("%m", "MONTH"),
        Method::Day => ("%d", "DAY"),
        Method::Hour => ("%H", "HOUR"),
        Method::Minute => ("%M", "MINUTE"),
        _ => ("%S", "SECOND"),
    };
    match dialect {
        Dialect::SQLite => format!("CAST(strftime('{format}', {target}) AS INTEGER)"),
        _ => format!("EXTRACT({field} FROM {target})"),
    }
}
