//! Condition bags attached to relations.
//!
//! A relation carries a static [`ConditionBag`] from its configuration and
//! callers may pass another one per call. Both use the same shapes:
//!
//! - `where`, `through_where`, `join_on`: lists of [`ConditionEntry`], either
//!   `field = value` shorthand or an explicit `(field, operator, operand)` clause
//! - `order_by`: list of [`OrderEntry`], either a raw expression or a
//!   `(field, direction)` pair
//! - `join_type`: join kind used when the relation is embedded in a parent query
//!
//! Entries hold field names as written by the user. Aliasing happens later,
//! when a relation turns entries into [`Predicate`]s for a concrete query.

use crate::error::{RelationError, Result};
use crate::value::{from_json, is_null, quote_literal};
use sea_query::{BinOper, DynIden, Expr, ExprTrait, JoinType, NullOrdering, Order, Value};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Build an identifier from a name
pub(crate) fn iden(name: &str) -> DynIden {
    DynIden::from(name.to_string())
}

/// Column expression for a possibly `table.column` qualified name
pub(crate) fn column_expr(column: &str) -> Expr {
    match column.rsplit_once('.') {
        Some((table, col)) => Expr::col((iden(table), iden(col))),
        None => Expr::col(iden(column)),
    }
}

/// Left-hand side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Column reference, optionally `table.column` qualified; expressions go in `Raw`
    Column(String),
    /// Raw SQL expression, never rewritten
    Raw(String),
    /// Literal value bound as a parameter
    Bound(Value),
}

impl Field {
    /// Column name if this is a column reference
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Field::Column(column) => Some(column),
            _ => None,
        }
    }

    fn to_expr(&self) -> Expr {
        match self {
            Field::Column(column) => column_expr(column),
            Field::Raw(sql) => Expr::cust(sql.clone()),
            Field::Bound(value) => Expr::val(value.clone()),
        }
    }

    fn to_sql(&self) -> String {
        match self {
            Field::Column(column) => column.clone(),
            Field::Raw(sql) => sql.clone(),
            Field::Bound(value) => quote_literal(value),
        }
    }
}

impl From<&str> for Field {
    fn from(column: &str) -> Self {
        Field::Column(column.to_string())
    }
}

impl From<String> for Field {
    fn from(column: String) -> Self {
        Field::Column(column)
    }
}

/// Comparison operator of a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    Is,
    IsNot,
}

impl Operator {
    /// Parse an operator as written in configuration (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` for unknown operators.
    pub fn parse(relation: &str, op: &str) -> Result<Self> {
        let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let parsed = match normalized.as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "is" => Operator::Is,
            "is not" => Operator::IsNot,
            _ => {
                return Err(RelationError::configuration(
                    relation,
                    format!("unknown operator: {}", op),
                ))
            }
        };
        Ok(parsed)
    }

    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }

    fn bin_oper(&self) -> BinOper {
        match self {
            Operator::Eq => BinOper::Equal,
            Operator::Ne => BinOper::NotEqual,
            Operator::Lt => BinOper::SmallerThan,
            Operator::Le => BinOper::SmallerThanOrEqual,
            Operator::Gt => BinOper::GreaterThan,
            Operator::Ge => BinOper::GreaterThanOrEqual,
            Operator::Like => BinOper::Like,
            Operator::NotLike => BinOper::NotLike,
            Operator::In => BinOper::In,
            Operator::NotIn => BinOper::NotIn,
            Operator::Is => BinOper::Is,
            Operator::IsNot => BinOper::IsNot,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Literal value, bound as a parameter
    Value(Value),
    /// Column reference, aliased like fields are
    Column(String),
    /// Raw SQL expression, never rewritten
    Raw(String),
    /// Value list for `IN` / `NOT IN`
    List(Vec<Value>),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl Operand {
    fn to_sql(&self) -> String {
        match self {
            Operand::Value(value) => quote_literal(value),
            Operand::Column(column) => column.clone(),
            Operand::Raw(sql) => sql.clone(),
            Operand::List(values) => format!(
                "({})",
                values.iter().map(quote_literal).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

/// A normalized `(field, operator, operand)` triple
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: Field,
    pub op: Operator,
    pub operand: Operand,
}

impl Predicate {
    /// Create a predicate, checking that the operand fits the operator
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` when a value list is used with an
    /// operator other than `IN` / `NOT IN`.
    pub fn new(relation: &str, field: Field, op: Operator, operand: Operand) -> Result<Self> {
        if matches!(operand, Operand::List(_)) && !matches!(op, Operator::In | Operator::NotIn) {
            return Err(RelationError::configuration(
                relation,
                format!("operator {} does not accept a value list", op),
            ));
        }
        Ok(Self { field, op, operand })
    }

    /// Equality between two columns, as used for key pairs in join conditions
    pub fn columns_eq(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            field: Field::Column(left.into()),
            op: Operator::Eq,
            operand: Operand::Column(right.into()),
        }
    }

    /// Equality between a column and a bound value
    pub fn value_eq(column: impl Into<String>, value: Value) -> Self {
        Self {
            field: Field::Column(column.into()),
            op: Operator::Eq,
            operand: Operand::Value(value),
        }
    }

    /// Convert to a sea-query expression; literal values become bound parameters
    pub fn to_expr(&self) -> Expr {
        let left = self.field.to_expr();
        match (&self.op, &self.operand) {
            (Operator::Eq | Operator::Is, Operand::Value(v)) if is_null(v) => left.is_null(),
            (Operator::Ne | Operator::IsNot, Operand::Value(v)) if is_null(v) => left.is_not_null(),
            // IS does not take parameters
            (Operator::Is | Operator::IsNot, Operand::Value(v)) => {
                left.binary(self.op.bin_oper(), Expr::cust(quote_literal(v)))
            }
            (Operator::In, Operand::List(values)) => left.is_in(values.clone()),
            (Operator::NotIn, Operand::List(values)) => left.is_not_in(values.clone()),
            (Operator::In, Operand::Value(v)) => left.is_in(vec![v.clone()]),
            (Operator::NotIn, Operand::Value(v)) => left.is_not_in(vec![v.clone()]),
            (op, Operand::Value(v)) => left.binary(op.bin_oper(), Expr::val(v.clone())),
            (op, Operand::Column(column)) => left.binary(op.bin_oper(), column_expr(column)),
            (op, Operand::Raw(sql)) => left.binary(op.bin_oper(), Expr::cust(sql.clone())),
            (op, Operand::List(values)) => left.binary(
                op.bin_oper(),
                Expr::cust(Operand::List(values.clone()).to_sql()),
            ),
        }
    }

    /// Render as SQL text with every literal escaped
    pub fn to_sql(&self) -> String {
        format!("{} {} {}", self.field.to_sql(), self.op, self.operand.to_sql())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// One entry of a `where`, `through_where` or `join_on` list
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionEntry {
    /// `field = value`, keyed by `field` when bags are merged
    Shorthand { field: String, value: Value },
    /// Explicit clause, appended when bags are merged
    Clause {
        field: Field,
        op: Operator,
        operand: Operand,
    },
}

impl ConditionEntry {
    /// `field = value` shorthand
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        ConditionEntry::Shorthand {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Explicit clause
    pub fn clause(field: impl Into<Field>, op: Operator, operand: impl Into<Operand>) -> Self {
        ConditionEntry::Clause {
            field: field.into(),
            op,
            operand: operand.into(),
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            ConditionEntry::Shorthand { field, .. } => Some(field),
            ConditionEntry::Clause { .. } => None,
        }
    }

    /// Canonical triple form, before aliasing
    pub fn normalize(&self, relation: &str) -> Result<Predicate> {
        match self {
            ConditionEntry::Shorthand { field, value } => Ok(Predicate::value_eq(field.clone(), value.clone())),
            ConditionEntry::Clause { field, op, operand } => {
                Predicate::new(relation, field.clone(), *op, operand.clone())
            }
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `asc` / `desc` (case-insensitive)
    pub fn parse(relation: &str, direction: &str) -> Result<Self> {
        match direction.trim().to_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(RelationError::configuration(
                relation,
                format!("unknown sort direction: {}", direction),
            )),
        }
    }
}

impl From<Direction> for Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        }
    }
}

/// One `order_by` entry
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEntry {
    /// Raw order expression, used as written
    Raw(String),
    /// Column and direction, keyed by the column when bags are merged
    Field { field: String, direction: Direction },
}

impl OrderEntry {
    /// Order by `field` in `direction`
    pub fn field(field: impl Into<String>, direction: Direction) -> Self {
        OrderEntry::Field {
            field: field.into(),
            direction,
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            OrderEntry::Field { field, .. } => Some(field),
            OrderEntry::Raw(_) => None,
        }
    }

    /// Convert to a sea-query order expression.
    ///
    /// A raw expression may end in `ASC`/`DESC`, optionally followed by
    /// `NULLS FIRST`/`NULLS LAST`; those suffixes are taken as its direction and
    /// null ordering.
    pub fn to_order_expr(&self) -> (Expr, Order, Option<NullOrdering>) {
        match self {
            OrderEntry::Raw(sql) => {
                let mut rest = sql.trim();
                let mut nulls = None;
                for (keyword, ordering) in [("FIRST", NullOrdering::First), ("LAST", NullOrdering::Last)] {
                    if let Some(head) = strip_keyword(rest, keyword).and_then(|head| strip_keyword(head, "NULLS")) {
                        rest = head;
                        nulls = Some(ordering);
                        break;
                    }
                }
                let mut order = Order::Asc;
                for (keyword, direction) in [("DESC", Order::Desc), ("ASC", Order::Asc)] {
                    if let Some(head) = strip_keyword(rest, keyword) {
                        rest = head;
                        order = direction;
                        break;
                    }
                }
                (Expr::cust(rest.to_string()), order, nulls)
            }
            OrderEntry::Field { field, direction } => (column_expr(field), (*direction).into(), None),
        }
    }
}

/// `text` without a trailing whitespace-separated `keyword`, matched case-insensitively
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(keyword.len())?;
    let (head, tail) = (text.get(..split)?, text.get(split..)?);
    if tail.eq_ignore_ascii_case(keyword) && head.ends_with(char::is_whitespace) {
        Some(head.trim_end())
    } else {
        None
    }
}

/// Join kind used when the relation is embedded in a parent query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// Parse `inner` / `left` / `right` (case-insensitive)
    pub fn parse(relation: &str, kind: &str) -> Result<Self> {
        match kind.trim().to_lowercase().as_str() {
            "inner" => Ok(JoinKind::Inner),
            "left" => Ok(JoinKind::Left),
            "right" => Ok(JoinKind::Right),
            _ => Err(RelationError::configuration(
                relation,
                format!("unknown join type: {}", kind),
            )),
        }
    }
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
            JoinKind::Right => JoinType::RightJoin,
        }
    }
}

/// Conditions attached to a relation, or passed for a single call
///
/// # Example
///
/// ```
/// use throughway::query::condition::{ConditionBag, ConditionEntry, Direction, OrderEntry};
///
/// let bag = ConditionBag::new()
///     .with_where(ConditionEntry::eq("status", "published"))
///     .with_order_by(OrderEntry::field("name", Direction::Asc));
/// assert_eq!(bag.where_.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionBag {
    pub where_: Vec<ConditionEntry>,
    pub through_where: Vec<ConditionEntry>,
    pub join_on: Vec<ConditionEntry>,
    pub order_by: Vec<OrderEntry>,
    pub join_type: Option<JoinKind>,
}

fn merge_keyed<T: Clone>(base: &mut Vec<T>, extra: &[T], key: impl Fn(&T) -> Option<&str>) {
    for entry in extra {
        let position = key(entry).and_then(|k| base.iter().position(|existing| key(existing) == Some(k)));
        match position {
            Some(idx) => base[idx] = entry.clone(),
            None => base.push(entry.clone()),
        }
    }
}

impl ConditionBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, entry: ConditionEntry) -> Self {
        self.where_.push(entry);
        self
    }

    pub fn with_through_where(mut self, entry: ConditionEntry) -> Self {
        self.through_where.push(entry);
        self
    }

    pub fn with_join_on(mut self, entry: ConditionEntry) -> Self {
        self.join_on.push(entry);
        self
    }

    pub fn with_order_by(mut self, entry: OrderEntry) -> Self {
        self.order_by.push(entry);
        self
    }

    pub fn with_join_type(mut self, kind: JoinKind) -> Self {
        self.join_type = Some(kind);
        self
    }

    /// Whether the bag holds no conditions at all
    pub fn is_empty(&self) -> bool {
        self.where_.is_empty()
            && self.through_where.is_empty()
            && self.join_on.is_empty()
            && self.order_by.is_empty()
            && self.join_type.is_none()
    }

    /// Merge call-time conditions over this bag, returning a new bag.
    ///
    /// Keyed entries (shorthand, column ordering) replace the entry with the same
    /// key in place; clauses and raw order expressions are appended. `join_type`
    /// from `extra` wins. `self` is left untouched.
    pub fn merge(&self, extra: &ConditionBag) -> ConditionBag {
        let mut merged = self.clone();
        merge_keyed(&mut merged.where_, &extra.where_, ConditionEntry::key);
        merge_keyed(&mut merged.through_where, &extra.through_where, ConditionEntry::key);
        merge_keyed(&mut merged.join_on, &extra.join_on, ConditionEntry::key);
        merge_keyed(&mut merged.order_by, &extra.order_by, OrderEntry::key);
        merged.join_type = extra.join_type.or(self.join_type);
        merged
    }

    /// Parse the JSON-shaped configuration form.
    ///
    /// ```json
    /// {
    ///   "where": { "status": "published" },
    ///   "through_where": [["weight", ">", 2]],
    ///   "order_by": [["name", "desc"], "random()"],
    ///   "join_type": "inner"
    /// }
    /// ```
    ///
    /// Maps iterate in the order the JSON value yields them; use the list form
    /// where order matters.
    pub fn from_json(json: &serde_json::Value) -> std::result::Result<Self, String> {
        let mut bag = ConditionBag::new();
        let object = match json {
            serde_json::Value::Null => return Ok(bag),
            serde_json::Value::Object(object) => object,
            other => return Err(format!("conditions must be a map, got {}", other)),
        };
        for (key, value) in object {
            match key.as_str() {
                "where" => bag.where_ = parse_entries(key, value)?,
                "through_where" => bag.through_where = parse_entries(key, value)?,
                "join_on" => bag.join_on = parse_entries(key, value)?,
                "order_by" => bag.order_by = parse_order(value)?,
                "join_type" => {
                    let kind = value
                        .as_str()
                        .ok_or_else(|| format!("join_type must be a string, got {}", value))?;
                    bag.join_type = Some(JoinKind::parse("conditions", kind).map_err(|e| e.to_string())?);
                }
                other => return Err(format!("unknown condition key: {}", other)),
            }
        }
        Ok(bag)
    }
}

impl<'de> Deserialize<'de> for ConditionBag {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = serde_json::Value::deserialize(deserializer)?;
        ConditionBag::from_json(&json).map_err(serde::de::Error::custom)
    }
}

fn parse_scalar(section: &str, json: &serde_json::Value) -> std::result::Result<Value, String> {
    from_json(json).ok_or_else(|| format!("{}: expected a scalar value, got {}", section, json))
}

fn parse_field(section: &str, json: &serde_json::Value) -> std::result::Result<Field, String> {
    match json {
        serde_json::Value::String(column) => Ok(Field::Column(column.clone())),
        serde_json::Value::Object(object) => match object.get("raw").and_then(|raw| raw.as_str()) {
            Some(raw) => Ok(Field::Raw(raw.to_string())),
            None => Err(format!("{}: field object must be {{\"raw\": \"...\"}}", section)),
        },
        other => Err(format!("{}: invalid field {}", section, other)),
    }
}

fn parse_operand(section: &str, json: &serde_json::Value) -> std::result::Result<Operand, String> {
    match json {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| parse_scalar(section, item))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Operand::List),
        serde_json::Value::Object(object) => {
            if let Some(column) = object.get("column").and_then(|c| c.as_str()) {
                Ok(Operand::Column(column.to_string()))
            } else if let Some(raw) = object.get("raw").and_then(|r| r.as_str()) {
                Ok(Operand::Raw(raw.to_string()))
            } else {
                Err(format!("{}: operand object must be {{\"column\": ..}} or {{\"raw\": ..}}", section))
            }
        }
        scalar => parse_scalar(section, scalar).map(Operand::Value),
    }
}

fn parse_entries(section: &str, json: &serde_json::Value) -> std::result::Result<Vec<ConditionEntry>, String> {
    match json {
        serde_json::Value::Object(object) => object
            .iter()
            .map(|(field, value)| {
                Ok(ConditionEntry::Shorthand {
                    field: field.clone(),
                    value: parse_scalar(section, value)?,
                })
            })
            .collect(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item.as_array().map(Vec::as_slice) {
                Some([field, op, operand]) => {
                    let op = op
                        .as_str()
                        .ok_or_else(|| format!("{}: operator must be a string", section))?;
                    Ok(ConditionEntry::Clause {
                        field: parse_field(section, field)?,
                        op: Operator::parse(section, op).map_err(|e| e.to_string())?,
                        operand: parse_operand(section, operand)?,
                    })
                }
                Some([field, value]) => Ok(ConditionEntry::Shorthand {
                    field: field
                        .as_str()
                        .ok_or_else(|| format!("{}: field must be a string", section))?
                        .to_string(),
                    value: parse_scalar(section, value)?,
                }),
                _ => Err(format!("{}: expected [field, operator, value], got {}", section, item)),
            })
            .collect(),
        other => Err(format!("{}: expected a map or a list, got {}", section, other)),
    }
}

fn parse_direction(json: &serde_json::Value) -> std::result::Result<Direction, String> {
    let direction = json
        .as_str()
        .ok_or_else(|| format!("order_by: direction must be a string, got {}", json))?;
    Direction::parse("order_by", direction).map_err(|e| e.to_string())
}

fn parse_order(json: &serde_json::Value) -> std::result::Result<Vec<OrderEntry>, String> {
    match json {
        serde_json::Value::Object(object) => object
            .iter()
            .map(|(field, direction)| Ok(OrderEntry::field(field.clone(), parse_direction(direction)?)))
            .collect(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(raw) => Ok(OrderEntry::Raw(raw.clone())),
                serde_json::Value::Array(pair) => match pair.as_slice() {
                    [serde_json::Value::String(field)] => Ok(OrderEntry::field(field.clone(), Direction::Asc)),
                    [serde_json::Value::String(field), direction] => {
                        Ok(OrderEntry::field(field.clone(), parse_direction(direction)?))
                    }
                    _ => Err(format!("order_by: expected [field, direction], got {}", item)),
                },
                other => Err(format!("order_by: invalid entry {}", other)),
            })
            .collect(),
        other => Err(format!("order_by: expected a map or a list, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, Query};
    use serde_json::json;

    fn render(predicate: &Predicate) -> (String, sea_query::Values) {
        Query::select()
            .expr(Expr::cust("1"))
            .and_where(predicate.to_expr())
            .build(PostgresQueryBuilder)
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("tags", "=").unwrap(), Operator::Eq);
        assert_eq!(Operator::parse("tags", "<>").unwrap(), Operator::Ne);
        assert_eq!(Operator::parse("tags", "NOT  LIKE").unwrap(), Operator::NotLike);
        assert_eq!(Operator::parse("tags", "is not").unwrap(), Operator::IsNot);
        assert!(Operator::parse("tags", "~~").is_err());
    }

    #[test]
    fn test_shorthand_normalizes_to_equality() {
        let entry = ConditionEntry::eq("status", "published");
        assert_eq!(
            entry.normalize("tags").unwrap(),
            Predicate::value_eq("status", Value::String(Some("published".to_string())))
        );
    }

    #[test]
    fn test_list_requires_in() {
        let entry = ConditionEntry::clause("id", Operator::Eq, Operand::List(vec![1i32.into()]));
        assert!(entry.normalize("tags").is_err());

        let entry = ConditionEntry::clause("id", Operator::In, Operand::List(vec![1i32.into(), 2i32.into()]));
        assert!(entry.normalize("tags").is_ok());
    }

    #[test]
    fn test_predicate_values_are_bound() {
        let predicate = Predicate::value_eq("t0.name", Value::String(Some("x'; --".to_string())));
        let (sql, values) = render(&predicate);

        assert_eq!(sql, r#"SELECT 1 WHERE "t0"."name" = $1"#);
        assert_eq!(values.0, vec![Value::String(Some("x'; --".to_string()))]);
    }

    #[test]
    fn test_predicate_column_comparison() {
        let predicate = Predicate::columns_eq("t0_through.tag_id", "t0.id");
        let (sql, values) = render(&predicate);

        assert_eq!(sql, r#"SELECT 1 WHERE "t0_through"."tag_id" = "t0"."id""#);
        assert!(values.0.is_empty());
    }

    #[test]
    fn test_predicate_null_becomes_is_null() {
        let predicate = Predicate::value_eq("t0.deleted_at", Value::String(None));
        let (sql, _) = render(&predicate);
        assert_eq!(sql, r#"SELECT 1 WHERE "t0"."deleted_at" IS NULL"#);
    }

    #[test]
    fn test_predicate_in_list() {
        let predicate = Predicate {
            field: Field::Column("t0.id".to_string()),
            op: Operator::In,
            operand: Operand::List(vec![1i32.into(), 2i32.into()]),
        };
        let (sql, values) = render(&predicate);

        assert_eq!(sql, r#"SELECT 1 WHERE "t0"."id" IN ($1, $2)"#);
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_to_sql_escapes_literals() {
        let predicate = Predicate::value_eq("t1_through.note", Value::String(Some("it's".to_string())));
        assert_eq!(predicate.to_sql(), "t1_through.note = 'it''s'");
    }

    #[test]
    fn test_merge_replaces_keyed_and_appends_clauses() {
        let base = ConditionBag::new()
            .with_where(ConditionEntry::eq("status", "draft"))
            .with_where(ConditionEntry::eq("lang", "en"))
            .with_order_by(OrderEntry::field("name", Direction::Asc))
            .with_join_type(JoinKind::Inner);
        let extra = ConditionBag::new()
            .with_where(ConditionEntry::eq("status", "published"))
            .with_where(ConditionEntry::clause("weight", Operator::Gt, Value::Int(Some(2))))
            .with_order_by(OrderEntry::field("name", Direction::Desc))
            .with_order_by(OrderEntry::Raw("random()".to_string()));

        let merged = base.merge(&extra);

        assert_eq!(merged.where_.len(), 3);
        assert_eq!(merged.where_[0], ConditionEntry::eq("status", "published"));
        assert_eq!(merged.where_[1], ConditionEntry::eq("lang", "en"));
        assert_eq!(merged.order_by[0], OrderEntry::field("name", Direction::Desc));
        assert_eq!(merged.order_by[1], OrderEntry::Raw("random()".to_string()));
        assert_eq!(merged.join_type, Some(JoinKind::Inner));

        // EDGE CASE: merging must not touch the static bag
        assert_eq!(base.where_[0], ConditionEntry::eq("status", "draft"));
        assert_eq!(base.order_by.len(), 1);
    }

    #[test]
    fn test_raw_order_direction_suffix() {
        let (_, order, nulls) = OrderEntry::Raw("created_at DESC".to_string()).to_order_expr();
        assert!(matches!(order, Order::Desc));
        assert!(nulls.is_none());
        let (_, order, _) = OrderEntry::Raw("random()".to_string()).to_order_expr();
        assert!(matches!(order, Order::Asc));
        // EDGE CASE: "desc" inside an identifier is not a direction
        let (_, order, _) = OrderEntry::Raw("t0.sort_desc".to_string()).to_order_expr();
        assert!(matches!(order, Order::Asc));
    }

    #[test]
    fn test_raw_order_nulls_suffix() {
        let (_, order, nulls) = OrderEntry::Raw("t0.name DESC NULLS LAST".to_string()).to_order_expr();
        assert!(matches!(order, Order::Desc));
        assert!(matches!(nulls, Some(NullOrdering::Last)));

        let (_, order, nulls) = OrderEntry::Raw("t0.name nulls first".to_string()).to_order_expr();
        assert!(matches!(order, Order::Asc));
        assert!(matches!(nulls, Some(NullOrdering::First)));
    }

    #[test]
    fn test_raw_order_renders_each_suffix_once() {
        let (expr, order, nulls) = OrderEntry::Raw("t0.name DESC NULLS LAST".to_string()).to_order_expr();
        let sql = Query::select()
            .expr(Expr::cust("1"))
            .order_by_expr_with_nulls(expr, order, nulls.unwrap())
            .to_string(PostgresQueryBuilder);
        assert_eq!(sql, "SELECT 1 ORDER BY t0.name DESC NULLS LAST");
    }

    #[test]
    fn test_merge_caller_join_type_wins() {
        let base = ConditionBag::new().with_join_type(JoinKind::Inner);
        let extra = ConditionBag::new().with_join_type(JoinKind::Right);
        assert_eq!(base.merge(&extra).join_type, Some(JoinKind::Right));
    }

    #[test]
    fn test_from_json_all_sections() {
        let bag = ConditionBag::from_json(&json!({
            "where": { "status": "published" },
            "through_where": [["weight", ">=", 2], ["approved", true]],
            "join_on": [["lang", "in", ["en", "de"]]],
            "order_by": [["name", "desc"], "random()"],
            "join_type": "inner"
        }))
        .unwrap();

        assert_eq!(bag.where_, vec![ConditionEntry::eq("status", "published")]);
        assert_eq!(
            bag.through_where,
            vec![
                ConditionEntry::clause("weight", Operator::Ge, Value::BigInt(Some(2))),
                ConditionEntry::eq("approved", true),
            ]
        );
        assert_eq!(
            bag.join_on,
            vec![ConditionEntry::clause(
                "lang",
                Operator::In,
                Operand::List(vec![
                    Value::String(Some("en".to_string())),
                    Value::String(Some("de".to_string())),
                ]),
            )]
        );
        assert_eq!(
            bag.order_by,
            vec![
                OrderEntry::field("name", Direction::Desc),
                OrderEntry::Raw("random()".to_string()),
            ]
        );
        assert_eq!(bag.join_type, Some(JoinKind::Inner));
    }

    #[test]
    fn test_from_json_raw_field_and_column_operand() {
        let bag = ConditionBag::from_json(&json!({
            "where": [[{ "raw": "lower(name)" }, "=", { "column": "slug" }]]
        }))
        .unwrap();

        assert_eq!(
            bag.where_,
            vec![ConditionEntry::Clause {
                field: Field::Raw("lower(name)".to_string()),
                op: Operator::Eq,
                operand: Operand::Column("slug".to_string()),
            }]
        );
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(ConditionBag::from_json(&json!({ "having": {} })).is_err());
        assert!(ConditionBag::from_json(&json!({ "where": [["a", "~~", 1]] })).is_err());
        assert!(ConditionBag::from_json(&json!({ "order_by": { "name": "sideways" } })).is_err());
        assert!(ConditionBag::from_json(&json!({ "join_type": "outer" })).is_err());
        assert!(ConditionBag::from_json(&json!("where")).is_err());
    }

    #[test]
    fn test_deserialize_through_serde() {
        let bag: ConditionBag = serde_json::from_value(json!({ "where": { "status": "published" } })).unwrap();
        assert_eq!(bag.where_.len(), 1);
    }
}
