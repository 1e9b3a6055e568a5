//! Structured, parameterized queries in the store's SQL dialect.
//!
//! Field names and constants come from code; every caller-supplied value is a
//! bound `@param`, so user input never reaches the query text.

use std::cmp::Ordering;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Bound parameter name including the leading `@`.
    Param(String),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-sensitive substring match.
    Contains { field: String, param: String },
    Compare { field: String, op: CompareOp, operand: Operand },
    /// Disjunction of the inner predicates.
    Any(Vec<Predicate>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Projection {
    #[default]
    All,
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub offset: Operand,
    pub limit: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParam {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub projection: Projection,
    pub top: Option<u32>,
    /// Conjunction; empty means no WHERE clause.
    pub filter: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub slice: Option<Slice>,
    pub parameters: Vec<QueryParam>,
}

impl QuerySpec {
    /// Cheapest existence check: at most one id.
    pub fn existence() -> Self {
        Self { projection: Projection::Fields(vec!["id".into()]), top: Some(1), ..Default::default() }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn resolve<'a>(&'a self, operand: &'a Operand) -> Option<&'a Value> {
        match operand {
            Operand::Param(name) => self.param(name),
            Operand::Literal(v) => Some(v),
        }
    }

    pub fn text(&self) -> String {
        let mut sql = String::from("SELECT ");
        if let Some(n) = self.top {
            let _ = write!(sql, "TOP {n} ");
        }
        match &self.projection {
            Projection::All => sql.push('*'),
            Projection::Fields(fields) => {
                let cols: Vec<String> = fields.iter().map(|f| format!("c.{f}")).collect();
                sql.push_str(&cols.join(", "));
            }
        }
        sql.push_str(" FROM c");
        if !self.filter.is_empty() {
            let clauses: Vec<String> = self.filter.iter().map(render_predicate).collect();
            let _ = write!(sql, " WHERE {}", clauses.join(" AND "));
        }
        if let Some(order) = &self.order_by {
            let dir = if order.descending { "DESC" } else { "ASC" };
            let _ = write!(sql, " ORDER BY c.{} {dir}", order.field);
        }
        if let Some(slice) = &self.slice {
            let _ = write!(sql, " OFFSET {} LIMIT {}", render_operand(&slice.offset), render_operand(&slice.limit));
        }
        sql
    }

    /// True when every filter predicate holds for `doc`.
    pub fn matches(&self, doc: &Value) -> Result<bool, StoreError> {
        for p in &self.filter {
            if !self.holds(p, doc)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn holds(&self, predicate: &Predicate, doc: &Value) -> Result<bool, StoreError> {
        let unbound = |name: &str| StoreError::BadRequest(format!("unbound query parameter {name}"));
        match predicate {
            Predicate::Contains { field, param } => {
                let needle = self.param(param).ok_or_else(|| unbound(param))?;
                Ok(match (doc.get(field), needle) {
                    (Some(Value::String(hay)), Value::String(needle)) => hay.contains(needle.as_str()),
                    _ => false,
                })
            }
            Predicate::Compare { field, op, operand } => {
                let rhs = self.resolve(operand).ok_or_else(|| unbound(&format!("{operand:?}")))?;
                let Some(ord) = doc.get(field).and_then(|lhs| compare(lhs, rhs)) else { return Ok(false) };
                Ok(match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Le => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Ge => ord != Ordering::Less,
                })
            }
            Predicate::Any(inner) => {
                for p in inner {
                    if self.holds(p, doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Whether the result depends on ordering or windowing across all matches.
    pub fn is_windowed(&self) -> bool { self.order_by.is_some() || self.slice.is_some() || self.top.is_some() }

    /// Filter-only form: whole documents, no ordering or window, and only
    /// the parameters the filter references.
    pub fn filter_only(&self) -> QuerySpec {
        let mut used = Vec::new();
        for p in &self.filter {
            collect_params(p, &mut used);
        }
        QuerySpec {
            filter: self.filter.clone(),
            parameters: self.parameters.iter().filter(|p| used.contains(&p.name.as_str())).cloned().collect(),
            ..Default::default()
        }
    }

    /// Order, window, cap and project rows that already passed the filter.
    pub fn finish(&self, mut rows: Vec<Value>, max_item_count: Option<u32>) -> Result<Vec<Value>, StoreError> {
        if let Some(order) = &self.order_by {
            rows.sort_by(|a, b| match (a.get(&order.field), b.get(&order.field)) {
                (Some(x), Some(y)) => {
                    let o = compare(x, y).unwrap_or(Ordering::Equal);
                    if order.descending { o.reverse() } else { o }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
        let mut rows: Vec<Value> = match &self.slice {
            Some(slice) => {
                let offset = self.count(&slice.offset)?;
                let limit = self.count(&slice.limit)?;
                rows.into_iter().skip(offset).take(limit).collect()
            }
            None => rows,
        };
        if let Some(top) = self.top {
            rows.truncate(top as usize);
        }
        if let Some(cap) = max_item_count {
            rows.truncate(cap as usize);
        }
        Ok(rows.into_iter().map(|doc| project(&self.projection, doc)).collect())
    }

    fn count(&self, operand: &Operand) -> Result<usize, StoreError> {
        self.resolve(operand)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| StoreError::BadRequest(format!("OFFSET/LIMIT must be a non-negative integer: {operand:?}")))
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn collect_params<'a>(p: &'a Predicate, out: &mut Vec<&'a str>) {
    match p {
        Predicate::Contains { param, .. } => out.push(param.as_str()),
        Predicate::Compare { operand: Operand::Param(name), .. } => out.push(name.as_str()),
        Predicate::Compare { .. } => {}
        Predicate::Any(inner) => inner.iter().for_each(|q| collect_params(q, out)),
    }
}

fn project(projection: &Projection, doc: Value) -> Value {
    match projection {
        Projection::All => doc,
        Projection::Fields(fields) => {
            let mut out = serde_json::Map::new();
            for f in fields {
                if let Some(v) = doc.get(f) {
                    out.insert(f.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
    }
}

fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Param(name) => name.clone(),
        Operand::Literal(v) => v.to_string(),
    }
}

fn render_predicate(p: &Predicate) -> String {
    match p {
        Predicate::Contains { field, param } => format!("CONTAINS(c.{field}, {param})"),
        Predicate::Compare { field, op, operand } => format!("c.{field} {} {}", op.symbol(), render_operand(operand)),
        Predicate::Any(inner) => {
            let parts: Vec<String> = inner.iter().map(render_predicate).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}
