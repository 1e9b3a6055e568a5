//! Filtered search: typed filter structs compiled to parameterized queries.

use std::fmt::Debug;

use models::Document;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ServiceError;
use crate::store::query::{OrderBy, Slice};
use crate::store::{CompareOp, Operand, Predicate, Projection, QueryParam, QuerySpec};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Window over results ordered newest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    limit: u32,
    offset: u64,
}

impl Page {
    /// Defaults fill absent values; out-of-range values are rejected rather than clamped.
    pub fn try_new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, ServiceError> {
        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(n) if (1..=MAX_LIMIT as i64).contains(&n) => n as u32,
            Some(n) => return Err(ServiceError::Validation(format!("limit must be within 1..={MAX_LIMIT}, got {n}"))),
        };
        let offset = match offset {
            None => 0,
            Some(n) if n >= 0 => n as u64,
            Some(n) => return Err(ServiceError::Validation(format!("offset must be >= 0, got {n}"))),
        };
        Ok(Self { limit, offset })
    }

    pub fn limit(&self) -> u32 { self.limit }
    pub fn offset(&self) -> u64 { self.offset }
}

impl Default for Page {
    fn default() -> Self { Self { limit: DEFAULT_LIMIT, offset: 0 } }
}

/// Accumulates WHERE clauses and their bound values.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    filter: Vec<Predicate>,
    parameters: Vec<QueryParam>,
}

impl QueryBuilder {
    pub fn new() -> Self { Self::default() }

    fn bind(&mut self, name: &str, value: Value) -> String {
        let name = format!("@{name}");
        self.parameters.push(QueryParam { name: name.clone(), value });
        name
    }

    /// Substring match of one value against any of `fields`.
    pub fn contains_any(&mut self, fields: &[&str], param: &str, value: &str) -> &mut Self {
        let param = self.bind(param, Value::from(value));
        let mut clauses: Vec<Predicate> = fields
            .iter()
            .map(|f| Predicate::Contains { field: (*f).to_string(), param: param.clone() })
            .collect();
        let clause = if clauses.len() == 1 { clauses.remove(0) } else { Predicate::Any(clauses) };
        self.filter.push(clause);
        self
    }

    pub fn compare(&mut self, field: &str, op: CompareOp, param: &str, value: impl Into<Value>) -> &mut Self {
        let param = self.bind(param, value.into());
        self.filter.push(Predicate::Compare { field: field.into(), op, operand: Operand::Param(param) });
        self
    }

    pub fn equals(&mut self, field: &str, param: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(field, CompareOp::Eq, param, value)
    }

    /// Comparison against a constant fixed by code, not by the caller.
    pub fn compare_constant(&mut self, field: &str, op: CompareOp, constant: impl Into<Value>) -> &mut Self {
        self.filter.push(Predicate::Compare { field: field.into(), op, operand: Operand::Literal(constant.into()) });
        self
    }

    pub fn build(mut self, order_field: &str, page: Page) -> QuerySpec {
        let offset = self.bind("offset", Value::from(page.offset()));
        let limit = self.bind("limit", Value::from(page.limit()));
        QuerySpec {
            projection: Projection::All,
            top: None,
            filter: self.filter,
            order_by: Some(OrderBy { field: order_field.into(), descending: true }),
            slice: Some(Slice { offset: Operand::Param(offset), limit: Operand::Param(limit) }),
            parameters: self.parameters,
        }
    }
}

/// Query-string filter for one entity type.
pub trait SearchFilter {
    fn page(&self) -> Result<Page, ServiceError>;
    /// Add one clause per supplied field; absent fields add nothing.
    fn apply(&self, query: &mut QueryBuilder);
}

/// A record type that can be listed through a [`SearchFilter`].
pub trait Searchable: Document {
    type Filter: SearchFilter + DeserializeOwned + Default + Debug + Send + Sync + 'static;
}

/// Empty text counts as not supplied. Whitespace is a real search term.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
