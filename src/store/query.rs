//! Declarative query options
//!
//! A query is a list of equality/range/membership filters, a list of sort
//! keys and an optional result limit, the same shape list views send:
//!
//! ```json
//! {
//!   "where": [{"field": "status", "operator": "==", "value": "pending"}],
//!   "orderBy": [{"field": "createdAt", "direction": "desc"}],
//!   "limit": 50
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::{StoreError, StoreResult};
use super::types::Document;

/// Maximum number of values accepted by `in`, `not-in` and `array-contains-any`
pub const MAX_DISJUNCTION_VALUES: usize = 30;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
}

impl FilterOp {
    /// Operators whose value must be an array
    fn takes_array(&self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::ArrayContainsAny)
    }
}

impl FromStr for FilterOp {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "in" => Ok(Self::In),
            "not-in" => Ok(Self::NotIn),
            "array-contains" => Ok(Self::ArrayContains),
            "array-contains-any" => Ok(Self::ArrayContainsAny),
            other => Err(StoreError::InvalidQuery(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
        };
        write!(f, "{}", s)
    }
}

/// A single `where` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    #[serde(alias = "op")]
    pub operator: FilterOp,
    pub value: Value,
}

impl WhereClause {
    pub fn new(field: impl Into<String>, operator: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluate against a document. A missing field never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };

        match self.operator {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Ne => !values_equal(actual, &self.value),
            FilterOp::Lt => same_type_cmp(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                same_type_cmp(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Gt => same_type_cmp(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                same_type_cmp(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::In => as_list(&self.value)
                .iter()
                .any(|candidate| values_equal(actual, candidate)),
            FilterOp::NotIn => !as_list(&self.value)
                .iter()
                .any(|candidate| values_equal(actual, candidate)),
            FilterOp::ArrayContains => actual
                .as_array()
                .map(|items| items.iter().any(|item| values_equal(item, &self.value)))
                .unwrap_or(false),
            FilterOp::ArrayContainsAny => actual
                .as_array()
                .map(|items| {
                    items.iter().any(|item| {
                        as_list(&self.value)
                            .iter()
                            .any(|candidate| values_equal(item, candidate))
                    })
                })
                .unwrap_or(false),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(StoreError::InvalidQuery(format!(
                "unknown sort direction '{}'",
                other
            ))),
        }
    }
}

/// A single sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Filters, ordering and limit applied to a collection listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(rename = "where", default)]
    pub filters: Vec<WhereClause>,
    #[serde(rename = "orderBy", default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a filter
    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(WhereClause::new(field, op, value));
        self
    }

    /// Builder method: add a sort key
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Builder method: cap the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject malformed options before they reach a listener
    pub fn validate(&self) -> StoreResult<()> {
        for clause in &self.filters {
            if clause.field.trim().is_empty() {
                return Err(StoreError::InvalidQuery("filter field is empty".to_string()));
            }
            if clause.operator.takes_array() {
                let Some(values) = clause.value.as_array() else {
                    return Err(StoreError::InvalidQuery(format!(
                        "'{}' on '{}' requires an array value",
                        clause.operator, clause.field
                    )));
                };
                if values.is_empty() || values.len() > MAX_DISJUNCTION_VALUES {
                    return Err(StoreError::InvalidQuery(format!(
                        "'{}' on '{}' takes 1 to {} values",
                        clause.operator, clause.field, MAX_DISJUNCTION_VALUES
                    )));
                }
            }
        }

        for order in &self.order_by {
            if order.field.trim().is_empty() {
                return Err(StoreError::InvalidQuery("orderBy field is empty".to_string()));
            }
        }

        if self.limit == Some(0) {
            return Err(StoreError::InvalidQuery("limit must be positive".to_string()));
        }

        Ok(())
    }

    /// True when every filter matches the document
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|clause| clause.matches(doc))
            && self.order_by.iter().all(|o| doc.field(&o.field).is_some())
    }

    /// Filter, sort and truncate documents already ordered by id
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut results: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if !self.order_by.is_empty() {
            // stable sort keeps id order among ties
            results.sort_by(|a, b| {
                for order in &self.order_by {
                    let ordering = match (a.field(&order.field), b.field(&order.field)) {
                        (Some(x), Some(y)) => compare_values(x, y),
                        _ => Ordering::Equal,
                    };
                    let ordering = match order.direction {
                        Direction::Asc => ordering,
                        Direction::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }

        results
    }
}

fn as_list(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Rank used to order values of different JSON types
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: type rank first, then value
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Equality where `1` and `1.0` are the same number
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

/// Range comparisons only match values of the same type
fn same_type_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if type_rank(a) == type_rank(b) {
        Some(compare_values(a, b))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        let Value::Object(map) = data else {
            panic!("expected object");
        };
        Document::new(id, format!("restaurants/r1/orders/{}", id), map)
    }

    fn sample() -> Vec<Document> {
        vec![
            doc("a", json!({"status": "pending", "total": 12.5, "tags": ["vip"]})),
            doc("b", json!({"status": "done", "total": 30, "tags": []})),
            doc("c", json!({"status": "pending", "total": 8})),
            doc("d", json!({"total": "n/a"})),
        ]
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_equality_filter() {
        let q = QueryOptions::new().filter("status", FilterOp::Eq, "pending");
        assert_eq!(ids(&q.apply(sample())), vec!["a", "c"]);
    }

    #[test]
    fn test_missing_field_never_matches() {
        let q = QueryOptions::new().filter("status", FilterOp::Ne, "pending");
        assert_eq!(ids(&q.apply(sample())), vec!["b"]);
    }

    #[test]
    fn test_range_filter_is_type_strict() {
        let q = QueryOptions::new().filter("total", FilterOp::Gte, 10);
        assert_eq!(ids(&q.apply(sample())), vec!["a", "b"]);
    }

    #[test]
    fn test_in_and_array_contains() {
        let q = QueryOptions::new().filter("status", FilterOp::In, json!(["done", "void"]));
        assert_eq!(ids(&q.apply(sample())), vec!["b"]);

        let q = QueryOptions::new().filter("tags", FilterOp::ArrayContains, "vip");
        assert_eq!(ids(&q.apply(sample())), vec!["a"]);

        let q = QueryOptions::new().filter("tags", FilterOp::ArrayContainsAny, json!(["x", "vip"]));
        assert_eq!(ids(&q.apply(sample())), vec!["a"]);
    }

    #[test]
    fn test_order_and_limit() {
        let q = QueryOptions::new()
            .filter("status", FilterOp::Ne, "void")
            .order_by("total", Direction::Desc)
            .limit(2);
        assert_eq!(ids(&q.apply(sample())), vec!["b", "a"]);
    }

    #[test]
    fn test_order_excludes_missing_field() {
        let q = QueryOptions::new().order_by("status", Direction::Asc);
        assert_eq!(ids(&q.apply(sample())), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_numbers_compare_across_int_and_float() {
        let q = QueryOptions::new().filter("total", FilterOp::Eq, 30.0);
        assert_eq!(ids(&q.apply(sample())), vec!["b"]);
    }

    #[test]
    fn test_validate() {
        assert!(QueryOptions::new().validate().is_ok());
        assert!(QueryOptions::new().limit(0).validate().is_err());
        assert!(QueryOptions::new()
            .filter("status", FilterOp::In, "pending")
            .validate()
            .is_err());
        assert!(QueryOptions::new()
            .filter("status", FilterOp::In, json!([]))
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_options() {
        let json = r#"{
            "where": [{"field": "status", "op": "==", "value": "pending"}],
            "orderBy": [{"field": "createdAt", "direction": "desc"}],
            "limit": 5
        }"#;
        let q: QueryOptions = serde_json::from_str(json).unwrap();
        assert_eq!(q.filters[0].operator, FilterOp::Eq);
        assert_eq!(q.order_by[0].direction, Direction::Desc);
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn test_operator_from_str() {
        assert_eq!("not-in".parse::<FilterOp>().unwrap(), FilterOp::NotIn);
        assert!("like".parse::<FilterOp>().is_err());
    }
}
