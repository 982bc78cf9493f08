// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Query model shared by the store implementations.
//!
//! Filters are conjunctions of per-field conditions evaluated against the
//! top-level keys of a JSON document. A missing field never equals a value
//! and always satisfies `NotIn`.

use std::cmp::Ordering;

use serde_json::Value;

use super::StoredDocument;

/// Condition on a single top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    NotIn(Vec<Value>),
    In(Vec<Value>),
    /// Case-insensitive substring match on string fields.
    Contains(String),
}

impl Condition {
    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => value == Some(expected),
            Condition::NotIn(excluded) => value.map_or(true, |v| !excluded.contains(v)),
            Condition::In(allowed) => value.is_some_and(|v| allowed.contains(v)),
            Condition::Contains(needle) => value
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
        }
    }
}

/// Conjunction of field conditions, with an optional disjunctive group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    all: Vec<(String, Condition)>,
    any: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.all.push((field.to_string(), Condition::Eq(value.into())));
        self
    }

    pub fn not_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.all.push((field.to_string(), Condition::NotIn(values)));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.all.push((field.to_string(), Condition::In(values)));
        self
    }

    /// Adds a condition to the "any of" group; the group matches if at least one holds.
    pub fn or_contains(mut self, field: &str, needle: &str) -> Self {
        self.any
            .push((field.to_string(), Condition::Contains(needle.to_string())));
        self
    }

    pub fn matches(&self, body: &Value) -> bool {
        let all = self
            .all
            .iter()
            .all(|(field, cond)| cond.matches(body.get(field)));
        let any = self.any.is_empty()
            || self
                .any
                .iter()
                .any(|(field, cond)| cond.matches(body.get(field)));
        all && any
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Find parameters: filter, sort, skip, limit.
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<(String, SortOrder)>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_string(), order));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply filter, sort and pagination to a full collection scan.
    pub(crate) fn apply(
        &self,
        docs: impl IntoIterator<Item = StoredDocument>,
    ) -> (Vec<StoredDocument>, usize) {
        let mut matched: Vec<StoredDocument> = docs
            .into_iter()
            .filter(|doc| self.filter.matches(&doc.body))
            .collect();
        let total = matched.len();

        if let Some((field, order)) = &self.sort {
            matched.sort_by(|a, b| {
                let ord = compare_values(a.body.get(field), b.body.get(field))
                    .then_with(|| a.id.cmp(&b.id));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }

        let page = matched
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();
        (page, total)
    }
}

/// Total order over the JSON values used as sort keys.
/// Missing < null < bool < number < string; other kinds compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, body: Value) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            version: 1,
            body,
        }
    }

    #[test]
    fn not_in_matches_missing_field() {
        let filter = Filter::new().not_in("status", ["closed", "resolved"]);
        assert!(filter.matches(&json!({"status": "open"})));
        assert!(filter.matches(&json!({})));
        assert!(!filter.matches(&json!({"status": "closed"})));
    }

    #[test]
    fn any_group_requires_one_match() {
        let filter = Filter::new()
            .eq("is_active", true)
            .or_contains("username", "ALI")
            .or_contains("email", "ali");
        assert!(filter.matches(&json!({"is_active": true, "username": "alice", "email": "a@x"})));
        assert!(!filter.matches(&json!({"is_active": true, "username": "bob", "email": "b@x"})));
        assert!(!filter.matches(&json!({"is_active": false, "username": "alice"})));
    }

    #[test]
    fn apply_sorts_numbers_descending_and_paginates() {
        let docs = vec![
            doc("a", json!({"sequence": 1})),
            doc("b", json!({"sequence": 3})),
            doc("c", json!({"sequence": 2})),
        ];
        let query = FindQuery::new()
            .sort_by("sequence", SortOrder::Descending)
            .skip(1)
            .limit(5);
        let (page, total) = query.apply(docs);
        assert_eq!(total, 3);
        let ids: Vec<_> = page.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn limit_zero_still_reports_total() {
        let docs = vec![doc("a", json!({"x": 1})), doc("b", json!({"x": 1}))];
        let (page, total) = FindQuery::new().limit(0).apply(docs);
        assert!(page.is_empty());
        assert_eq!(total, 2);
    }
}
