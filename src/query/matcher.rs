use std::cmp::Ordering;
use crate::core::types::Value;
use crate::query::ast::{Operator, Predicate, Query};

/// Object matcher - reference semantics for every query shape.
///
/// Indexes must agree with this on every object; the engine falls back to it when no
/// index can answer a leaf and uses it for membership tests on scanned sources.
pub struct ObjectMatcher;

impl ObjectMatcher {
    /// Check if object matches query
    pub fn matches<O>(object: &O, query: &Query<O>) -> bool {
        match query {
            Query::All => true,
            Query::None => false,
            Query::Predicate(predicate) => Self::matches_predicate(object, predicate),
            Query::And(children) => children.iter().all(|q| Self::matches(object, q)),
            Query::Or(children) => children.iter().any(|q| Self::matches(object, q)),
            Query::Not(child) => !Self::matches(object, child),
        }
    }

    /// A multi-valued attribute matches when any of its values does
    pub fn matches_predicate<O>(object: &O, predicate: &Predicate<O>) -> bool {
        let values = predicate.attribute.values(object);
        match &predicate.operator {
            Operator::Has => !values.is_empty(),
            op => values.iter().any(|v| Self::matches_value(op, v)),
        }
    }

    /// Operator test against one extracted value
    pub fn matches_value(operator: &Operator, value: &Value) -> bool {
        match operator {
            Operator::Equal(expected) => value == expected,
            Operator::In(expected) => expected.contains(value),
            Operator::LessThan { value: bound, inclusive } => match value.cmp(bound) {
                Ordering::Less => true,
                Ordering::Equal => *inclusive,
                Ordering::Greater => false,
            },
            Operator::GreaterThan { value: bound, inclusive } => match value.cmp(bound) {
                Ordering::Greater => true,
                Ordering::Equal => *inclusive,
                Ordering::Less => false,
            },
            Operator::Between { lower, lower_inclusive, upper, upper_inclusive } => {
                let above = match value.cmp(lower) {
                    Ordering::Greater => true,
                    Ordering::Equal => *lower_inclusive,
                    Ordering::Less => false,
                };
                let below = match value.cmp(upper) {
                    Ordering::Less => true,
                    Ordering::Equal => *upper_inclusive,
                    Ordering::Greater => false,
                };
                above && below
            }
            Operator::Has => true,
            // String operators only ever see text values
            Operator::StartsWith(prefix) => value.as_text().is_some_and(|s| s.starts_with(prefix.as_str())),
            Operator::EndsWith(suffix) => value.as_text().is_some_and(|s| s.ends_with(suffix.as_str())),
            Operator::Contains(fragment) => value.as_text().is_some_and(|s| s.contains(fragment.as_str())),
            Operator::MatchesRegex(pattern) => value.as_text().is_some_and(|s| pattern.is_match(s)),
        }
    }
}
