use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, Not};
use regex::Regex;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};
use crate::core::types::Value;
use crate::query::attribute::Attribute;

/// Main query enum. Immutable once built; equality and hashing are structural.
pub enum Query<O> {
    Predicate(Predicate<O>),   // Single attribute comparison
    And(Vec<Query<O>>),        // All children match
    Or(Vec<Query<O>>),         // At least one child matches
    Not(Box<Query<O>>),        // Child does not match
    All,                       // Every object
    None,                      // No object
}

/// Leaf query: one attribute compared against operand value(s)
pub struct Predicate<O> {
    pub attribute: Attribute<O>,
    pub operator: Operator,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal(Value),
    In(Vec<Value>),
    LessThan { value: Value, inclusive: bool },
    GreaterThan { value: Value, inclusive: bool },
    Between { lower: Value, lower_inclusive: bool, upper: Value, upper_inclusive: bool },
    Has,
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    MatchesRegex(Pattern),
}

/// Capability tag an index declares support for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Equal,
    In,
    LessThan,
    GreaterThan,
    Between,
    Has,
    StartsWith,
    EndsWith,
    Contains,
    MatchesRegex,
}

impl Operator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::Equal(_) => OperatorKind::Equal,
            Operator::In(_) => OperatorKind::In,
            Operator::LessThan { .. } => OperatorKind::LessThan,
            Operator::GreaterThan { .. } => OperatorKind::GreaterThan,
            Operator::Between { .. } => OperatorKind::Between,
            Operator::Has => OperatorKind::Has,
            Operator::StartsWith(_) => OperatorKind::StartsWith,
            Operator::EndsWith(_) => OperatorKind::EndsWith,
            Operator::Contains(_) => OperatorKind::Contains,
            Operator::MatchesRegex(_) => OperatorKind::MatchesRegex,
        }
    }

    /// Operand values that must share the attribute's declared type
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Operator::Equal(v) => vec![v],
            Operator::In(values) => values.iter().collect(),
            Operator::LessThan { value, .. } | Operator::GreaterThan { value, .. } => vec![value],
            Operator::Between { lower, upper, .. } => vec![lower, upper],
            _ => Vec::new(),
        }
    }

    pub fn is_string_operator(&self) -> bool {
        matches!(
            self,
            Operator::StartsWith(_) | Operator::EndsWith(_) | Operator::Contains(_) | Operator::MatchesRegex(_)
        )
    }
}

/// Compiled regex that matches whole values. Compares by source pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", source))?;
        Ok(Pattern { source: source.to_string(), regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl<O> Query<O> {
    pub fn equal(attribute: &Attribute<O>, value: impl Into<Value>) -> Self {
        Self::predicate(attribute, Operator::Equal(value.into()))
    }

    pub fn in_values<V: Into<Value>>(attribute: &Attribute<O>, values: impl IntoIterator<Item = V>) -> Self {
        Self::predicate(attribute, Operator::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn less_than(attribute: &Attribute<O>, value: impl Into<Value>) -> Self {
        Self::predicate(attribute, Operator::LessThan { value: value.into(), inclusive: false })
    }

    pub fn less_than_or_equal(attribute: &Attribute<O>, value: impl Into<Value>) -> Self {
        Self::predicate(attribute, Operator::LessThan { value: value.into(), inclusive: true })
    }

    pub fn greater_than(attribute: &Attribute<O>, value: impl Into<Value>) -> Self {
        Self::predicate(attribute, Operator::GreaterThan { value: value.into(), inclusive: false })
    }

    pub fn greater_than_or_equal(attribute: &Attribute<O>, value: impl Into<Value>) -> Self {
        Self::predicate(attribute, Operator::GreaterThan { value: value.into(), inclusive: true })
    }

    pub fn between(
        attribute: &Attribute<O>,
        lower: impl Into<Value>,
        lower_inclusive: bool,
        upper: impl Into<Value>,
        upper_inclusive: bool,
    ) -> Self {
        Self::predicate(attribute, Operator::Between {
            lower: lower.into(),
            lower_inclusive,
            upper: upper.into(),
            upper_inclusive,
        })
    }

    pub fn has(attribute: &Attribute<O>) -> Self {
        Self::predicate(attribute, Operator::Has)
    }

    pub fn starts_with(attribute: &Attribute<O>, prefix: impl Into<String>) -> Self {
        Self::predicate(attribute, Operator::StartsWith(prefix.into()))
    }

    pub fn ends_with(attribute: &Attribute<O>, suffix: impl Into<String>) -> Self {
        Self::predicate(attribute, Operator::EndsWith(suffix.into()))
    }

    pub fn contains(attribute: &Attribute<O>, fragment: impl Into<String>) -> Self {
        Self::predicate(attribute, Operator::Contains(fragment.into()))
    }

    pub fn matches_regex(attribute: &Attribute<O>, pattern: &str) -> Result<Self> {
        Ok(Self::predicate(attribute, Operator::MatchesRegex(Pattern::new(pattern)?)))
    }

    pub fn all() -> Self {
        Query::All
    }

    pub fn none() -> Self {
        Query::None
    }

    /// Conjunction of `children`. An empty list is rejected here, not at retrieval.
    pub fn and(children: Vec<Query<O>>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::invalid_query("and() requires at least one child query"));
        }
        Ok(Query::And(children))
    }

    /// Disjunction of `children`. An empty list is rejected here, not at retrieval.
    pub fn or(children: Vec<Query<O>>) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::invalid_query("or() requires at least one child query"));
        }
        Ok(Query::Or(children))
    }

    pub fn negate(query: Query<O>) -> Self {
        Query::Not(Box::new(query))
    }

    fn predicate(attribute: &Attribute<O>, operator: Operator) -> Self {
        Query::Predicate(Predicate { attribute: attribute.clone(), operator })
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, Query::And(_) | Query::Or(_) | Query::Not(_))
    }

    pub fn as_predicate(&self) -> Option<&Predicate<O>> {
        match self {
            Query::Predicate(p) => Some(p),
            _ => None,
        }
    }
}

impl<O> Clone for Query<O> {
    fn clone(&self) -> Self {
        match self {
            Query::Predicate(p) => Query::Predicate(p.clone()),
            Query::And(children) => Query::And(children.clone()),
            Query::Or(children) => Query::Or(children.clone()),
            Query::Not(child) => Query::Not(child.clone()),
            Query::All => Query::All,
            Query::None => Query::None,
        }
    }
}

impl<O> PartialEq for Query<O> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Query::Predicate(a), Query::Predicate(b)) => a == b,
            (Query::And(a), Query::And(b)) => a == b,
            (Query::Or(a), Query::Or(b)) => a == b,
            (Query::Not(a), Query::Not(b)) => a == b,
            (Query::All, Query::All) | (Query::None, Query::None) => true,
            _ => false,
        }
    }
}

impl<O> Eq for Query<O> {}

impl<O> Hash for Query<O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Query::Predicate(p) => p.hash(state),
            Query::And(children) | Query::Or(children) => children.hash(state),
            Query::Not(child) => child.hash(state),
            Query::All | Query::None => {}
        }
    }
}

impl<O> Clone for Predicate<O> {
    fn clone(&self) -> Self {
        Predicate { attribute: self.attribute.clone(), operator: self.operator.clone() }
    }
}

impl<O> PartialEq for Predicate<O> {
    fn eq(&self, other: &Self) -> bool {
        self.attribute == other.attribute && self.operator == other.operator
    }
}

impl<O> Eq for Predicate<O> {}

impl<O> Hash for Predicate<O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attribute.hash(state);
        self.operator.hash(state);
    }
}

impl<O> fmt::Debug for Predicate<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<O> fmt::Debug for Query<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

fn join_values(values: &[Value]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

impl<O> fmt::Display for Predicate<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = self.attribute.name();
        match &self.operator {
            Operator::Equal(v) => write!(f, "equal(\"{}\", {})", name, v),
            Operator::In(values) => write!(f, "in(\"{}\", [{}])", name, join_values(values)),
            Operator::LessThan { value, inclusive } => {
                let op = if *inclusive { "lessThanOrEqualTo" } else { "lessThan" };
                write!(f, "{}(\"{}\", {})", op, name, value)
            }
            Operator::GreaterThan { value, inclusive } => {
                let op = if *inclusive { "greaterThanOrEqualTo" } else { "greaterThan" };
                write!(f, "{}(\"{}\", {})", op, name, value)
            }
            Operator::Between { lower, lower_inclusive, upper, upper_inclusive } => write!(
                f,
                "between(\"{}\", {}{}, {}{})",
                name,
                if *lower_inclusive { "[" } else { "(" },
                lower,
                upper,
                if *upper_inclusive { "]" } else { ")" },
            ),
            Operator::Has => write!(f, "has(\"{}\")", name),
            Operator::StartsWith(s) => write!(f, "startsWith(\"{}\", \"{}\")", name, s),
            Operator::EndsWith(s) => write!(f, "endsWith(\"{}\", \"{}\")", name, s),
            Operator::Contains(s) => write!(f, "contains(\"{}\", \"{}\")", name, s),
            Operator::MatchesRegex(p) => write!(f, "matchesRegex(\"{}\", /{}/)", name, p.as_str()),
        }
    }
}

impl<O> fmt::Display for Query<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Query::Predicate(p) => write!(f, "{}", p),
            Query::And(children) | Query::Or(children) => {
                f.write_str(if matches!(self, Query::And(_)) { "and(" } else { "or(" })?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            Query::Not(child) => write!(f, "not({})", child),
            Query::All => f.write_str("all()"),
            Query::None => f.write_str("none()"),
        }
    }
}

// `a & b`, `a | b` and `!a` flatten into the n-ary combinators.

impl<O> BitAnd for Query<O> {
    type Output = Query<O>;

    fn bitand(self, rhs: Query<O>) -> Query<O> {
        match self {
            Query::And(mut children) => {
                children.push(rhs);
                Query::And(children)
            }
            lhs => Query::And(vec![lhs, rhs]),
        }
    }
}

impl<O> BitOr for Query<O> {
    type Output = Query<O>;

    fn bitor(self, rhs: Query<O>) -> Query<O> {
        match self {
            Query::Or(mut children) => {
                children.push(rhs);
                Query::Or(children)
            }
            lhs => Query::Or(vec![lhs, rhs]),
        }
    }
}

impl<O> Not for Query<O> {
    type Output = Query<O>;

    fn not(self) -> Query<O> {
        Query::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use crate::core::error::ErrorKind;

    struct Car {
        model: String,
        price: f64,
    }

    fn model() -> Attribute<Car> {
        Attribute::simple("model", |c: &Car| c.model.clone())
    }

    fn price() -> Attribute<Car> {
        Attribute::simple("price", |c: &Car| c.price)
    }

    #[test]
    fn empty_combinators_are_rejected_at_construction() {
        let err = Query::<Car>::and(Vec::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidQuery);
        assert!(Query::<Car>::or(Vec::new()).is_err());
    }

    #[test]
    fn structurally_equal_queries_dedupe_in_a_set() {
        let a = Query::equal(&model(), "Civic") & Query::less_than(&price(), 5000.0);
        let b = Query::equal(&model(), "Civic") & Query::less_than(&price(), 5000.0);
        let c = Query::equal(&model(), "Civic") & Query::less_than_or_equal(&price(), 5000.0);
        let set: HashSet<_> = vec![a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn operators_flatten_chains() {
        let q = Query::equal(&model(), "A") | Query::equal(&model(), "B") | Query::equal(&model(), "C");
        match q {
            Query::Or(children) => assert_eq!(children.len(), 3),
            other => panic!("expected or, got {}", other),
        }
    }

    #[test]
    fn display_reads_like_the_builder() {
        let q = Query::equal(&model(), "Civic") & !Query::greater_than(&price(), 100.0);
        assert_eq!(q.to_string(), "and(equal(\"model\", \"Civic\"), not(greaterThan(\"price\", 100)))");
    }

    #[test]
    fn regex_patterns_match_whole_values() {
        let q = Query::matches_regex(&model(), "Ci.*").unwrap();
        let pattern = match &q {
            Query::Predicate(Predicate { operator: Operator::MatchesRegex(p), .. }) => p.clone(),
            _ => unreachable!(),
        };
        assert!(pattern.is_match("Civic"));
        assert!(!pattern.is_match("A Civic"));
        assert!(Query::matches_regex(&model(), "(").is_err());
    }
}
