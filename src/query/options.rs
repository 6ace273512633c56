use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use crate::query::attribute::Attribute;

/// Sort order for ordered results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,   // Ascending: 0 → 9, A → Z
    Desc,  // Descending: 9 → 0, Z → A
}

/// How the engine treats objects produced by more than one branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Deduplication {
    /// A root Or emits an object once per direct child it matches. An Or nested under
    /// And, Not or another Or is a set, and a standing index never answers a root Or.
    #[default]
    None,
    /// Or tracks emitted ids and skips repeats while streaming
    Logical,
    /// The final result is collected and deduplicated before iteration
    Materialize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexHint {
    /// Restrict selection to these indexes when any of them can answer the leaf
    Prefer(Vec<String>),
    /// Only these indexes may be used; leaves they cannot answer are scanned
    Force(Vec<String>),
}

pub struct OrderBy<O> {
    pub attribute: Attribute<O>,
    pub order: SortOrder,
}

impl<O> Clone for OrderBy<O> {
    fn clone(&self) -> Self {
        OrderBy { attribute: self.attribute.clone(), order: self.order }
    }
}

impl<O> fmt::Debug for OrderBy<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {:?}", self.attribute.name(), self.order)
    }
}

/// Per-call retrieval and mutation options. Built once, read-only afterwards.
pub struct QueryOptions<O> {
    pub index_hint: Option<IndexHint>,
    pub deduplication: Deduplication,
    pub order_by: Vec<OrderBy<O>>,
    context: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl<O> QueryOptions<O> {
    pub fn new() -> Self {
        QueryOptions {
            index_hint: None,
            deduplication: Deduplication::None,
            order_by: Vec::new(),
            context: HashMap::new(),
        }
    }

    pub fn with_deduplication(mut self, deduplication: Deduplication) -> Self {
        self.deduplication = deduplication;
        self
    }

    pub fn with_index_hint(mut self, hint: IndexHint) -> Self {
        self.index_hint = Some(hint);
        self
    }

    pub fn order_by(mut self, attribute: &Attribute<O>, order: SortOrder) -> Self {
        self.order_by.push(OrderBy { attribute: attribute.clone(), order });
        self
    }

    /// Attach an opaque value for custom indexes. The engine never reads it.
    pub fn with_context<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.context.insert(key.into(), Arc::new(value));
        self
    }

    /// Context value under `key`, if present and of type `T`
    pub fn context<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.context.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub(crate) fn allows_index(&self, name: &str) -> bool {
        match &self.index_hint {
            Some(IndexHint::Force(names)) => names.iter().any(|n| n == name),
            _ => true,
        }
    }
}

impl<O> Default for QueryOptions<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Clone for QueryOptions<O> {
    fn clone(&self) -> Self {
        QueryOptions {
            index_hint: self.index_hint.clone(),
            deduplication: self.deduplication,
            order_by: self.order_by.clone(),
            context: self.context.clone(),
        }
    }
}

impl<O> fmt::Debug for QueryOptions<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut keys: Vec<_> = self.context.keys().collect();
        keys.sort();
        f.debug_struct("QueryOptions")
            .field("index_hint", &self.index_hint)
            .field("deduplication", &self.deduplication)
            .field("order_by", &self.order_by)
            .field("context_keys", &keys)
            .finish()
    }
}
