pub mod hash;
pub mod unique;
pub mod navigable;
pub mod standing;
pub mod registry;

use crate::core::error::Result;
use crate::core::types::{ObjectId, Value};
use crate::query::ast::{OperatorKind, Query};
use crate::query::attribute::Attribute;
use crate::query::options::QueryOptions;
use crate::search::source::ResultSource;

/// Estimated cost of answering a query from one index.
///
/// `retrieval` is a fixed per-index-type constant (lower is faster). `merge` is the number
/// of ids the index expects to return, which drives And ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost {
    pub retrieval: u32,
    pub merge: u64,
}

impl Cost {
    pub fn new(retrieval: u32, merge: u64) -> Self {
        Cost { retrieval, merge }
    }
}

/// What an index answers queries about
pub enum IndexTarget<'a, O> {
    Attribute(&'a Attribute<O>),
    /// A standing query, answered as a whole
    Query(&'a Query<O>),
}

/// Read-only key introspection exposed by indexes that keep an explicit key set
pub trait KeyStatistics {
    /// Distinct keys, ascending
    fn distinct_keys(&self) -> Vec<Value>;

    /// Number of objects stored under `key`
    fn count_for_key(&self, key: &Value) -> usize;

    fn key_count(&self) -> usize;
}

/// Secondary index contract.
///
/// The collection calls `notify_added` and `notify_removed` exactly once per logical
/// change, always with the instance that is (or was) stored. Between mutation calls an
/// index reflects the current values of every object in the collection. An index returns
/// an error instead of panicking when its state does not allow a change; the collection
/// then rolls the whole batch back.
///
/// An attribute index is shared by every attribute equal to its own, that is with the
/// same name and declared type; see [`Attribute`].
pub trait Index<O: 'static>: Send + Sync {
    fn name(&self) -> &str;

    fn target(&self) -> IndexTarget<'_, O>;

    fn supports(&self, kind: OperatorKind) -> bool;

    /// Cheap estimate; must not scan objects
    fn estimate_cost(&self, query: &Query<O>) -> Cost;

    fn retrieve<'a>(&'a self, query: &Query<O>, options: &QueryOptions<O>) -> Result<Box<dyn ResultSource<O> + 'a>>;

    fn notify_added(&mut self, id: ObjectId, object: &O, options: &QueryOptions<O>) -> Result<()>;

    fn notify_removed(&mut self, id: ObjectId, object: &O, options: &QueryOptions<O>) -> Result<()>;

    fn notify_cleared(&mut self);

    fn key_statistics(&self) -> Option<&dyn KeyStatistics> {
        None
    }

    /// Number of objects currently indexed
    fn indexed_count(&self) -> usize;

    fn clone_box(&self) -> Box<dyn Index<O>>;
}

impl<O: 'static> Clone for Box<dyn Index<O>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Predicate of `query` if it targets `attribute` with an operator the index supports
pub(crate) fn supported_predicate<'q, O: 'static>(
    index: &dyn Index<O>,
    attribute: &Attribute<O>,
    query: &'q Query<O>,
) -> Result<&'q crate::query::ast::Predicate<O>> {
    use crate::core::error::{Error, ErrorKind};

    match query {
        Query::Predicate(p) if &p.attribute == attribute && index.supports(p.operator.kind()) => Ok(p),
        other => Err(Error::new(
            ErrorKind::UnsupportedQuery,
            format!("index '{}' cannot answer {}", index.name(), other),
        )),
    }
}
