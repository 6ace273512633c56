use std::cmp::Ordering;
use std::hash::Hash;
use roaring::RoaringBitmap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::store::ObjectStore;
use crate::core::types::{ObjectId, Value};
use crate::query::options::{Deduplication, OrderBy, QueryOptions, SortOrder};
use crate::search::merge::BoxedSource;
use crate::search::plan::PlanNode;

/// Lazy view of the objects matching one retrieve call.
///
/// Borrows the collection state it was planned against. Each `iter()` re-walks the plan;
/// dropping the iterator stops the walk. Ordering and `Materialize` deduplication collect
/// the matching ids first.
pub struct ResultSet<'a, O: 'static> {
    root: BoxedSource<'a, O>,
    store: &'a ObjectStore<O>,
    order_by: Vec<OrderBy<O>>,
    deduplication: Deduplication,
}

impl<'a, O: Eq + Hash + 'static> ResultSet<'a, O> {
    pub(crate) fn new(root: BoxedSource<'a, O>, store: &'a ObjectStore<O>, options: &QueryOptions<O>) -> Self {
        ResultSet {
            root,
            store,
            order_by: options.order_by.clone(),
            deduplication: options.deduplication,
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &'a O> + '_> {
        let store = self.store;
        if self.order_by.is_empty() && self.deduplication != Deduplication::Materialize {
            return Box::new(self.root.ids().filter_map(move |id| store.get(id)));
        }
        Box::new(self.materialize().into_iter().filter_map(move |id| store.get(id)))
    }

    fn materialize(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = if self.deduplication == Deduplication::Materialize {
            let mut seen = RoaringBitmap::new();
            self.root.ids().filter(|id| seen.insert(id.0)).collect()
        } else {
            self.root.ids().collect()
        };
        if !self.order_by.is_empty() {
            // Sort keys are extracted once per object; the first value of a multi-valued
            // attribute is its key
            let mut keyed: Vec<(Vec<Option<Value>>, ObjectId)> = ids
                .into_iter()
                .filter_map(|id| {
                    let object = self.store.get(id)?;
                    let keys = self
                        .order_by
                        .iter()
                        .map(|o| o.attribute.values(object).into_iter().next())
                        .collect();
                    Some((keys, id))
                })
                .collect();
            keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
            ids = keyed.into_iter().map(|(_, id)| id).collect();
        }
        ids
    }

    /// Missing values sort last in either direction
    fn compare_keys(&self, a: &[Option<Value>], b: &[Option<Value>]) -> Ordering {
        for ((x, y), order) in a.iter().zip(b).zip(self.order_by.iter().map(|o| o.order)) {
            let ordering = match (x, y) {
                (Some(x), Some(y)) => match order {
                    SortOrder::Asc => x.cmp(y),
                    SortOrder::Desc => y.cmp(x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Exact number of objects `iter()` yields, duplicates included
    pub fn size(&self) -> usize {
        if self.deduplication == Deduplication::Materialize {
            return self.materialize().len();
        }
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.ids().next().is_none()
    }

    /// Whether `object` (by equality) is in the result
    pub fn contains(&self, object: &O) -> bool {
        match self.store.id_of(object) {
            Some(id) => self.store.get(id).is_some_and(|stored| self.root.contains(id, stored)),
            None => false,
        }
    }

    /// The only matching object; `NotFound` when nothing matches, `NonUnique` when more
    /// than one does
    pub fn unique_result(&self) -> Result<&'a O> {
        let mut iter = self.iter();
        let first = iter.next().ok_or_else(|| {
            Error::new(ErrorKind::NotFound, "query matched no objects".to_string())
        })?;
        if iter.next().is_some() {
            return Err(Error::new(ErrorKind::NonUnique, "query matched more than one object".to_string()));
        }
        Ok(first)
    }

    pub fn retrieval_cost(&self) -> u32 {
        self.root.retrieval_cost()
    }

    /// Estimated, not exact, result size
    pub fn merge_cost(&self) -> u64 {
        self.root.merge_cost()
    }

    pub fn explain(&self) -> PlanNode {
        self.root.describe()
    }

    /// End the read. Equivalent to dropping the result set.
    pub fn close(self) {}
}

impl<'r, 'a, O: Eq + Hash + 'static> IntoIterator for &'r ResultSet<'a, O> {
    type Item = &'a O;
    type IntoIter = Box<dyn Iterator<Item = &'a O> + 'r>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
