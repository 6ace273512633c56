use std::borrow::Cow;
use std::hash::Hash;
use roaring::RoaringBitmap;
use crate::core::store::ObjectStore;
use crate::core::types::ObjectId;
use crate::query::ast::{Predicate, Query};
use crate::query::matcher::ObjectMatcher;
use crate::search::plan::{PlanNode, PlanStep};

/// Lazy stream of matching ids with a membership test.
///
/// `ids()` may be called any number of times; each call walks the underlying structure
/// again. `contains` receives the object so sources that have no id set (scans) can test
/// it directly.
pub trait ResultSource<O> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_>;

    fn contains(&self, id: ObjectId, object: &O) -> bool;

    /// Cost of producing the stream, as declared by the index that built it
    fn retrieval_cost(&self) -> u32;

    /// Estimated number of ids the stream yields
    fn merge_cost(&self) -> u64;

    fn describe(&self) -> PlanNode;

    fn count(&self) -> usize {
        self.ids().count()
    }
}

/// Ids held in one bitmap, borrowed from an index or computed on the spot
pub struct BitmapSource<'a> {
    bitmap: Cow<'a, RoaringBitmap>,
    retrieval_cost: u32,
    step: PlanStep,
}

impl<'a> BitmapSource<'a> {
    pub fn borrowed(bitmap: &'a RoaringBitmap, retrieval_cost: u32, step: PlanStep) -> Self {
        BitmapSource { bitmap: Cow::Borrowed(bitmap), retrieval_cost, step }
    }

    pub fn owned(bitmap: RoaringBitmap, retrieval_cost: u32, step: PlanStep) -> Self {
        BitmapSource { bitmap: Cow::Owned(bitmap), retrieval_cost, step }
    }
}

impl<'a, O> ResultSource<O> for BitmapSource<'a> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(self.bitmap.iter().map(ObjectId))
    }

    fn contains(&self, id: ObjectId, _object: &O) -> bool {
        self.bitmap.contains(id.0)
    }

    fn retrieval_cost(&self) -> u32 {
        self.retrieval_cost
    }

    fn merge_cost(&self) -> u64 {
        self.bitmap.len()
    }

    fn describe(&self) -> PlanNode {
        PlanNode::leaf(self.step.clone(), self.retrieval_cost, self.bitmap.len())
    }

    fn count(&self) -> usize {
        self.bitmap.len() as usize
    }
}

// Above this many keys a membership test re-evaluates the predicate on the object
// instead of probing every key's bitmap.
const KEY_PROBE_LIMIT: usize = 8;

/// Union of the bitmaps of several index keys, streamed key by key.
///
/// An object stored under more than one of the keys (multi-valued attributes) is
/// yielded once.
pub struct KeySetSource<'a, O> {
    bitmaps: Vec<&'a RoaringBitmap>,
    predicate: Predicate<O>,
    retrieval_cost: u32,
    step: PlanStep,
}

impl<'a, O> KeySetSource<'a, O> {
    pub fn new(bitmaps: Vec<&'a RoaringBitmap>, predicate: Predicate<O>, retrieval_cost: u32, step: PlanStep) -> Self {
        KeySetSource { bitmaps, predicate, retrieval_cost, step }
    }
}

impl<'a, O> ResultSource<O> for KeySetSource<'a, O> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        if self.bitmaps.len() == 1 {
            return Box::new(self.bitmaps[0].iter().map(ObjectId));
        }
        let mut seen = RoaringBitmap::new();
        Box::new(
            self.bitmaps
                .iter()
                .copied()
                .flat_map(|bitmap| bitmap.iter())
                .filter(move |id| seen.insert(*id))
                .map(ObjectId),
        )
    }

    fn contains(&self, id: ObjectId, object: &O) -> bool {
        if self.bitmaps.len() <= KEY_PROBE_LIMIT {
            self.bitmaps.iter().any(|bitmap| bitmap.contains(id.0))
        } else {
            ObjectMatcher::matches_predicate(object, &self.predicate)
        }
    }

    fn retrieval_cost(&self) -> u32 {
        self.retrieval_cost
    }

    fn merge_cost(&self) -> u64 {
        self.bitmaps.iter().map(|b| b.len()).sum()
    }

    fn describe(&self) -> PlanNode {
        PlanNode::leaf(self.step.clone(), self.retrieval_cost, ResultSource::<O>::merge_cost(self))
    }
}

pub struct EmptySource;

impl<O> ResultSource<O> for EmptySource {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(std::iter::empty())
    }

    fn contains(&self, _id: ObjectId, _object: &O) -> bool {
        false
    }

    fn retrieval_cost(&self) -> u32 {
        0
    }

    fn merge_cost(&self) -> u64 {
        0
    }

    fn describe(&self) -> PlanNode {
        PlanNode::leaf(PlanStep::Empty, 0, 0)
    }
}

/// Every object in the store
pub struct AllSource<'a, O> {
    store: &'a ObjectStore<O>,
}

impl<'a, O> AllSource<'a, O> {
    pub fn new(store: &'a ObjectStore<O>) -> Self {
        AllSource { store }
    }
}

impl<'a, O: Eq + Hash> ResultSource<O> for AllSource<'a, O> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(self.store.ids())
    }

    fn contains(&self, id: ObjectId, _object: &O) -> bool {
        self.store.contains_id(id)
    }

    fn retrieval_cost(&self) -> u32 {
        0
    }

    fn merge_cost(&self) -> u64 {
        self.store.len() as u64
    }

    fn describe(&self) -> PlanNode {
        PlanNode::leaf(PlanStep::All, 0, self.store.len() as u64)
    }

    fn count(&self) -> usize {
        self.store.len()
    }
}

/// Fallback for queries no index can answer: test every object
pub struct ScanSource<'a, O> {
    store: &'a ObjectStore<O>,
    query: Query<O>,
}

impl<'a, O> ScanSource<'a, O> {
    pub fn new(store: &'a ObjectStore<O>, query: Query<O>) -> Self {
        ScanSource { store, query }
    }
}

impl<'a, O: Eq + Hash> ResultSource<O> for ScanSource<'a, O> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(
            self.store
                .iter()
                .filter(|(_, object)| ObjectMatcher::matches(*object, &self.query))
                .map(|(id, _)| id),
        )
    }

    fn contains(&self, _id: ObjectId, object: &O) -> bool {
        ObjectMatcher::matches(object, &self.query)
    }

    fn retrieval_cost(&self) -> u32 {
        u32::MAX
    }

    fn merge_cost(&self) -> u64 {
        self.store.len() as u64
    }

    fn describe(&self) -> PlanNode {
        PlanNode::leaf(
            PlanStep::Scan { query: self.query.to_string() },
            u32::MAX,
            self.store.len() as u64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::query::attribute::Attribute;

    fn store() -> ObjectStore<i64> {
        let mut store = ObjectStore::new();
        for (id, v) in store.reserve_ids(6).unwrap().into_iter().zip(0..6i64) {
            store.insert(id, Arc::new(v));
        }
        store
    }

    fn identity() -> Attribute<i64> {
        Attribute::simple("value", |v: &i64| *v)
    }

    #[test]
    fn key_set_yields_shared_ids_once() {
        let a: RoaringBitmap = [1u32, 2, 3].into_iter().collect();
        let b: RoaringBitmap = [3u32, 4].into_iter().collect();
        let predicate = Predicate { attribute: identity(), operator: crate::query::ast::Operator::Has };
        let source = KeySetSource::new(vec![&a, &b], predicate, 30, PlanStep::Empty);
        let ids: Vec<u32> = ResultSource::<i64>::ids(&source).map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(ResultSource::<i64>::merge_cost(&source), 5);
        assert!(source.contains(ObjectId(4), &4));
    }

    #[test]
    fn scan_filters_with_the_matcher() {
        let store = store();
        let source = ScanSource::new(&store, Query::greater_than(&identity(), 3i64));
        let ids: Vec<ObjectId> = source.ids().collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(source.retrieval_cost(), u32::MAX);
        assert_eq!(source.merge_cost(), 6);
        assert!(source.contains(ObjectId(0), &5));
        assert!(!source.contains(ObjectId(0), &1));
    }

    #[test]
    fn ids_can_be_walked_twice() {
        let store = store();
        let all = AllSource::new(&store);
        assert_eq!(all.ids().count(), 6);
        assert_eq!(all.ids().count(), 6);
        assert_eq!(all.count(), 6);
    }
}
