use std::hash::Hash;
use roaring::RoaringBitmap;
use crate::core::store::ObjectStore;
use crate::core::types::ObjectId;
use crate::search::plan::{PlanNode, PlanStep};
use crate::search::source::ResultSource;

pub type BoxedSource<'a, O> = Box<dyn ResultSource<O> + 'a>;

/// And of several sources.
///
/// Positive children are ordered cheapest first (merge cost, then retrieval cost, ties
/// kept in declaration order). Only the first is iterated; the rest and every negative
/// child are probed per candidate.
pub struct Intersection<'a, O> {
    store: &'a ObjectStore<O>,
    positives: Vec<BoxedSource<'a, O>>,
    negatives: Vec<BoxedSource<'a, O>>,
}

impl<'a, O: Eq + Hash> Intersection<'a, O> {
    /// `positives` must not be empty
    pub fn new(store: &'a ObjectStore<O>, mut positives: Vec<BoxedSource<'a, O>>, negatives: Vec<BoxedSource<'a, O>>) -> Self {
        debug_assert!(!positives.is_empty());
        positives.sort_by_key(|s| (s.merge_cost(), s.retrieval_cost()));
        Intersection { store, positives, negatives }
    }

    fn accepts(&self, id: ObjectId, object: &O) -> bool {
        self.positives[1..].iter().all(|s| s.contains(id, object))
            && !self.negatives.iter().any(|s| s.contains(id, object))
    }
}

impl<'a, O: Eq + Hash> ResultSource<O> for Intersection<'a, O> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        let Some(driver) = self.positives.first() else {
            return Box::new(std::iter::empty());
        };
        Box::new(driver.ids().filter(move |&id| {
            self.store.get(id).is_some_and(|object| self.accepts(id, object))
        }))
    }

    fn contains(&self, id: ObjectId, object: &O) -> bool {
        self.positives.iter().all(|s| s.contains(id, object))
            && !self.negatives.iter().any(|s| s.contains(id, object))
    }

    fn retrieval_cost(&self) -> u32 {
        self.positives.first().map_or(0, |s| s.retrieval_cost())
    }

    fn merge_cost(&self) -> u64 {
        self.positives.first().map_or(0, |s| s.merge_cost())
    }

    fn describe(&self) -> PlanNode {
        let mut children: Vec<PlanNode> = self.positives.iter().map(|s| s.describe()).collect();
        if !self.negatives.is_empty() {
            children.push(PlanNode::with_children(
                PlanStep::Exclude,
                self.negatives.iter().map(|s| s.retrieval_cost()).max().unwrap_or(0),
                self.negatives.iter().map(|s| s.merge_cost()).sum(),
                self.negatives.iter().map(|s| s.describe()).collect(),
            ));
        }
        PlanNode::with_children(PlanStep::Intersection, self.retrieval_cost(), self.merge_cost(), children)
    }
}

/// Or of several sources. With `deduplicate` an id is emitted at most once, tracked in a
/// bitmap of ids already emitted; without it an id appears once per source containing it.
pub struct Union<'a, O> {
    sources: Vec<BoxedSource<'a, O>>,
    deduplicate: bool,
}

impl<'a, O> Union<'a, O> {
    pub fn new(sources: Vec<BoxedSource<'a, O>>, deduplicate: bool) -> Self {
        Union { sources, deduplicate }
    }
}

impl<'a, O> ResultSource<O> for Union<'a, O> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        let chained = self.sources.iter().flat_map(|s| s.ids());
        if self.deduplicate {
            let mut emitted = RoaringBitmap::new();
            Box::new(chained.filter(move |id| emitted.insert(id.0)))
        } else {
            Box::new(chained)
        }
    }

    fn contains(&self, id: ObjectId, object: &O) -> bool {
        self.sources.iter().any(|s| s.contains(id, object))
    }

    fn retrieval_cost(&self) -> u32 {
        self.sources.iter().map(|s| s.retrieval_cost()).max().unwrap_or(0)
    }

    fn merge_cost(&self) -> u64 {
        self.sources.iter().map(|s| s.merge_cost()).sum()
    }

    fn describe(&self) -> PlanNode {
        PlanNode::with_children(
            PlanStep::Union { deduplicated: self.deduplicate },
            self.retrieval_cost(),
            self.merge_cost(),
            self.sources.iter().map(|s| s.describe()).collect(),
        )
    }
}

/// Ids of `include` that `exclude` does not contain
pub struct Difference<'a, O> {
    store: &'a ObjectStore<O>,
    include: BoxedSource<'a, O>,
    exclude: BoxedSource<'a, O>,
}

impl<'a, O> Difference<'a, O> {
    pub fn new(store: &'a ObjectStore<O>, include: BoxedSource<'a, O>, exclude: BoxedSource<'a, O>) -> Self {
        Difference { store, include, exclude }
    }
}

impl<'a, O: Eq + Hash> ResultSource<O> for Difference<'a, O> {
    fn ids(&self) -> Box<dyn Iterator<Item = ObjectId> + '_> {
        Box::new(self.include.ids().filter(move |&id| {
            self.store.get(id).is_some_and(|object| !self.exclude.contains(id, object))
        }))
    }

    fn contains(&self, id: ObjectId, object: &O) -> bool {
        self.include.contains(id, object) && !self.exclude.contains(id, object)
    }

    fn retrieval_cost(&self) -> u32 {
        self.include.retrieval_cost()
    }

    fn merge_cost(&self) -> u64 {
        self.include.merge_cost()
    }

    fn describe(&self) -> PlanNode {
        PlanNode::with_children(
            PlanStep::Difference,
            self.retrieval_cost(),
            self.merge_cost(),
            vec![self.include.describe(), self.exclude.describe()],
        )
    }
}
