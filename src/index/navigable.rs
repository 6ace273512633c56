use std::collections::BTreeMap;
use std::ops::Bound;
use roaring::RoaringBitmap;
use crate::core::error::{Error, Result};
use crate::core::types::{ObjectId, Value};
use crate::index::{supported_predicate, Cost, Index, IndexTarget, KeyStatistics};
use crate::query::ast::{Operator, OperatorKind, Query};
use crate::query::attribute::Attribute;
use crate::query::options::QueryOptions;
use crate::search::plan::PlanStep;
use crate::search::source::{BitmapSource, EmptySource, KeySetSource, ResultSource};

pub const NAVIGABLE_RETRIEVAL_COST: u32 = 40;

/// Ordered index: sorted distinct keys → ids. Answers equality, ranges and text
/// prefixes by walking a key range.
pub struct NavigableIndex<O> {
    name: String,
    attribute: Attribute<O>,
    postings: BTreeMap<Value, RoaringBitmap>,
    indexed: RoaringBitmap,
    present: RoaringBitmap,
}

fn bound(value: &Value, inclusive: bool) -> Bound<&Value> {
    if inclusive { Bound::Included(value) } else { Bound::Excluded(value) }
}

impl<O: 'static> NavigableIndex<O> {
    pub fn on(attribute: &Attribute<O>) -> Self {
        Self::named(format!("navigable:{}", attribute.name()), attribute)
    }

    pub fn named(name: impl Into<String>, attribute: &Attribute<O>) -> Self {
        NavigableIndex {
            name: name.into(),
            attribute: attribute.clone(),
            postings: BTreeMap::new(),
            indexed: RoaringBitmap::new(),
            present: RoaringBitmap::new(),
        }
    }

    /// Bitmaps of every key the operator selects, in key order
    fn matching_keys<'a>(&'a self, operator: &Operator) -> Vec<&'a RoaringBitmap> {
        match operator {
            Operator::Equal(v) => self.postings.get(v).into_iter().collect(),
            Operator::In(values) => {
                let mut keys: Vec<&Value> = values.iter().collect();
                keys.sort();
                keys.dedup();
                keys.into_iter().filter_map(|v| self.postings.get(v)).collect()
            }
            Operator::LessThan { value, inclusive } => self
                .postings
                .range::<Value, _>((Bound::Unbounded, bound(value, *inclusive)))
                .map(|(_, b)| b)
                .collect(),
            Operator::GreaterThan { value, inclusive } => self
                .postings
                .range::<Value, _>((bound(value, *inclusive), Bound::Unbounded))
                .map(|(_, b)| b)
                .collect(),
            Operator::Between { lower, lower_inclusive, upper, upper_inclusive } => {
                // BTreeMap::range panics on inverted or empty-exclusive bounds
                if lower > upper || (lower == upper && !(*lower_inclusive && *upper_inclusive)) {
                    return Vec::new();
                }
                self.postings
                    .range::<Value, _>((bound(lower, *lower_inclusive), bound(upper, *upper_inclusive)))
                    .map(|(_, b)| b)
                    .collect()
            }
            Operator::StartsWith(prefix) => {
                let start = Value::Text(prefix.clone());
                self.postings
                    .range::<Value, _>((Bound::Included(&start), Bound::Unbounded))
                    .take_while(|(k, _)| k.as_text().is_some_and(|s| s.starts_with(prefix.as_str())))
                    .map(|(_, b)| b)
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Smallest and largest indexed key
    pub fn key_range(&self) -> Option<(&Value, &Value)> {
        let first = self.postings.keys().next()?;
        let last = self.postings.keys().next_back()?;
        Some((first, last))
    }
}

impl<O: 'static> Index<O> for NavigableIndex<O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> IndexTarget<'_, O> {
        IndexTarget::Attribute(&self.attribute)
    }

    fn supports(&self, kind: OperatorKind) -> bool {
        match kind {
            OperatorKind::Equal
            | OperatorKind::In
            | OperatorKind::Has
            | OperatorKind::LessThan
            | OperatorKind::GreaterThan
            | OperatorKind::Between => true,
            OperatorKind::StartsWith => self.attribute.value_type() == crate::core::types::ValueType::Text,
            _ => false,
        }
    }

    fn estimate_cost(&self, query: &Query<O>) -> Cost {
        let merge = match query.as_predicate() {
            Some(p) if p.operator.kind() == OperatorKind::Has => self.present.len(),
            Some(p) if self.supports(p.operator.kind()) => {
                self.matching_keys(&p.operator).iter().map(|b| b.len()).sum()
            }
            _ => u64::MAX,
        };
        Cost::new(NAVIGABLE_RETRIEVAL_COST, merge)
    }

    fn retrieve<'a>(&'a self, query: &Query<O>, _options: &QueryOptions<O>) -> Result<Box<dyn ResultSource<O> + 'a>> {
        let predicate = supported_predicate(self, &self.attribute, query)?;
        let step = PlanStep::Index { index: self.name.clone(), query: query.to_string() };
        if predicate.operator == Operator::Has {
            return Ok(Box::new(BitmapSource::borrowed(&self.present, NAVIGABLE_RETRIEVAL_COST, step)));
        }
        let bitmaps = self.matching_keys(&predicate.operator);
        Ok(match bitmaps.len() {
            0 => Box::new(EmptySource),
            1 => Box::new(BitmapSource::borrowed(bitmaps[0], NAVIGABLE_RETRIEVAL_COST, step)),
            _ => Box::new(KeySetSource::new(bitmaps, predicate.clone(), NAVIGABLE_RETRIEVAL_COST, step)),
        })
    }

    fn notify_added(&mut self, id: ObjectId, object: &O, _options: &QueryOptions<O>) -> Result<()> {
        if self.indexed.contains(id.0) {
            return Err(Error::invalid_state(format!(
                "index '{}' already holds object {}", self.name, id.0
            )));
        }
        let values = self.attribute.values(object);
        if !values.is_empty() {
            self.present.insert(id.0);
        }
        for value in values {
            self.postings.entry(value).or_default().insert(id.0);
        }
        self.indexed.insert(id.0);
        Ok(())
    }

    fn notify_removed(&mut self, id: ObjectId, object: &O, _options: &QueryOptions<O>) -> Result<()> {
        if !self.indexed.contains(id.0) {
            return Err(Error::invalid_state(format!(
                "index '{}' was never notified of object {}", self.name, id.0
            )));
        }
        for value in self.attribute.values(object) {
            if let Some(bitmap) = self.postings.get_mut(&value) {
                bitmap.remove(id.0);
                if bitmap.is_empty() {
                    self.postings.remove(&value);
                }
            }
        }
        self.present.remove(id.0);
        self.indexed.remove(id.0);
        Ok(())
    }

    fn notify_cleared(&mut self) {
        self.postings.clear();
        self.indexed.clear();
        self.present.clear();
    }

    fn key_statistics(&self) -> Option<&dyn KeyStatistics> {
        Some(self)
    }

    fn indexed_count(&self) -> usize {
        self.indexed.len() as usize
    }

    fn clone_box(&self) -> Box<dyn Index<O>> {
        Box::new(NavigableIndex {
            name: self.name.clone(),
            attribute: self.attribute.clone(),
            postings: self.postings.clone(),
            indexed: self.indexed.clone(),
            present: self.present.clone(),
        })
    }
}

impl<O> KeyStatistics for NavigableIndex<O> {
    fn distinct_keys(&self) -> Vec<Value> {
        self.postings.keys().cloned().collect()
    }

    fn count_for_key(&self, key: &Value) -> usize {
        self.postings.get(key).map_or(0, |b| b.len() as usize)
    }

    fn key_count(&self) -> usize {
        self.postings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Car {
        model: &'static str,
        price: f64,
    }

    const CARS: [(&str, f64); 5] = [
        ("Accord", 9000.0),
        ("Avensis", 5500.0),
        ("Civic", 4000.0),
        ("Civic", 4500.0),
        ("Focus", 6200.0),
    ];

    fn price() -> Attribute<Car> {
        Attribute::simple("price", |c: &Car| c.price)
    }

    fn model() -> Attribute<Car> {
        Attribute::simple("model", |c: &Car| c.model)
    }

    fn build(attribute: &Attribute<Car>) -> NavigableIndex<Car> {
        let mut index = NavigableIndex::on(attribute);
        let opts = QueryOptions::new();
        for (i, (model, price)) in CARS.iter().enumerate() {
            index.notify_added(ObjectId(i as u32), &Car { model: *model, price: *price }, &opts).unwrap();
        }
        index
    }

    fn ids(index: &NavigableIndex<Car>, query: Query<Car>) -> Vec<u32> {
        let mut ids: Vec<u32> = index.retrieve(&query, &QueryOptions::new()).unwrap().ids().map(|id| id.0).collect();
        ids.sort();
        ids
    }

    #[test]
    fn ranges_follow_bound_inclusivity() {
        let index = build(&price());
        assert_eq!(ids(&index, Query::less_than(&price(), 5500.0)), vec![2, 3]);
        assert_eq!(ids(&index, Query::less_than_or_equal(&price(), 5500.0)), vec![1, 2, 3]);
        assert_eq!(ids(&index, Query::greater_than(&price(), 6200.0)), vec![0]);
        assert_eq!(ids(&index, Query::between(&price(), 4500.0, true, 6200.0, false)), vec![1, 3]);
    }

    #[test]
    fn inverted_bounds_are_empty_not_a_panic() {
        let index = build(&price());
        assert!(ids(&index, Query::between(&price(), 9000.0, true, 100.0, true)).is_empty());
        assert!(ids(&index, Query::between(&price(), 5500.0, false, 5500.0, true)).is_empty());
        assert_eq!(ids(&index, Query::between(&price(), 5500.0, true, 5500.0, true)), vec![1]);
    }

    #[test]
    fn prefix_walks_adjacent_text_keys() {
        let index = build(&model());
        assert_eq!(ids(&index, Query::starts_with(&model(), "A")), vec![0, 1]);
        assert_eq!(ids(&index, Query::starts_with(&model(), "Civ")), vec![2, 3]);
        assert!(ids(&index, Query::starts_with(&model(), "Z")).is_empty());
    }

    #[test]
    fn keys_are_sorted_and_counted() {
        let index = build(&model());
        assert_eq!(index.key_count(), 4);
        assert_eq!(index.distinct_keys().first(), Some(&Value::from("Accord")));
        assert_eq!(index.count_for_key(&Value::from("Civic")), 2);
        assert_eq!(index.key_range().map(|(_, hi)| hi.clone()), Some(Value::from("Focus")));
        assert_eq!(index.estimate_cost(&Query::less_than(&model(), "Civic")).merge, 2);
    }
}
