use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::core::error::{Error, Result};
use crate::core::types::{ObjectId, Value};
use crate::index::{supported_predicate, Cost, Index, IndexTarget, KeyStatistics};
use crate::query::ast::{Operator, OperatorKind, Query};
use crate::query::attribute::Attribute;
use crate::query::options::QueryOptions;
use crate::search::plan::PlanStep;
use crate::search::source::{BitmapSource, EmptySource, KeySetSource, ResultSource};

pub const HASH_RETRIEVAL_COST: u32 = 30;

/// Equality index: value → ids of objects yielding that value.
///
/// A multi-valued object is stored under each of its values.
pub struct HashIndex<O> {
    name: String,
    attribute: Attribute<O>,
    postings: HashMap<Value, RoaringBitmap>,
    indexed: RoaringBitmap,  // Every id notified, with or without values
    present: RoaringBitmap,  // Ids with at least one value
}

impl<O: 'static> HashIndex<O> {
    pub fn on(attribute: &Attribute<O>) -> Self {
        Self::named(format!("hash:{}", attribute.name()), attribute)
    }

    pub fn named(name: impl Into<String>, attribute: &Attribute<O>) -> Self {
        HashIndex {
            name: name.into(),
            attribute: attribute.clone(),
            postings: HashMap::new(),
            indexed: RoaringBitmap::new(),
            present: RoaringBitmap::new(),
        }
    }

    fn step(&self, query: &Query<O>) -> PlanStep {
        PlanStep::Index { index: self.name.clone(), query: query.to_string() }
    }
}

impl<O: 'static> Index<O> for HashIndex<O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> IndexTarget<'_, O> {
        IndexTarget::Attribute(&self.attribute)
    }

    fn supports(&self, kind: OperatorKind) -> bool {
        matches!(kind, OperatorKind::Equal | OperatorKind::In | OperatorKind::Has)
    }

    fn estimate_cost(&self, query: &Query<O>) -> Cost {
        let merge = match query.as_predicate().map(|p| &p.operator) {
            Some(Operator::Equal(v)) => self.postings.get(v).map_or(0, |b| b.len()),
            Some(Operator::In(values)) => values
                .iter()
                .filter_map(|v| self.postings.get(v))
                .map(|b| b.len())
                .sum(),
            Some(Operator::Has) => self.present.len(),
            _ => u64::MAX,
        };
        Cost::new(HASH_RETRIEVAL_COST, merge)
    }

    fn retrieve<'a>(&'a self, query: &Query<O>, _options: &QueryOptions<O>) -> Result<Box<dyn ResultSource<O> + 'a>> {
        let predicate = supported_predicate(self, &self.attribute, query)?;
        let step = self.step(query);
        Ok(match &predicate.operator {
            Operator::Equal(v) => match self.postings.get(v) {
                Some(bitmap) => Box::new(BitmapSource::borrowed(bitmap, HASH_RETRIEVAL_COST, step)),
                None => Box::new(EmptySource),
            },
            Operator::In(values) => {
                let mut keys: Vec<&Value> = values.iter().collect();
                keys.sort();
                keys.dedup();
                let bitmaps: Vec<&RoaringBitmap> = keys.into_iter().filter_map(|v| self.postings.get(v)).collect();
                if bitmaps.is_empty() {
                    Box::new(EmptySource)
                } else {
                    Box::new(KeySetSource::new(bitmaps, predicate.clone(), HASH_RETRIEVAL_COST, step))
                }
            }
            Operator::Has => Box::new(BitmapSource::borrowed(&self.present, HASH_RETRIEVAL_COST, step)),
            _ => return Err(Error::invalid_state("hash index accepted an unsupported operator")),
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
        Box::new(HashIndex {
            name: self.name.clone(),
            attribute: self.attribute.clone(),
            postings: self.postings.clone(),
            indexed: self.indexed.clone(),
            present: self.present.clone(),
        })
    }
}

impl<O> KeyStatistics for HashIndex<O> {
    fn distinct_keys(&self) -> Vec<Value> {
        let mut keys: Vec<Value> = self.postings.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn count_for_key(&self, key: &Value) -> usize {
        self.postings.get(key).map_or(0, |b| b.len() as usize)
    }

    fn key_count(&self) -> usize {
        self.postings.len()
    }
}
