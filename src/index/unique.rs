use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::core::error::{Error, Result};
use crate::core::types::{ObjectId, Value};
use crate::index::{supported_predicate, Cost, Index, IndexTarget, KeyStatistics};
use crate::query::ast::{Operator, OperatorKind, Query};
use crate::query::attribute::Attribute;
use crate::query::options::QueryOptions;
use crate::search::plan::PlanStep;
use crate::search::source::{BitmapSource, EmptySource, ResultSource};

pub const UNIQUE_RETRIEVAL_COST: u32 = 25;

/// Equality index for attributes whose values identify at most one object.
///
/// Adding a second object under a key that is already taken fails with `InvalidState`,
/// which makes the collection roll back the batch that caused it.
pub struct UniqueIndex<O> {
    name: String,
    attribute: Attribute<O>,
    keys: HashMap<Value, ObjectId>,
    indexed: RoaringBitmap,
    present: RoaringBitmap,
}

impl<O: 'static> UniqueIndex<O> {
    pub fn on(attribute: &Attribute<O>) -> Self {
        Self::named(format!("unique:{}", attribute.name()), attribute)
    }

    pub fn named(name: impl Into<String>, attribute: &Attribute<O>) -> Self {
        UniqueIndex {
            name: name.into(),
            attribute: attribute.clone(),
            keys: HashMap::new(),
            indexed: RoaringBitmap::new(),
            present: RoaringBitmap::new(),
        }
    }

    fn lookup<'v>(&self, values: impl IntoIterator<Item = &'v Value>) -> RoaringBitmap {
        values.into_iter().filter_map(|v| self.keys.get(v)).map(|id| id.0).collect()
    }
}

impl<O: 'static> Index<O> for UniqueIndex<O> {
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
            Some(Operator::Equal(v)) => self.keys.contains_key(v) as u64,
            Some(Operator::In(values)) => self.lookup(values).len(),
            Some(Operator::Has) => self.present.len(),
            _ => u64::MAX,
        };
        Cost::new(UNIQUE_RETRIEVAL_COST, merge)
    }

    fn retrieve<'a>(&'a self, query: &Query<O>, _options: &QueryOptions<O>) -> Result<Box<dyn ResultSource<O> + 'a>> {
        let predicate = supported_predicate(self, &self.attribute, query)?;
        let step = PlanStep::Index { index: self.name.clone(), query: query.to_string() };
        let matched = match &predicate.operator {
            Operator::Equal(v) => self.lookup([v]),
            Operator::In(values) => self.lookup(values),
            Operator::Has => {
                return Ok(Box::new(BitmapSource::borrowed(&self.present, UNIQUE_RETRIEVAL_COST, step)));
            }
            _ => return Err(Error::invalid_state("unique index accepted an unsupported operator")),
        };
        if matched.is_empty() {
            return Ok(Box::new(EmptySource));
        }
        Ok(Box::new(BitmapSource::owned(matched, UNIQUE_RETRIEVAL_COST, step)))
    }

    fn notify_added(&mut self, id: ObjectId, object: &O, _options: &QueryOptions<O>) -> Result<()> {
        if self.indexed.contains(id.0) {
            return Err(Error::invalid_state(format!(
                "index '{}' already holds object {}", self.name, id.0
            )));
        }
        let values = self.attribute.values(object);
        // Check every key before touching any, so a failed call leaves the index unchanged
        for value in &values {
            if let Some(existing) = self.keys.get(value) {
                if *existing != id {
                    return Err(Error::invalid_state(format!(
                        "unique index '{}' already maps {} to object {}", self.name, value, existing.0
                    )));
                }
            }
        }
        if !values.is_empty() {
            self.present.insert(id.0);
        }
        for value in values {
            self.keys.insert(value, id);
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
            if self.keys.get(&value) == Some(&id) {
                self.keys.remove(&value);
            }
        }
        self.present.remove(id.0);
        self.indexed.remove(id.0);
        Ok(())
    }

    fn notify_cleared(&mut self) {
        self.keys.clear();
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
        Box::new(UniqueIndex {
            name: self.name.clone(),
            attribute: self.attribute.clone(),
            keys: self.keys.clone(),
            indexed: self.indexed.clone(),
            present: self.present.clone(),
        })
    }
}

impl<O> KeyStatistics for UniqueIndex<O> {
    fn distinct_keys(&self) -> Vec<Value> {
        let mut keys: Vec<Value> = self.keys.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn count_for_key(&self, key: &Value) -> usize {
        self.keys.contains_key(key) as usize
    }

    fn key_count(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    struct Account {
        email: &'static str,
    }

    fn email() -> Attribute<Account> {
        Attribute::simple("email", |a: &Account| a.email)
    }

    #[test]
    fn second_object_under_a_key_is_rejected() {
        let mut index = UniqueIndex::on(&email());
        let opts = QueryOptions::new();
        index.notify_added(ObjectId(0), &Account { email: "a@x" }, &opts).unwrap();
        let err = index.notify_added(ObjectId(1), &Account { email: "a@x" }, &opts).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
        assert_eq!(index.indexed_count(), 1);
        assert_eq!(index.count_for_key(&Value::from("a@x")), 1);
    }

    #[test]
    fn equal_returns_the_single_owner() {
        let mut index = UniqueIndex::on(&email());
        let opts = QueryOptions::new();
        index.notify_added(ObjectId(3), &Account { email: "a@x" }, &opts).unwrap();
        index.notify_added(ObjectId(4), &Account { email: "b@x" }, &opts).unwrap();
        let source = index.retrieve(&Query::equal(&email(), "b@x"), &opts).unwrap();
        assert_eq!(source.ids().collect::<Vec<_>>(), vec![ObjectId(4)]);
        let missing = index.retrieve(&Query::equal(&email(), "c@x"), &opts).unwrap();
        assert_eq!(missing.count(), 0);
    }

    #[test]
    fn freed_keys_can_be_reused() {
        let mut index = UniqueIndex::on(&email());
        let opts = QueryOptions::new();
        let a = Account { email: "a@x" };
        index.notify_added(ObjectId(0), &a, &opts).unwrap();
        index.notify_removed(ObjectId(0), &a, &opts).unwrap();
        index.notify_added(ObjectId(1), &Account { email: "a@x" }, &opts).unwrap();
        assert_eq!(index.estimate_cost(&Query::equal(&email(), "a@x")).merge, 1);
    }
}
