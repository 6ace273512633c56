use std::collections::HashMap;
use tracing::trace;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::{Index, IndexTarget};
use crate::query::ast::{Predicate, Query};
use crate::query::attribute::Attribute;
use crate::query::options::{IndexHint, QueryOptions};

/// Indexes of one collection, in registration order, with an attribute → index lookup
pub struct IndexRegistry<O: 'static> {
    indexes: Vec<Box<dyn Index<O>>>,
    by_attribute: HashMap<Attribute<O>, Vec<usize>>,
    standing: Vec<usize>,
}

impl<O: 'static> IndexRegistry<O> {
    pub fn new() -> Self {
        IndexRegistry {
            indexes: Vec::new(),
            by_attribute: HashMap::new(),
            standing: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indexes.iter().any(|index| index.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Index<O>> {
        self.indexes.iter().find(|index| index.name() == name).map(|index| index.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Index<O>> + '_ {
        self.indexes.iter().map(|index| index.as_ref())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Index<O>>> + '_ {
        self.indexes.iter_mut()
    }

    /// Make a fully built index visible to queries
    pub(crate) fn register(&mut self, index: Box<dyn Index<O>>) -> Result<()> {
        if self.contains(index.name()) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("an index named '{}' is already registered", index.name()),
            ));
        }
        self.indexes.push(index);
        self.rebuild_lookup();
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Box<dyn Index<O>>> {
        let position = self.indexes.iter().position(|index| index.name() == name)?;
        let removed = self.indexes.remove(position);
        self.rebuild_lookup();
        Some(removed)
    }

    fn rebuild_lookup(&mut self) {
        self.by_attribute.clear();
        self.standing.clear();
        for (position, index) in self.indexes.iter().enumerate() {
            match index.target() {
                IndexTarget::Attribute(attribute) => {
                    self.by_attribute.entry(attribute.clone()).or_default().push(position);
                }
                IndexTarget::Query(_) => self.standing.push(position),
            }
        }
    }

    /// Standing-query index registered for exactly this query
    pub fn standing_for(&self, query: &Query<O>, options: &QueryOptions<O>) -> Option<&dyn Index<O>> {
        self.standing
            .iter()
            .map(|&position| self.indexes[position].as_ref())
            .filter(|index| options.allows_index(index.name()))
            .find(|index| matches!(index.target(), IndexTarget::Query(q) if q == query))
    }

    /// Cheapest index able to answer `predicate`, honoring index hints. Ties go to the
    /// index registered first. Indexes are found by attribute name and declared type, so
    /// an index answers for any attribute with the same name and type as the one it was
    /// built on.
    pub fn select(&self, predicate: &Predicate<O>, query: &Query<O>, options: &QueryOptions<O>) -> Option<&dyn Index<O>> {
        let kind = predicate.operator.kind();
        let candidates: Vec<&dyn Index<O>> = self
            .by_attribute
            .get(&predicate.attribute)
            .into_iter()
            .flatten()
            .map(|&position| self.indexes[position].as_ref())
            .filter(|index| index.supports(kind) && options.allows_index(index.name()))
            .collect();

        let preferred: Vec<&dyn Index<O>> = match &options.index_hint {
            Some(IndexHint::Prefer(names)) => candidates
                .iter()
                .copied()
                .filter(|index| names.iter().any(|n| n == index.name()))
                .collect(),
            _ => Vec::new(),
        };
        let pool = if preferred.is_empty() { candidates } else { preferred };

        let chosen = pool.into_iter().min_by_key(|index| index.estimate_cost(query).retrieval);
        match chosen {
            Some(index) => trace!(index = index.name(), query = %query, "selected index"),
            None => trace!(query = %query, "no index supports query, scanning"),
        }
        chosen
    }
}

impl<O: 'static> Default for IndexRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: 'static> Clone for IndexRegistry<O> {
    fn clone(&self) -> Self {
        IndexRegistry {
            indexes: self.indexes.iter().map(|index| index.clone_box()).collect(),
            by_attribute: self.by_attribute.clone(),
            standing: self.standing.clone(),
        }
    }
}
