use std::hash::Hash;
use tracing::trace;
use crate::core::error::Result;
use crate::core::store::ObjectStore;
use crate::index::registry::IndexRegistry;
use crate::query::ast::Query;
use crate::query::options::{Deduplication, QueryOptions};
use crate::query::validator::QueryValidator;
use crate::search::merge::{BoxedSource, Difference, Intersection, Union};
use crate::search::results::ResultSet;
use crate::search::source::{AllSource, EmptySource, ScanSource};

/// Resolves query trees into lazy sources over one collection state.
///
/// Stateless apart from the borrowed state; never mutates it.
pub struct QueryEngine<'a, O: 'static> {
    store: &'a ObjectStore<O>,
    registry: &'a IndexRegistry<O>,
    validator: &'a QueryValidator,
}

impl<'a, O: Eq + Hash + 'static> QueryEngine<'a, O> {
    pub fn new(store: &'a ObjectStore<O>, registry: &'a IndexRegistry<O>, validator: &'a QueryValidator) -> Self {
        QueryEngine { store, registry, validator }
    }

    /// Validate, then plan `query`. Nothing is iterated until the result set is.
    pub fn retrieve(&self, query: &Query<O>, options: &QueryOptions<O>) -> Result<ResultSet<'a, O>> {
        self.validator.validate(query)?;
        let root = self.resolve(query, options, true)?;
        trace!(query = %query, merge_cost = root.merge_cost(), "planned query");
        Ok(ResultSet::new(root, self.store, options))
    }

    /// Only the root Or may repeat an object, once per matching direct child, and only
    /// under `Deduplication::None`. Every nested Or is a set, so the count never depends
    /// on which child drives an intersection or whether a standing index answers a subtree.
    fn resolve(&self, query: &Query<O>, options: &QueryOptions<O>, root: bool) -> Result<BoxedSource<'a, O>> {
        let repeats = root && options.deduplication == Deduplication::None && matches!(query, Query::Or(_));
        if !repeats {
            if let Some(index) = self.registry.standing_for(query, options) {
                trace!(index = index.name(), "standing query index");
                return index.retrieve(query, options);
            }
        }

        match query {
            Query::All => Ok(Box::new(AllSource::new(self.store))),
            Query::None => Ok(Box::new(EmptySource)),
            Query::Predicate(predicate) => match self.registry.select(predicate, query, options) {
                Some(index) => index.retrieve(query, options),
                None => Ok(Box::new(ScanSource::new(self.store, query.clone()))),
            },
            Query::Not(child) => {
                let excluded = self.resolve(child, options, false)?;
                Ok(Box::new(Difference::new(self.store, Box::new(AllSource::new(self.store)), excluded)))
            }
            Query::And(children) => self.resolve_and(children, options),
            Query::Or(children) => {
                if children.len() == 1 {
                    return self.resolve(&children[0], options, false);
                }
                let sources = children
                    .iter()
                    .map(|child| self.resolve(child, options, false))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(Union::new(sources, !repeats)))
            }
        }
    }

    /// Negated children filter the positive siblings instead of being complemented
    /// against the whole collection.
    fn resolve_and(&self, children: &[Query<O>], options: &QueryOptions<O>) -> Result<BoxedSource<'a, O>> {
        let mut positives = Vec::new();
        let mut negatives = Vec::new();
        for child in children {
            match child {
                Query::Not(inner) if self.registry.standing_for(child, options).is_none() => {
                    negatives.push(self.resolve(inner, options, false)?);
                }
                _ => positives.push(self.resolve(child, options, false)?),
            }
        }

        if positives.is_empty() {
            let excluded: BoxedSource<'a, O> = if negatives.len() == 1 {
                negatives.remove(0)
            } else {
                Box::new(Union::new(negatives, false))
            };
            return Ok(Box::new(Difference::new(self.store, Box::new(AllSource::new(self.store)), excluded)));
        }
        if positives.len() == 1 && negatives.is_empty() {
            return Ok(positives.remove(0));
        }
        Ok(Box::new(Intersection::new(self.store, positives, negatives)))
    }
}
