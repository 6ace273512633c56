use roaring::RoaringBitmap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::ObjectId;
use crate::index::{Cost, Index, IndexTarget};
use crate::query::ast::{OperatorKind, Query};
use crate::query::matcher::ObjectMatcher;
use crate::query::options::QueryOptions;
use crate::search::plan::PlanStep;
use crate::search::source::{BitmapSource, ResultSource};

pub const STANDING_RETRIEVAL_COST: u32 = 10;

/// Keeps the ids matching one fixed query of any shape. The engine uses it for any
/// subquery structurally equal to that query.
pub struct StandingQueryIndex<O> {
    name: String,
    query: Query<O>,
    matches: RoaringBitmap,
    indexed: RoaringBitmap,
}

impl<O: 'static> StandingQueryIndex<O> {
    pub fn on(query: Query<O>) -> Self {
        Self::named(format!("standing:{}", query), query)
    }

    pub fn named(name: impl Into<String>, query: Query<O>) -> Self {
        StandingQueryIndex {
            name: name.into(),
            query,
            matches: RoaringBitmap::new(),
            indexed: RoaringBitmap::new(),
        }
    }

    pub fn query(&self) -> &Query<O> {
        &self.query
    }
}

impl<O: 'static> Index<O> for StandingQueryIndex<O> {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> IndexTarget<'_, O> {
        IndexTarget::Query(&self.query)
    }

    /// Not selected per operator; matched against whole subqueries instead
    fn supports(&self, _kind: OperatorKind) -> bool {
        false
    }

    fn estimate_cost(&self, query: &Query<O>) -> Cost {
        let merge = if *query == self.query { self.matches.len() } else { u64::MAX };
        Cost::new(STANDING_RETRIEVAL_COST, merge)
    }

    fn retrieve<'a>(&'a self, query: &Query<O>, _options: &QueryOptions<O>) -> Result<Box<dyn ResultSource<O> + 'a>> {
        if *query != self.query {
            return Err(Error::new(
                ErrorKind::UnsupportedQuery,
                format!("standing index '{}' only answers {}", self.name, self.query),
            ));
        }
        let step = PlanStep::Index { index: self.name.clone(), query: query.to_string() };
        Ok(Box::new(BitmapSource::borrowed(&self.matches, STANDING_RETRIEVAL_COST, step)))
    }

    fn notify_added(&mut self, id: ObjectId, object: &O, _options: &QueryOptions<O>) -> Result<()> {
        if !self.indexed.insert(id.0) {
            return Err(Error::invalid_state(format!(
                "index '{}' already holds object {}", self.name, id.0
            )));
        }
        if ObjectMatcher::matches(object, &self.query) {
            self.matches.insert(id.0);
        }
        Ok(())
    }

    fn notify_removed(&mut self, id: ObjectId, _object: &O, _options: &QueryOptions<O>) -> Result<()> {
        if !self.indexed.remove(id.0) {
            return Err(Error::invalid_state(format!(
                "index '{}' was never notified of object {}", self.name, id.0
            )));
        }
        self.matches.remove(id.0);
        Ok(())
    }

    fn notify_cleared(&mut self) {
        self.matches.clear();
        self.indexed.clear();
    }

    fn indexed_count(&self) -> usize {
        self.indexed.len() as usize
    }

    fn clone_box(&self) -> Box<dyn Index<O>> {
        Box::new(StandingQueryIndex {
            name: self.name.clone(),
            query: self.query.clone(),
            matches: self.matches.clone(),
            indexed: self.indexed.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::attribute::Attribute;

    struct Car {
        model: &'static str,
        doors: i32,
    }

    #[test]
    fn tracks_matches_of_its_query_only() {
        let model = Attribute::simple("model", |c: &Car| c.model);
        let doors = Attribute::simple("doors", |c: &Car| c.doors);
        let standing = Query::equal(&model, "Civic") & Query::greater_than(&doors, 2);
        let mut index = StandingQueryIndex::on(standing.clone());
        let opts = QueryOptions::new();
        index.notify_added(ObjectId(0), &Car { model: "Civic", doors: 4 }, &opts).unwrap();
        index.notify_added(ObjectId(1), &Car { model: "Civic", doors: 2 }, &opts).unwrap();
        index.notify_added(ObjectId(2), &Car { model: "Focus", doors: 4 }, &opts).unwrap();

        let rebuilt = Query::equal(&model, "Civic") & Query::greater_than(&doors, 2);
        let source = index.retrieve(&rebuilt, &opts).unwrap();
        assert_eq!(source.ids().collect::<Vec<_>>(), vec![ObjectId(0)]);
        assert_eq!(index.estimate_cost(&rebuilt).merge, 1);

        let other = Query::equal(&model, "Focus");
        assert!(index.retrieve(&other, &opts).is_err());
        assert_eq!(index.estimate_cost(&other).merge, u64::MAX);
    }
}
