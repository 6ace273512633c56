use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;
use crate::core::collection::IndexedCollection;
use crate::core::config::CollectionConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::CollectionStats;
use crate::index::Index;
use crate::mvcc::controller::{IsolationLevel, MvccController, Snapshot, TxId};
use crate::query::ast::Query;
use crate::query::options::QueryOptions;
use crate::search::results::ResultSet;

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Preparing,
    Committed,
    Aborted,
}

/// Collection with snapshot reads.
///
/// Readers never block: `snapshot()` returns the latest committed version, which stays
/// valid and unchanged for as long as it is held. Every mutation is published as a new
/// version.
pub struct TransactionalIndexedCollection<O: 'static> {
    mvcc: MvccController<O>,
}

impl<O: Eq + Hash + 'static> TransactionalIndexedCollection<O> {
    pub fn new() -> Self {
        Self::from_collection(IndexedCollection::new())
    }

    pub fn with_config(config: CollectionConfig) -> Result<Self> {
        Ok(Self::from_collection(IndexedCollection::with_config(config)?))
    }

    pub fn from_collection(collection: IndexedCollection<O>) -> Self {
        TransactionalIndexedCollection { mvcc: MvccController::new(collection) }
    }

    pub fn snapshot(&self) -> Arc<Snapshot<O>> {
        self.mvcc.current_snapshot()
    }

    pub fn version(&self) -> u64 {
        self.mvcc.current_version()
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Transaction<'_, O> {
        Transaction {
            id: self.mvcc.next_tx_id(),
            isolation_level,
            state: TransactionState::Active,
            snapshot: self.mvcc.current_snapshot(),
            to_add: Vec::new(),
            to_remove: Vec::new(),
            mvcc: &self.mvcc,
        }
    }

    pub fn add(&self, object: O) -> Result<bool> {
        self.mvcc.write(|c| c.add(object))
    }

    pub fn add_all<I: IntoIterator<Item = O>>(&self, objects: I) -> Result<bool> {
        self.mvcc.write(|c| c.add_all(objects))
    }

    pub fn remove(&self, object: &O) -> Result<bool> {
        self.mvcc.write(|c| c.remove(object))
    }

    pub fn remove_all<I>(&self, objects: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Borrow<O>,
    {
        self.mvcc.write(|c| c.remove_all(objects))
    }

    pub fn update<R, A>(&self, to_remove: R, to_add: A, options: &QueryOptions<O>) -> Result<bool>
    where
        R: IntoIterator,
        R::Item: Borrow<O>,
        A: IntoIterator<Item = O>,
    {
        self.mvcc.write(|c| c.update(to_remove, to_add, options))
    }

    pub fn clear(&self) -> Result<()> {
        self.mvcc.write(|c| {
            c.clear();
            Ok(())
        })
    }

    pub fn add_index<I: Index<O> + 'static>(&self, index: I, options: &QueryOptions<O>) -> Result<()> {
        self.mvcc.write(|c| c.add_index(index, options))
    }

    pub fn remove_index(&self, name: &str) -> Result<()> {
        self.mvcc.write(|c| c.remove_index(name).map(|_| ()))
    }

    pub fn stats(&self) -> CollectionStats {
        let snapshot = self.snapshot();
        let mut stats = snapshot.stats();
        stats.version = Some(snapshot.version);
        stats
    }
}

impl<O: Eq + Hash + 'static> Default for TransactionalIndexedCollection<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffered changes applied as one batch on commit.
///
/// Reads go to a snapshot: the latest commit under `ReadCommitted`, the snapshot taken at
/// begin otherwise. Buffered changes are not visible to the transaction's own reads.
/// Dropping an active transaction discards its changes.
pub struct Transaction<'c, O: 'static> {
    pub id: TxId,
    pub isolation_level: IsolationLevel,
    state: TransactionState,
    snapshot: Arc<Snapshot<O>>,
    to_add: Vec<O>,
    to_remove: Vec<O>,
    mvcc: &'c MvccController<O>,
}

impl<O: Eq + Hash + 'static> Transaction<'_, O> {
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Version this transaction currently reads
    pub fn read_version(&self) -> u64 {
        self.snapshot.version
    }

    pub fn add(&mut self, object: O) -> Result<()> {
        self.check_active()?;
        self.to_add.push(object);
        Ok(())
    }

    pub fn remove(&mut self, object: O) -> Result<()> {
        self.check_active()?;
        self.to_remove.push(object);
        Ok(())
    }

    pub fn retrieve(&mut self, query: &Query<O>, options: &QueryOptions<O>) -> Result<ResultSet<'_, O>> {
        self.check_active()?;
        if self.isolation_level == IsolationLevel::ReadCommitted {
            self.snapshot = self.mvcc.current_snapshot();
        }
        self.snapshot.retrieve(query, options)
    }

    /// Apply the buffered changes as one batch. Under `Serializable` the commit fails with
    /// `Conflict` if anything was committed since the transaction began; the transaction is
    /// aborted either way on failure.
    pub fn commit(mut self) -> Result<bool> {
        self.check_active()?;
        self.state = TransactionState::Preparing;

        let to_remove = std::mem::take(&mut self.to_remove);
        let to_add = std::mem::take(&mut self.to_add);
        let apply = |c: &mut IndexedCollection<O>| c.update(to_remove, to_add, &QueryOptions::default());
        let outcome = match self.isolation_level {
            IsolationLevel::Serializable => self.mvcc.write_if_version(self.snapshot.version, apply),
            IsolationLevel::ReadCommitted | IsolationLevel::RepeatableRead => self.mvcc.write(apply),
        };

        match outcome {
            Ok(changed) => {
                self.state = TransactionState::Committed;
                debug!(tx = self.id.0, changed, "transaction committed");
                Ok(changed)
            }
            Err(err) => {
                self.state = TransactionState::Aborted;
                debug!(tx = self.id.0, error = %err, "transaction aborted");
                Err(err)
            }
        }
    }

    pub fn rollback(mut self) {
        self.state = TransactionState::Aborted;
        self.to_add.clear();
        self.to_remove.clear();
        debug!(tx = self.id.0, "transaction rolled back");
    }

    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::new(ErrorKind::InvalidState, "Transaction is not active".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::hash::HashIndex;
    use crate::query::attribute::Attribute;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Car {
        id: u32,
        model: &'static str,
    }

    fn model() -> Attribute<Car> {
        Attribute::simple("model", |c: &Car| c.model)
    }

    fn collection() -> TransactionalIndexedCollection<Car> {
        let collection = TransactionalIndexedCollection::new();
        collection.add_index(HashIndex::on(&model()), &QueryOptions::new()).unwrap();
        collection.add(Car { id: 0, model: "Civic" }).unwrap();
        collection
    }

    fn civics(tx: &mut Transaction<'_, Car>) -> usize {
        tx.retrieve(&Query::equal(&model(), "Civic"), &QueryOptions::new()).unwrap().size()
    }

    #[test]
    fn snapshot_readers_keep_their_version() {
        let collection = collection();
        let old = collection.snapshot();
        collection.add(Car { id: 1, model: "Civic" }).unwrap();
        assert_eq!(old.retrieve(&Query::equal(&model(), "Civic"), &QueryOptions::new()).unwrap().size(), 1);
        assert_eq!(collection.snapshot().len(), 2);
        assert_eq!(collection.stats().version, Some(3));
    }

    #[test]
    fn isolation_levels_choose_the_read_snapshot() {
        let collection = collection();
        let mut committed = collection.begin(IsolationLevel::ReadCommitted);
        let mut repeatable = collection.begin(IsolationLevel::RepeatableRead);
        collection.add(Car { id: 1, model: "Civic" }).unwrap();

        assert_eq!(civics(&mut committed), 2);
        assert_eq!(civics(&mut repeatable), 1);
    }

    #[test]
    fn commit_applies_buffered_changes_as_one_version() {
        let collection = collection();
        let before = collection.version();
        let mut tx = collection.begin(IsolationLevel::RepeatableRead);
        tx.remove(Car { id: 0, model: "Civic" }).unwrap();
        tx.add(Car { id: 0, model: "Focus" }).unwrap();
        assert_eq!(civics(&mut tx), 1);
        assert!(tx.commit().unwrap());
        assert_eq!(collection.version(), before + 1);
        assert!(collection.snapshot().contains(&Car { id: 0, model: "Focus" }));
    }

    #[test]
    fn serializable_commit_conflicts_after_concurrent_commit() {
        let collection = collection();
        let mut tx = collection.begin(IsolationLevel::Serializable);
        tx.add(Car { id: 2, model: "Prius" }).unwrap();
        collection.add(Car { id: 1, model: "Civic" }).unwrap();

        let err = tx.commit().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(err.is_retryable());
        assert!(!collection.snapshot().contains(&Car { id: 2, model: "Prius" }));

        let tx = collection.begin(IsolationLevel::Serializable);
        tx.rollback();
        assert_eq!(collection.snapshot().len(), 2);
    }
}
