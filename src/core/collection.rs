use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use chrono::Utc;
use roaring::RoaringBitmap;
use tracing::{debug, warn};
use crate::core::config::CollectionConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{CollectionStats, IndexStats};
use crate::core::store::ObjectStore;
use crate::core::types::ObjectId;
use crate::index::registry::IndexRegistry;
use crate::index::{Index, IndexTarget, KeyStatistics};
use crate::query::ast::Query;
use crate::query::options::QueryOptions;
use crate::query::validator::{QueryValidator, ValidationConfig};
use crate::search::executor::QueryEngine;
use crate::search::results::ResultSet;

/// One index change made during a batch, kept so the batch can be undone
enum Undo<O> {
    Added { index: usize, id: ObjectId, object: Arc<O> },
    Removed { index: usize, id: ObjectId, object: Arc<O> },
}

/// Set of objects with secondary indexes, queried through `retrieve`.
///
/// Unsynchronized: mutation needs `&mut self`, so no `ResultSet` can be alive while the
/// collection changes. Share it between threads through `ConcurrentIndexedCollection` or
/// `TransactionalIndexedCollection`.
///
/// Every mutating call is one batch: the store and every index change together, or
/// nothing changes and the error is returned.
pub struct IndexedCollection<O: 'static> {
    store: ObjectStore<O>,
    registry: IndexRegistry<O>,
    validator: QueryValidator,
    config: CollectionConfig,
    mutation_count: u64,
}

impl<O: Eq + Hash + 'static> IndexedCollection<O> {
    pub fn new() -> Self {
        let config = CollectionConfig::default();
        IndexedCollection {
            store: ObjectStore::new(),
            registry: IndexRegistry::new(),
            validator: QueryValidator::new(ValidationConfig::from(&config)),
            config,
            mutation_count: 0,
        }
    }

    pub fn with_config(config: CollectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(IndexedCollection {
            store: ObjectStore::new(),
            registry: IndexRegistry::new(),
            validator: QueryValidator::new(ValidationConfig::from(&config)),
            config,
            mutation_count: 0,
        })
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains(&self, object: &O) -> bool {
        self.store.contains(object)
    }

    pub fn iter(&self) -> impl Iterator<Item = &O> + '_ {
        self.store.iter().map(|(_, object)| object)
    }

    /// Batches applied so far that changed something
    pub fn mutation_count(&self) -> u64 {
        self.mutation_count
    }

    /// Add one object. Returns false if an equal object is already present.
    pub fn add(&mut self, object: O) -> Result<bool> {
        self.update(std::iter::empty::<&O>(), std::iter::once(object), &QueryOptions::default())
    }

    pub fn add_all<I: IntoIterator<Item = O>>(&mut self, objects: I) -> Result<bool> {
        self.update(std::iter::empty::<&O>(), objects, &QueryOptions::default())
    }

    /// Remove the stored object equal to `object`. Returns false if there is none.
    pub fn remove(&mut self, object: &O) -> Result<bool> {
        self.update(std::iter::once(object), std::iter::empty(), &QueryOptions::default())
    }

    pub fn remove_all<I>(&mut self, objects: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Borrow<O>,
    {
        self.update(objects, std::iter::empty(), &QueryOptions::default())
    }

    /// Remove `to_remove`, then add `to_add`, as a single batch.
    ///
    /// Indexes see removals first, with the stored instance of each removed object, so an
    /// object replaced by a modified copy loses its old keys before gaining new ones.
    /// Objects absent from the collection are ignored on removal; objects already
    /// present (and not being removed) or repeated in `to_add` are added once.
    pub fn update<R, A>(&mut self, to_remove: R, to_add: A, options: &QueryOptions<O>) -> Result<bool>
    where
        R: IntoIterator,
        R::Item: Borrow<O>,
        A: IntoIterator<Item = O>,
    {
        let mut removing = RoaringBitmap::new();
        let mut removals: Vec<(ObjectId, Arc<O>)> = Vec::new();
        for item in to_remove {
            let item: &O = item.borrow();
            if let Some(id) = self.store.id_of(item) {
                if removing.insert(id.0) {
                    if let Some(stored) = self.store.get_shared(id) {
                        removals.push((id, stored.clone()));
                    }
                }
            }
        }

        let mut batch: HashSet<Arc<O>> = HashSet::new();
        let mut additions: Vec<Arc<O>> = Vec::new();
        for object in to_add {
            let object = Arc::new(object);
            let already_present = self
                .store
                .id_of(&*object)
                .is_some_and(|id| !removing.contains(id.0));
            if already_present || !batch.insert(object.clone()) {
                continue;
            }
            additions.push(object);
        }

        if removals.is_empty() && additions.is_empty() {
            return Ok(false);
        }

        let ids = self.store.reserve_ids(additions.len())?;
        let additions: Vec<(ObjectId, Arc<O>)> = ids.into_iter().zip(additions).collect();

        Self::notify_indexes(&mut self.registry, &removals, &additions, options)?;

        for (id, _) in &removals {
            self.store.remove(*id);
        }
        for (id, object) in additions.iter() {
            self.store.insert(*id, object.clone());
        }
        self.mutation_count += 1;
        debug!(removed = removals.len(), added = additions.len(), size = self.store.len(), "committed batch");
        Ok(true)
    }

    /// Apply a batch to every index. On the first failure every change already made is
    /// undone in reverse order and the error is returned. If an undo step itself fails the
    /// indexes no longer match the store and the error is `Internal` instead.
    fn notify_indexes(
        registry: &mut IndexRegistry<O>,
        removals: &[(ObjectId, Arc<O>)],
        additions: &[(ObjectId, Arc<O>)],
        options: &QueryOptions<O>,
    ) -> Result<()> {
        let mut undo: Vec<Undo<O>> = Vec::new();
        let mut failure = None;

        'indexes: for (position, index) in registry.iter_mut().enumerate() {
            for (id, object) in removals {
                if let Err(err) = index.notify_removed(*id, object, options) {
                    failure = Some((index.name().to_string(), err));
                    break 'indexes;
                }
                undo.push(Undo::Removed { index: position, id: *id, object: object.clone() });
            }
            for (id, object) in additions {
                if let Err(err) = index.notify_added(*id, object, options) {
                    failure = Some((index.name().to_string(), err));
                    break 'indexes;
                }
                undo.push(Undo::Added { index: position, id: *id, object: object.clone() });
            }
        }

        let Some((name, err)) = failure else {
            return Ok(());
        };
        warn!(index = %name, error = %err, changes = undo.len(), "index rejected batch, rolling back");

        let mut indexes: Vec<&mut Box<dyn Index<O>>> = registry.iter_mut().collect();
        let mut unrestored = 0;
        for change in undo.into_iter().rev() {
            let (position, restored) = match change {
                Undo::Added { index, id, object } => (index, indexes[index].notify_removed(id, &object, options)),
                Undo::Removed { index, id, object } => (index, indexes[index].notify_added(id, &object, options)),
            };
            if let Err(undo_err) = restored {
                warn!(index = indexes[position].name(), error = %undo_err, "rollback step failed");
                unrestored += 1;
            }
        }
        if unrestored > 0 {
            return Err(Error::new(
                ErrorKind::Internal,
                format!("{} index changes could not be undone after '{}' rejected the batch: {}", unrestored, name, err),
            ));
        }
        Err(err)
    }

    /// Remove every object
    pub fn clear(&mut self) {
        if self.store.is_empty() {
            return;
        }
        for index in self.registry.iter_mut() {
            index.notify_cleared();
        }
        self.store.clear();
        self.mutation_count += 1;
        debug!("cleared collection");
    }

    /// Build `index` from the current contents, then make it visible to queries.
    /// A failed build leaves the collection without the index.
    pub fn add_index<I: Index<O> + 'static>(&mut self, index: I, options: &QueryOptions<O>) -> Result<()> {
        self.add_boxed_index(Box::new(index), options)
    }

    pub fn add_boxed_index(&mut self, mut index: Box<dyn Index<O>>, options: &QueryOptions<O>) -> Result<()> {
        if self.registry.contains(index.name()) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("an index named '{}' is already registered", index.name()),
            ));
        }
        for (id, object) in self.store.iter() {
            if let Err(err) = index.notify_added(id, object, options) {
                warn!(index = index.name(), error = %err, "index build failed");
                return Err(err);
            }
        }
        debug!(index = index.name(), objects = self.store.len(), "registered index");
        self.registry.register(index)?;
        self.mutation_count += 1;
        Ok(())
    }

    pub fn remove_index(&mut self, name: &str) -> Result<Box<dyn Index<O>>> {
        let removed = self.registry.remove(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("no index named '{}'", name))
        })?;
        self.mutation_count += 1;
        debug!(index = name, "removed index");
        Ok(removed)
    }

    pub fn index(&self, name: &str) -> Option<&dyn Index<O>> {
        self.registry.get(name)
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.registry.iter().map(|index| index.name()).collect()
    }

    pub fn key_statistics(&self, name: &str) -> Result<&dyn KeyStatistics> {
        let index = self.index(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("no index named '{}'", name))
        })?;
        index.key_statistics().ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument, format!("index '{}' keeps no key statistics", name))
        })
    }

    /// Objects matching `query`. Invalid queries fail here; evaluation is lazy.
    pub fn retrieve(&self, query: &Query<O>, options: &QueryOptions<O>) -> Result<ResultSet<'_, O>> {
        QueryEngine::new(&self.store, &self.registry, &self.validator).retrieve(query, options)
    }

    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            captured_at: Utc::now(),
            object_count: self.store.len(),
            mutation_count: self.mutation_count,
            indexes: self
                .registry
                .iter()
                .map(|index| IndexStats {
                    name: index.name().to_string(),
                    target: match index.target() {
                        IndexTarget::Attribute(attribute) => attribute.name().to_string(),
                        IndexTarget::Query(query) => query.to_string(),
                    },
                    indexed_objects: index.indexed_count(),
                    distinct_keys: index.key_statistics().map(|k| k.key_count()),
                })
                .collect(),
            version: None,
            active_readers: None,
            max_readers: None,
        }
    }
}

impl<O: Eq + Hash + 'static> Default for IndexedCollection<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: 'static> Clone for IndexedCollection<O> {
    fn clone(&self) -> Self {
        IndexedCollection {
            store: self.store.clone(),
            registry: self.registry.clone(),
            validator: self.validator.clone(),
            config: self.config.clone(),
            mutation_count: self.mutation_count,
        }
    }
}
