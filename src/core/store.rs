use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use roaring::RoaringBitmap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::ObjectId;

/// Canonical object storage. Each distinct object (by `Eq`/`Hash`) holds one slot; the
/// slot index is its `ObjectId`. Freed ids are recycled lowest first.
pub struct ObjectStore<O> {
    slots: Vec<Option<Arc<O>>>,
    ids: HashMap<Arc<O>, ObjectId>,
    live: RoaringBitmap,
    free: RoaringBitmap,
}

impl<O: Eq + Hash> ObjectStore<O> {
    pub fn new() -> Self {
        ObjectStore {
            slots: Vec::new(),
            ids: HashMap::new(),
            live: RoaringBitmap::new(),
            free: RoaringBitmap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_of<Q>(&self, object: &Q) -> Option<ObjectId>
    where
        Arc<O>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ids.get(object).copied()
    }

    pub fn contains<Q>(&self, object: &Q) -> bool
    where
        Arc<O>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ids.contains_key(object)
    }

    pub fn contains_id(&self, id: ObjectId) -> bool {
        self.live.contains(id.0)
    }

    pub fn get(&self, id: ObjectId) -> Option<&O> {
        self.slots.get(id.0 as usize).and_then(|slot| slot.as_deref())
    }

    pub(crate) fn get_shared(&self, id: ObjectId) -> Option<&Arc<O>> {
        self.slots.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.live.iter().map(ObjectId)
    }

    pub fn live_ids(&self) -> &RoaringBitmap {
        &self.live
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &O)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_deref().map(|o| (ObjectId(i as u32), o)))
    }

    /// Hand out `count` ids that are neither live nor already reserved. Nothing is stored
    /// until `insert` is called with each of them.
    pub(crate) fn reserve_ids(&self, count: usize) -> Result<Vec<ObjectId>> {
        let mut reserved = Vec::with_capacity(count);
        let mut recycled = self.free.iter();
        let mut next = self.slots.len() as u64;
        while reserved.len() < count {
            if let Some(id) = recycled.next() {
                reserved.push(ObjectId(id));
                continue;
            }
            if next > u32::MAX as u64 {
                return Err(Error::new(
                    ErrorKind::ResourceExhausted,
                    "object id space exhausted".to_string(),
                ));
            }
            reserved.push(ObjectId(next as u32));
            next += 1;
        }
        Ok(reserved)
    }

    /// Store `object` under an id previously returned by `reserve_ids`.
    pub(crate) fn insert(&mut self, id: ObjectId, object: Arc<O>) {
        let slot = id.0 as usize;
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, None);
        } else {
            self.free.remove(id.0);
        }
        self.slots[slot] = Some(object.clone());
        self.ids.insert(object, id);
        self.live.insert(id.0);
    }

    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<Arc<O>> {
        let object = self.slots.get_mut(id.0 as usize)?.take()?;
        self.ids.remove(&object);
        self.live.remove(id.0);
        self.free.insert(id.0);
        Some(object)
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.ids.clear();
        self.live.clear();
        self.free.clear();
    }
}

impl<O: Eq + Hash> Default for ObjectStore<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Clone for ObjectStore<O> {
    fn clone(&self) -> Self {
        ObjectStore {
            slots: self.slots.clone(),
            ids: self.ids.clone(),
            live: self.live.clone(),
            free: self.free.clone(),
        }
    }
}
