use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use crate::core::types::{AttributeValue, Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Simple,      // Exactly one value
    Nullable,    // Zero or one value
    MultiValued, // Zero or more values
}

type Extractor<O> = dyn Fn(&O) -> Vec<Value> + Send + Sync;

struct AttributeInner<O> {
    name: String,
    value_type: ValueType,
    kind: AttributeKind,
    extract: Box<Extractor<O>>,
}

/// Named, pure extraction function from an object to its value(s).
///
/// Cheap to clone; every clone shares the same closure. Two attributes are equal when
/// name and declared type agree, which is what indexes and queries key on. Closures cannot
/// be compared, so callers must give every distinct extraction its own name: two
/// attributes that share name and type share indexes even if they extract differently.
pub struct Attribute<O> {
    inner: Arc<AttributeInner<O>>,
}

impl<O: 'static> Attribute<O> {
    pub fn simple<V, F>(name: impl Into<String>, extract: F) -> Self
    where
        V: AttributeValue,
        F: Fn(&O) -> V + Send + Sync + 'static,
    {
        Self::build(name.into(), V::TYPE, AttributeKind::Simple, Box::new(move |o: &O| -> Vec<Value> { vec![extract(o).into()] }))
    }

    pub fn nullable<V, F>(name: impl Into<String>, extract: F) -> Self
    where
        V: AttributeValue,
        F: Fn(&O) -> Option<V> + Send + Sync + 'static,
    {
        Self::build(
            name.into(),
            V::TYPE,
            AttributeKind::Nullable,
            Box::new(move |o: &O| -> Vec<Value> { extract(o).into_iter().map(Into::into).collect() }),
        )
    }

    pub fn multi<V, I, F>(name: impl Into<String>, extract: F) -> Self
    where
        V: AttributeValue,
        I: IntoIterator<Item = V>,
        F: Fn(&O) -> I + Send + Sync + 'static,
    {
        Self::build(
            name.into(),
            V::TYPE,
            AttributeKind::MultiValued,
            Box::new(move |o: &O| -> Vec<Value> { extract(o).into_iter().map(Into::into).collect() }),
        )
    }

    fn build(name: String, value_type: ValueType, kind: AttributeKind, extract: Box<Extractor<O>>) -> Self {
        Attribute {
            inner: Arc::new(AttributeInner { name, value_type, kind, extract }),
        }
    }
}

impl<O> Attribute<O> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn value_type(&self) -> ValueType {
        self.inner.value_type
    }

    pub fn kind(&self) -> AttributeKind {
        self.inner.kind
    }

    pub fn is_multi_valued(&self) -> bool {
        self.inner.kind == AttributeKind::MultiValued
    }

    /// Values the object currently yields. Empty for a missing nullable value.
    pub fn values(&self, object: &O) -> Vec<Value> {
        (self.inner.extract)(object)
    }
}

impl<O> Clone for Attribute<O> {
    fn clone(&self) -> Self {
        Attribute { inner: self.inner.clone() }
    }
}

impl<O> PartialEq for Attribute<O> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.name == other.inner.name && self.inner.value_type == other.inner.value_type)
    }
}

impl<O> Eq for Attribute<O> {}

impl<O> Hash for Attribute<O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
        self.inner.value_type.hash(state);
    }
}

impl<O> fmt::Debug for Attribute<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.inner.name)
            .field("value_type", &self.inner.value_type)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl<O> fmt::Display for Attribute<O> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}
