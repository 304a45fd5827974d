// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Lookup seams of the codec.
//!
//! A [`TypeResolver`] turns type names found on the wire into handles of a
//! [`TypePool`]; a [`RecordAccessor`] supplies the records that change-log
//! references point at.

use std::collections::HashMap;
use std::sync::RwLock;

use super::error::{CodecError, Result};
use crate::model::{Key, Record};
use crate::schema::{builtin_types, TypeId, TypePool};

/// Resolves type names against a pool.
pub trait TypeResolver {
    /// Look up a type by name.
    fn find_type(&self, pool: &TypePool, name: &str) -> Option<TypeId>;

    /// Look up a type by name, failing with [`CodecError::TypeNotFound`].
    fn get_type(&self, pool: &TypePool, name: &str) -> Result<TypeId> {
        self.find_type(pool, name)
            .ok_or_else(|| CodecError::type_not_found(name))
    }

    /// Try `self` first, then `next`.
    fn chain<R: TypeResolver>(self, next: R) -> Chain<Self, R>
    where
        Self: Sized,
    {
        Chain(self, next)
    }
}

impl<R: TypeResolver + ?Sized> TypeResolver for &R {
    fn find_type(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        (**self).find_type(pool, name)
    }
}

/// Every complete type of the pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolTypes;

impl TypeResolver for PoolTypes {
    fn find_type(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        pool.find(name)
    }
}

/// Only the builtin annotation types.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTypes;

impl TypeResolver for BuiltinTypes {
    fn find_type(&self, _pool: &TypePool, name: &str) -> Option<TypeId> {
        builtin_types::find(name)
    }
}

/// Resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTypes;

impl TypeResolver for NoTypes {
    fn find_type(&self, _pool: &TypePool, _name: &str) -> Option<TypeId> {
        None
    }
}

/// A fixed selection of types.
#[derive(Debug, Clone, Default)]
pub struct TypeSubset {
    types: Vec<TypeId>,
}

impl TypeSubset {
    pub fn new(types: impl IntoIterator<Item = TypeId>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }
}

impl TypeResolver for TypeSubset {
    fn find_type(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .copied()
            .find(|&id| pool.try_get(id).is_some_and(|t| t.name() == name))
    }
}

/// Adapter for resolver closures.
pub struct FnResolver<F>(pub F);

impl<F> TypeResolver for FnResolver<F>
where
    F: Fn(&TypePool, &str) -> Option<TypeId>,
{
    fn find_type(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        (self.0)(pool, name)
    }
}

/// Two resolvers consulted in order.
#[derive(Debug, Clone)]
pub struct Chain<A, B>(A, B);

impl<A: TypeResolver, B: TypeResolver> TypeResolver for Chain<A, B> {
    fn find_type(&self, pool: &TypePool, name: &str) -> Option<TypeId> {
        self.0
            .find_type(pool, name)
            .or_else(|| self.1.find_type(pool, name))
    }
}

// =============================================================================
// Record access
// =============================================================================

/// Supplies records by key.
pub trait RecordAccessor {
    fn get_record(&self, key: &Key) -> Option<Record>;
}

impl<F> RecordAccessor for F
where
    F: Fn(&Key) -> Option<Record>,
{
    fn get_record(&self, key: &Key) -> Option<Record> {
        self(key)
    }
}

/// Thread-safe record store keyed by identity.
///
/// Uses RwLock for concurrent read access with exclusive write access.
pub struct RecordRegistry {
    inner: RwLock<HashMap<Key, Record>>,
}

impl RecordRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Store a record under its key, replacing any previous one.
    pub fn register(&self, pool: &TypePool, record: Record) -> Result<()> {
        let key = record.key(pool)?;
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CodecError::format("record registry", format!("lock poisoned: {e}")))?;
        inner.insert(key, record);
        Ok(())
    }

    pub fn get(&self, key: &Key) -> Result<Option<Record>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CodecError::format("record registry", format!("lock poisoned: {e}")))?;
        Ok(inner.get(key).cloned())
    }

    pub fn contains(&self, key: &Key) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn remove(&self, key: &Key) -> Result<bool> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CodecError::format("record registry", format!("lock poisoned: {e}")))?;
        Ok(inner.remove(key).is_some())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CodecError::format("record registry", format!("lock poisoned: {e}")))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for RecordRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordAccessor for RecordRegistry {
    fn get_record(&self, key: &Key) -> Option<Record> {
        self.get(key).ok().flatten()
    }
}
