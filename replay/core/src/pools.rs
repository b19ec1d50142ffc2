use crate::data::{Data, MemoryError};
use crate::pool::{Pool, PoolId};

use std::collections::BTreeMap;
use std::fmt;

/// The pool every application-visible address lives in.
pub const APPLICATION_POOL: PoolId = PoolId(0);

type OnCreate = Box<dyn FnMut(PoolId, &Pool) + Send>;

/// Every pool of a replay session, keyed by id.
pub struct Pools {
    pools: BTreeMap<PoolId, Pool>,
    next_id: u32,
    on_create: Option<OnCreate>,
}

impl Pools {
    pub fn new() -> Self {
        let mut pools = BTreeMap::new();
        pools.insert(APPLICATION_POOL, Pool::new());
        Self {
            pools,
            next_id: APPLICATION_POOL.0 + 1,
            on_create: None,
        }
    }

    /// Creates a new pool with the next free id.
    pub fn new_pool(&mut self) -> (PoolId, &mut Pool) {
        let mut id = PoolId(self.next_id);
        while self.pools.contains_key(&id) {
            id = PoolId(id.0 + 1);
        }
        self.create(id)
    }

    /// Creates a pool with a caller-chosen id.
    ///
    /// # Panics
    ///
    /// Panics if a pool with `id` already exists.
    pub fn new_at(&mut self, id: PoolId) -> &mut Pool {
        if self.pools.contains_key(&id) {
            panic!("pool {id} already exists");
        }
        self.create(id).1
    }

    fn create(&mut self, id: PoolId) -> (PoolId, &mut Pool) {
        tracing::debug!(%id, "creating pool");
        self.next_id = self.next_id.max(id.0 + 1);
        let pool = self.pools.entry(id).or_default();
        if let Some(cb) = self.on_create.as_mut() {
            cb(id, &*pool);
        }
        (id, pool)
    }

    pub fn get(&self, id: PoolId) -> Result<&Pool, MemoryError> {
        self.pools.get(&id).ok_or(MemoryError::PoolNotFound(id))
    }

    pub fn get_mut(&mut self, id: PoolId) -> Result<&mut Pool, MemoryError> {
        self.pools.get_mut(&id).ok_or(MemoryError::PoolNotFound(id))
    }

    /// # Panics
    ///
    /// Panics if the pool does not exist.
    pub fn must_get(&self, id: PoolId) -> &Pool {
        match self.pools.get(&id) {
            Some(pool) => pool,
            None => panic!("pool {id} does not exist"),
        }
    }

    /// # Panics
    ///
    /// Panics if the pool does not exist.
    pub fn must_get_mut(&mut self, id: PoolId) -> &mut Pool {
        match self.pools.get_mut(&id) {
            Some(pool) => pool,
            None => panic!("pool {id} does not exist"),
        }
    }

    pub fn application(&self) -> &Pool {
        self.must_get(APPLICATION_POOL)
    }

    pub fn application_mut(&mut self) -> &mut Pool {
        self.must_get_mut(APPLICATION_POOL)
    }

    /// Installs a hook called for every pool created from now on. The hook is
    /// also called once for each pool that already exists.
    pub fn set_on_create<F>(&mut self, mut cb: F)
    where
        F: FnMut(PoolId, &Pool) + Send + 'static,
    {
        for (id, pool) in &self.pools {
            cb(*id, pool);
        }
        self.on_create = Some(Box::new(cb));
    }

    pub fn clear_on_create(&mut self) {
        self.on_create = None;
    }

    /// Writes `src` at `dst` in pool `id`.
    pub fn write(&mut self, id: PoolId, dst: u64, src: Data) -> Result<(), MemoryError> {
        self.get_mut(id)?.write(dst, src);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    #[inline]
    pub fn next_id(&self) -> PoolId {
        PoolId(self.next_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &Pool)> + '_ {
        self.pools.iter().map(|(id, pool)| (*id, pool))
    }

    pub(crate) fn from_parts(mut pools: BTreeMap<PoolId, Pool>, next_id: u32) -> Self {
        pools.entry(APPLICATION_POOL).or_default();
        let next_id = pools
            .keys()
            .next_back()
            .map_or(next_id, |id| next_id.max(id.0 + 1));
        Self {
            pools,
            next_id,
            on_create: None,
        }
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Pools {
    /// Deep copy of every pool. The creation hook is not carried over.
    fn clone(&self) -> Self {
        Self {
            pools: self.pools.clone(),
            next_id: self.next_id,
            on_create: None,
        }
    }
}

impl fmt::Debug for Pools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pools")
            .field("pools", &self.pools)
            .field("next_id", &self.next_id)
            .field("on_create", &self.on_create.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_application_pool_exists() {
        let pools = Pools::new();
        assert!(pools.get(APPLICATION_POOL).is_ok());
        assert!(matches!(
            pools.get(PoolId(3)),
            Err(MemoryError::PoolNotFound(PoolId(3)))
        ));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut pools = Pools::new();
        let (a, _) = pools.new_pool();
        pools.new_at(PoolId(10));
        let (b, _) = pools.new_pool();
        assert_eq!(a, PoolId(1));
        assert_eq!(b, PoolId(11));
    }

    #[test]
    #[should_panic]
    fn test_new_at_existing_panics() {
        Pools::new().new_at(APPLICATION_POOL);
    }

    #[test]
    #[should_panic]
    fn test_must_get_missing_panics() {
        Pools::new().must_get(PoolId(42));
    }

    #[test]
    fn test_on_create_replays_existing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pools = Pools::new();
        pools.new_pool();
        let log = seen.clone();
        pools.set_on_create(move |id, _| log.lock().unwrap().push(id));
        pools.new_pool();
        assert_eq!(*seen.lock().unwrap(), vec![PoolId(0), PoolId(1), PoolId(2)]);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut pools = Pools::new();
        pools.application_mut().write_bytes(0, &[1, 2]);
        let (id, pool) = pools.new_pool();
        pool.write_bytes(4, &[3]);

        let copy = pools.clone();
        pools.application_mut().write_bytes(0, &[9]);

        let mut out = [0u8; 2];
        copy.application().read(0, &mut out).unwrap();
        assert_eq!(out, [1, 2]);
        assert_eq!(
            copy.must_get(id).slice(Range::new(4, 1)).bytes().unwrap(),
            vec![3]
        );
        assert_eq!(copy.next_id(), pools.next_id());
    }
}
