use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::scene::{Disposable, Material};

/// Reference-counted material cache shared by several objects.
///
/// The pool is an explicit value: whoever builds descriptors clones the
/// pool into the material closures that need it. A material is disposed and
/// evicted as soon as its last [`PooledMaterial`] share is released.
#[derive(Clone, Default)]
pub struct MaterialPool {
    inner: Rc<RefCell<PoolInner>>,
}

#[derive(Default)]
struct PoolInner {
    entries: HashMap<String, PoolEntry>,
}

struct PoolEntry {
    material: Rc<RefCell<Material>>,
    users: usize,
}

impl MaterialPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a share of the material cached under `key`, building it with
    /// `make` on a miss.
    pub fn acquire(&self, key: &str, make: impl FnOnce() -> Material) -> PooledMaterial {
        let mut inner = self.inner.borrow_mut();
        let entry = inner.entries.entry(key.to_string()).or_insert_with(|| {
            tracing::debug!(key, "material pool miss");
            PoolEntry {
                material: Rc::new(RefCell::new(make())),
                users: 0,
            }
        });
        entry.users += 1;

        PooledMaterial {
            key: key.to_string(),
            material: Rc::clone(&entry.material),
            pool: Rc::downgrade(&self.inner),
            released: false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().entries.contains_key(key)
    }

    /// Number of live shares of `key`.
    pub fn users(&self, key: &str) -> usize {
        self.inner
            .borrow()
            .entries
            .get(key)
            .map(|entry| entry.users)
            .unwrap_or(0)
    }
}

impl fmt::Debug for MaterialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut keys: Vec<_> = inner.entries.keys().collect();
        keys.sort();
        f.debug_struct("MaterialPool").field("keys", &keys).finish()
    }
}

/// One share of a pooled material. Releasing (explicitly or on drop)
/// decrements the pool's count for the key.
pub struct PooledMaterial {
    key: String,
    material: Rc<RefCell<Material>>,
    pool: Weak<RefCell<PoolInner>>,
    released: bool,
}

impl PooledMaterial {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn with<T>(&self, f: impl FnOnce(&Material) -> T) -> T {
        f(&self.material.borrow())
    }

    pub fn with_mut<T>(&self, f: impl FnOnce(&mut Material) -> T) -> T {
        f(&mut self.material.borrow_mut())
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Gives this share back. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let Some(pool) = self.pool.upgrade() else {
            // Pool already dropped; the last live share disposes.
            if Rc::strong_count(&self.material) == 1 {
                self.material.borrow_mut().dispose();
            }
            return;
        };
        let mut inner = pool.borrow_mut();
        let evict = match inner.entries.get_mut(&self.key) {
            Some(entry) => {
                entry.users = entry.users.saturating_sub(1);
                entry.users == 0
            }
            None => false,
        };
        if evict {
            if let Some(entry) = inner.entries.remove(&self.key) {
                entry.material.borrow_mut().dispose();
                tracing::debug!(key = %self.key, "material evicted from pool");
            }
        }
    }
}

impl Drop for PooledMaterial {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for PooledMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledMaterial")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}
