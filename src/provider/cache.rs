use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock};

type Slot<V> = Arc<OnceLock<Result<V, String>>>;

/// Compute-once cache of fallible values.
///
/// The map lock is only held to fetch a key's cell; the cell itself guards the
/// computation, so concurrent first requests for the same key run the
/// computation once while other keys proceed in parallel. Failures are cached
/// as well since every computation is a pure function of its key.
pub(crate) struct OnceCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for OnceCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> OnceCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn get_or_compute<F>(&self, key: &K, compute: F) -> Result<V, String>
    where
        F: FnOnce() -> Result<V, String>,
    {
        let slot = self.slot(key);
        slot.get_or_init(compute).clone()
    }

    /// Number of keys whose computation has finished.
    pub(crate) fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
        slots.values().filter(|slot| slot.get().is_some()).count()
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}
