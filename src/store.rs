use ahash::AHashMap;

use crate::aggregate::Aggregate;
use crate::reduce::reduce;

/// Sink for parsed records, owned by exactly one worker.
pub trait Accumulator {
    fn observe(&mut self, key: &str, value: f32);

    /// Hands over everything observed so far.
    fn finish(self) -> PartialStore;
}

/// Worker-local mapping from key to [`Aggregate`].
#[derive(Debug, Default, Clone)]
pub struct PartialStore {
    entries: AHashMap<Box<str>, Aggregate>,
}

impl PartialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a run of values for one key through the batched reducer.
    /// An empty run is a no-op.
    pub fn observe_run(&mut self, key: &str, values: &[f32]) {
        let Ok(run) = reduce(values) else {
            return;
        };
        self.absorb_entry(key, run);
    }

    /// Merges another store into this one, key by key.
    pub fn absorb(&mut self, other: PartialStore) {
        // walk the smaller map
        let (mut into, from) = if other.entries.len() > self.entries.len() {
            (other, std::mem::take(self))
        } else {
            (std::mem::take(self), other)
        };
        into.entries.reserve(from.entries.len());
        for (key, agg) in from.entries {
            into.entries
                .entry(key)
                .and_modify(|existing| existing.absorb(&agg))
                .or_insert(agg);
        }
        *self = into;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Aggregate> {
        self.entries.get(key)
    }

    /// Merges a finished aggregate into the entry for `key`.
    pub fn absorb_entry(&mut self, key: &str, agg: Aggregate) {
        // look up by borrowed key so hits never allocate
        if let Some(existing) = self.entries.get_mut(key) {
            existing.absorb(&agg);
        } else {
            self.entries.insert(key.into(), agg);
        }
    }
}

impl Accumulator for PartialStore {
    #[inline]
    fn observe(&mut self, key: &str, value: f32) {
        if let Some(existing) = self.entries.get_mut(key) {
            existing.observe(value);
        } else {
            self.entries.insert(key.into(), Aggregate::new(value));
        }
    }

    fn finish(self) -> PartialStore {
        self
    }
}

/// Buffers values per key and folds each full buffer with [`reduce`].
#[derive(Debug)]
pub struct BatchedStore {
    store: PartialStore,
    pending: AHashMap<Box<str>, Vec<f32>>,
    capacity: usize,
}

impl BatchedStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: PartialStore::new(),
            pending: AHashMap::new(),
            capacity: capacity.max(1),
        }
    }
}

impl Accumulator for BatchedStore {
    #[inline]
    fn observe(&mut self, key: &str, value: f32) {
        if let Some(buffer) = self.pending.get_mut(key) {
            buffer.push(value);
            if buffer.len() == self.capacity {
                self.store.observe_run(key, buffer);
                buffer.clear();
            }
        } else if self.capacity == 1 {
            self.store.observe_run(key, &[value]);
        } else {
            let mut buffer = Vec::with_capacity(self.capacity);
            buffer.push(value);
            self.pending.insert(key.into(), buffer);
        }
    }

    fn finish(mut self) -> PartialStore {
        for (key, buffer) in self.pending {
            self.store.observe_run(&key, &buffer);
        }
        self.store
    }
}

/// The final mapping: one [`Aggregate`] per distinct key in the input.
#[derive(Debug, Default, Clone)]
pub struct Summary {
    entries: AHashMap<Box<str>, Aggregate>,
}

impl Summary {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Aggregate> {
        self.entries.get(key)
    }

    /// Entries in ascending ordinal key order.
    pub fn sorted(&self) -> Vec<(&str, &Aggregate)> {
        let mut sorted: Vec<(&str, &Aggregate)> =
            self.entries.iter().map(|(k, v)| (&**k, v)).collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));
        sorted
    }
}

impl From<PartialStore> for Summary {
    fn from(store: PartialStore) -> Self {
        Self {
            entries: store.entries,
        }
    }
}

impl<'a> FromIterator<(&'a str, Aggregate)> for Summary {
    fn from_iter<I: IntoIterator<Item = (&'a str, Aggregate)>>(iter: I) -> Self {
        let mut store = PartialStore::new();
        for (key, agg) in iter {
            store.absorb_entry(key, agg);
        }
        Summary::from(store)
    }
}

/// Sequentially folds worker stores into the final mapping.
pub fn merge_stores(stores: impl IntoIterator<Item = PartialStore>) -> Summary {
    let merged = stores
        .into_iter()
        .fold(PartialStore::new(), |mut merged, store| {
            merged.absorb(store);
            merged
        });
    Summary::from(merged)
}
