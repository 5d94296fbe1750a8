use crate::common::heap::Handle;
use crate::common::value::Value;

const TABLE_MAX_LOAD: f64 = 0.75;

/// One slot of a [`Table`].
///
/// `key: None` with a nil value is an empty, never-used slot;
/// `key: None` with a `Boolean(true)` value is a tombstone left by a
/// deletion, kept so that probe chains stay intact.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Option<Handle>,
    pub hash: u32,
    pub value: Value,
}

impl Entry {
    fn unused() -> Entry {
        Entry {
            key: None,
            hash: 0,
            value: Value::Nil,
        }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !matches!(self.value, Value::Nil)
    }
}

/// An open-addressing hash table keyed by interned string handles.
///
/// Because keys are interned, equality is handle identity; the key's
/// string hash is cached in the entry so probing and rehashing never
/// touch the heap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    pub fn new() -> Table {
        Table {
            count: 0,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Raw access to the underlying slots, used by the heap's
    /// `find_string` to probe by content.
    pub(crate) fn entries_raw(&self) -> &[Entry] {
        &self.entries
    }

    fn find_slot(&self, key: Handle, hash: u32) -> usize {
        let capacity = self.entries.len();
        let mut index = hash as usize % capacity;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &self.entries[index];

            match entry.key {
                None => {
                    if !entry.is_tombstone() {
                        // Empty entry.
                        return tombstone.unwrap_or(index);
                    }
                    // We found a tombstone.
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Some(existing) if existing == key => {
                    // We found the key.
                    return index;
                }
                Some(_) => {}
            }

            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.capacity() < 8 {
            8
        } else {
            self.capacity() * 2
        };

        let old = std::mem::replace(&mut self.entries, vec![Entry::unused(); new_capacity]);

        // Tombstones are dropped on the floor; recompute the count
        // from the live entries alone.
        self.count = 0;
        for entry in old {
            if entry.key.is_none() {
                continue;
            }

            let dest = self.find_slot(entry.key.unwrap(), entry.hash);
            self.entries[dest] = entry;
            self.count += 1;
        }
    }

    pub fn get(&self, key: Handle, hash: u32) -> Option<&Value> {
        if self.count == 0 {
            return None;
        }

        let index = self.find_slot(key, hash);
        let entry = &self.entries[index];
        entry.key.map(|_| &entry.value)
    }

    /// Insert or overwrite. Returns `true` if the key was not already
    /// present.
    pub fn set(&mut self, key: Handle, hash: u32, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            self.grow();
        }

        let index = self.find_slot(key, hash);
        let entry = &mut self.entries[index];

        let is_new_key = entry.key.is_none();
        // Reusing a tombstone doesn't bump the count; it was already
        // counted when the deleted key was inserted.
        if is_new_key && !entry.is_tombstone() {
            self.count += 1;
        }

        entry.key = Some(key);
        entry.hash = hash;
        entry.value = value;
        is_new_key
    }

    /// Remove a key, leaving a tombstone in its slot.
    pub fn remove(&mut self, key: Handle, hash: u32) -> bool {
        if self.count == 0 {
            return false;
        }

        let index = self.find_slot(key, hash);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }

        entry.key = None;
        entry.value = Value::Boolean(true);
        true
    }

    /// Copy every live entry of `from` into this table.
    pub fn add_all(&mut self, from: &Table) {
        for entry in &from.entries {
            if let Some(key) = entry.key {
                self.set(key, entry.hash, entry.value.clone());
            }
        }
    }

    /// Iterate over the live entries.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Value)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.key.map(|key| (key, &entry.value)))
    }

    /// Tombstone every entry whose key fails the predicate. Used to
    /// treat the string-intern table as weak during collection.
    pub fn retain(&mut self, mut keep: impl FnMut(Handle) -> bool) {
        for entry in self.entries.iter_mut() {
            if let Some(key) = entry.key {
                if !keep(key) {
                    entry.key = None;
                    entry.value = Value::Boolean(true);
                }
            }
        }
    }
}

/// One slot of a [`HashIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: Option<u64>,
    pub value: Value,
}

impl IndexEntry {
    fn unused() -> IndexEntry {
        IndexEntry {
            key: None,
            value: Value::Nil,
        }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !matches!(self.value, Value::Nil)
    }
}

/// The same open-addressing scheme as [`Table`], keyed by raw 64-bit
/// integers. Backs a map's indexed entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HashIndex {
    count: usize,
    entries: Vec<IndexEntry>,
}

impl HashIndex {
    pub fn new() -> HashIndex {
        HashIndex {
            count: 0,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn find_slot(&self, key: u64) -> usize {
        let capacity = self.entries.len();
        let mut index = key as usize % capacity;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &self.entries[index];

            match entry.key {
                None => {
                    if !entry.is_tombstone() {
                        return tombstone.unwrap_or(index);
                    }
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Some(existing) if existing == key => return index,
                Some(_) => {}
            }

            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.capacity() < 8 {
            8
        } else {
            self.capacity() * 2
        };

        let old = std::mem::replace(&mut self.entries, vec![IndexEntry::unused(); new_capacity]);

        self.count = 0;
        for entry in old {
            if entry.key.is_none() {
                continue;
            }

            let dest = self.find_slot(entry.key.unwrap());
            self.entries[dest] = entry;
            self.count += 1;
        }
    }

    pub fn get(&self, key: u64) -> Option<&Value> {
        if self.count == 0 {
            return None;
        }

        let index = self.find_slot(key);
        let entry = &self.entries[index];
        entry.key.map(|_| &entry.value)
    }

    pub fn set(&mut self, key: u64, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            self.grow();
        }

        let index = self.find_slot(key);
        let entry = &mut self.entries[index];

        let is_new_key = entry.key.is_none();
        if is_new_key && !entry.is_tombstone() {
            self.count += 1;
        }

        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    pub fn remove(&mut self, key: u64) -> bool {
        if self.count == 0 {
            return false;
        }

        let index = self.find_slot(key);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }

        entry.key = None;
        entry.value = Value::Boolean(true);
        true
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries
            .iter()
            .filter(|entry| entry.key.is_some())
            .map(|entry| &entry.value)
    }
}
