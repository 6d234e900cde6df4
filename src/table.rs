//! An open-addressed, linear-probed hash table keyed by interned strings.
//!
//! Used both as the global variable table and as the string intern set (see
//! [crate::interner::Interner]). The algorithm -- not just the interface -- is the point of this
//! module, so it's hand-rolled rather than backed by [std::collections::HashMap].
//!
//! (See Crafting Interpreters, ch. 20: "Hash Tables".)

use crate::object::StringRef;
use crate::value::Value;

const TABLE_MAX_LOAD: f64 = 0.75;
const MIN_CAPACITY: usize = 8;

/// One bucket in the table.
///
/// `key: None, value: Nil` is an empty bucket that was never occupied.
/// `key: None, value: Bool(true)` is a tombstone: occupied once, deleted since.
/// `key: Some(_)` is occupied.
struct Entry {
    key: Option<StringRef>,
    value: Value,
}

impl Entry {
    fn empty() -> Self {
        Entry {
            key: None,
            value: Value::Nil,
        }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }

    fn is_truly_empty(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Nil)
    }
}

/// The hash table itself.
#[derive(Default)]
pub struct Table {
    entries: Vec<Entry>,
    /// Occupied buckets plus tombstones -- tombstones count towards the load factor so that a
    /// delete-heavy workload still triggers resizes.
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Looks up `key` by handle identity (strings are interned, so this is exact).
    pub fn get(&self, key: &StringRef) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }

        let index = self.find_entry(key);
        self.entries[index].key.as_ref()?;
        Some(self.entries[index].value.clone())
    }

    /// Inserts or overwrites `key`. Returns `true` if this created a new entry.
    pub fn set(&mut self, key: StringRef, value: Value) -> bool {
        if self.count + 1 > (self.capacity() as f64 * TABLE_MAX_LOAD) as usize {
            let new_capacity = (self.capacity() * 2).max(MIN_CAPACITY);
            self.adjust_capacity(new_capacity);
        }

        let index = self.find_entry(&key);
        let is_new_key = self.entries[index].key.is_none();
        if is_new_key && self.entries[index].is_truly_empty() {
            self.count += 1;
        }

        self.entries[index].key = Some(key);
        self.entries[index].value = value;
        is_new_key
    }

    /// Removes `key`, leaving a tombstone in its place. Returns `true` if `key` was present.
    pub fn delete(&mut self, key: &StringRef) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let index = self.find_entry(key);
        if self.entries[index].key.is_none() {
            return false;
        }

        self.entries[index] = Entry {
            key: None,
            value: Value::Bool(true),
        };
        true
    }

    /// Finds a live interned string with the given bytes and hash, without needing a candidate
    /// [StringRef] to compare against. Used only by the intern set, before the string object
    /// exists.
    pub fn find_string(&self, bytes: &[u8], hash: u32) -> Option<StringRef> {
        if self.entries.is_empty() {
            return None;
        }

        let capacity = self.capacity();
        let mut index = (hash as usize) % capacity;
        loop {
            let entry = &self.entries[index];
            match &entry.key {
                None if entry.is_truly_empty() => return None,
                None => {} // tombstone, keep probing
                Some(key) => {
                    if key.hash() == hash && key.as_bytes() == bytes {
                        return Some(key.clone());
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    /// Finds the bucket where `key` belongs: either the bucket already holding it, or the first
    /// tombstone/empty bucket on its probe sequence (preferring a tombstone so reinsertion fills
    /// gaps left by deletes).
    fn find_entry(&self, key: &StringRef) -> usize {
        let capacity = self.capacity();
        let mut index = (key.hash() as usize) % capacity;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &self.entries[index];
            match &entry.key {
                None if entry.is_truly_empty() => return tombstone.unwrap_or(index),
                None => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Some(existing) if std::rc::Rc::ptr_eq(existing, key) => return index,
                Some(_) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn adjust_capacity(&mut self, new_capacity: usize) {
        let mut new_entries: Vec<Entry> = (0..new_capacity).map(|_| Entry::empty()).collect();

        let mut new_count = 0;
        for entry in self.entries.drain(..) {
            let Some(key) = entry.key else { continue };

            let mut index = (key.hash() as usize) % new_capacity;
            loop {
                if new_entries[index].key.is_none() {
                    break;
                }
                index = (index + 1) % new_capacity;
            }
            new_entries[index] = Entry {
                key: Some(key),
                value: entry.value,
            };
            new_count += 1;
        }

        self.entries = new_entries;
        self.count = new_count;
    }

    /// Every live (non-tombstone) key currently stored, used to enumerate all interned strings.
    pub fn live_keys(&self) -> impl Iterator<Item = &StringRef> {
        self.entries.iter().filter_map(|e| e.key.as_ref())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::StringObject;
    use std::rc::Rc;

    fn key(s: &str) -> StringRef {
        Rc::new(StringObject::new(s.as_bytes().into()))
    }

    #[test]
    fn set_then_get() {
        let mut table = Table::new();
        let k = key("hello");
        assert!(table.set(k.clone(), Value::Number(42.0)));
        assert_eq!(Some(42.0), table.get(&k).and_then(|v| v.as_number()));
    }

    #[test]
    fn set_existing_key_overwrites_and_is_not_new() {
        let mut table = Table::new();
        let k = key("x");
        assert!(table.set(k.clone(), Value::Number(1.0)));
        assert!(!table.set(k.clone(), Value::Number(2.0)));
        assert_eq!(Some(2.0), table.get(&k).and_then(|v| v.as_number()));
    }

    #[test]
    fn get_missing_key_is_none() {
        let table = Table::new();
        assert!(table.get(&key("missing")).is_none());
    }

    #[test]
    fn delete_then_get_is_none_but_reinsert_works() {
        let mut table = Table::new();
        let k = key("gone");
        table.set(k.clone(), Value::Nil);
        assert!(table.delete(&k));
        assert!(table.get(&k).is_none());
        // Deleting twice fails the second time.
        assert!(!table.delete(&k));

        // A different key can still be found after a tombstone was left behind.
        let k2 = key("still here");
        table.set(k2.clone(), Value::Number(9.0));
        assert_eq!(Some(9.0), table.get(&k2).and_then(|v| v.as_number()));
    }

    #[test]
    fn grows_past_load_factor() {
        let mut table = Table::new();
        let keys: Vec<_> = (0..100).map(|i| key(&format!("key{i}"))).collect();
        for (i, k) in keys.iter().enumerate() {
            table.set(k.clone(), Value::Number(i as f64));
        }
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(Some(i as f64), table.get(k).and_then(|v| v.as_number()));
        }
    }

    #[test]
    fn find_string_matches_by_content_not_identity() {
        let mut table = Table::new();
        let k = key("needle");
        table.set(k.clone(), Value::Nil);

        let found = table.find_string(b"needle", k.hash()).unwrap();
        assert!(Rc::ptr_eq(&k, &found));
        assert!(table.find_string(b"haystack", 0).is_none());
    }
}
