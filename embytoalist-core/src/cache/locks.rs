//! Weakly-held per-fingerprint lock table.
//!
//! Each fingerprint directory gets one async mutex guarding the writer
//! pre-check and sink creation. Entries are held weakly so the map does not
//! grow with every file ever touched; a lock disappears as soon as no writer
//! holds it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

#[derive(Default, Debug)]
pub(crate) struct LockTable {
    inner: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl LockTable {
    pub(crate) fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock();
        if let Some(existing) = map.get(key).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        map.insert(key.to_string(), Arc::downgrade(&lock));
        map.retain(|_, weak| weak.strong_count() > 0);
        lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_shares_a_lock() {
        let table = LockTable::default();
        let a = table.lock_for("ab/abcdef");
        let b = table.lock_for("ab/abcdef");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_entries_die_with_their_holders() {
        let table = LockTable::default();
        let first = table.lock_for("ab/abcdef");
        drop(first);
        assert!(table.inner.lock().get("ab/abcdef").is_none_or(|w| w.upgrade().is_none()));
        // a later caller still gets a usable lock
        let second = table.lock_for("ab/abcdef");
        assert!(second.try_lock().is_ok());
    }

    #[test]
    fn test_distinct_keys_do_not_share() {
        let table = LockTable::default();
        let a = table.lock_for("ab/one");
        let b = table.lock_for("cd/two");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
