//! Process-lifetime account state store.
//!
//! Owned and mutated by the watchdog; external callers read through `get`.
//! One lock over the whole map linearizes mutations on the same entry, which
//! is the only ordering the contract requires.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::{Address, MonitorEntry};

/// A mutation applied to a single entry under the store lock.
pub type EntryMutator = Box<dyn FnOnce(&mut MonitorEntry) + Send>;

/// Store contract for monitored-address state. Kept as a seam so tests (or a
/// future persistent backend) can swap the implementation.
pub trait MonitorStore: Send + Sync {
    /// Snapshot of the entry for `address`, if one exists.
    fn get(&self, address: &Address) -> Option<MonitorEntry>;

    /// Applies `mutate` to the entry for `address`, creating an empty entry
    /// first when absent. Mutations on the same entry are linearized.
    fn upsert(&self, address: &Address, mutate: EntryMutator);

    /// Removes the entry for `address`. Retention after an explicit stop is a
    /// policy choice left to the caller; the watchdog itself never removes.
    fn remove(&self, address: &Address) -> Option<MonitorEntry>;
}

#[derive(Debug, Default)]
pub struct InMemoryMonitorStore {
    entries: RwLock<HashMap<Address, MonitorEntry>>,
}

impl MonitorStore for InMemoryMonitorStore {
    fn get(&self, address: &Address) -> Option<MonitorEntry> {
        self.entries
            .read()
            .expect("monitor store lock poisoned")
            .get(address)
            .cloned()
    }

    fn upsert(&self, address: &Address, mutate: EntryMutator) {
        let mut entries = self.entries.write().expect("monitor store lock poisoned");
        let entry = entries
            .entry(address.clone())
            .or_insert_with(|| MonitorEntry::new(address.clone()));
        mutate(entry);
    }

    fn remove(&self, address: &Address) -> Option<MonitorEntry> {
        self.entries
            .write()
            .expect("monitor store lock poisoned")
            .remove(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonitorStatus;

    #[test]
    fn upsert_creates_entry_when_absent() {
        let store = InMemoryMonitorStore::default();
        let address = Address::new("addr1");
        assert!(store.get(&address).is_none());

        store.upsert(&address, Box::new(|_| {}));

        let entry = store.get(&address).expect("entry created");
        assert_eq!(entry.address, address);
        assert_eq!(entry.status, MonitorStatus::Monitoring);
    }

    #[test]
    fn upsert_mutates_existing_entry_in_place() {
        let store = InMemoryMonitorStore::default();
        let address = Address::new("addr1");
        store.upsert(
            &address,
            Box::new(|entry| entry.activity.push("sig-1")),
        );
        store.upsert(
            &address,
            Box::new(|entry| {
                entry.activity.push("sig-2");
                entry.status = MonitorStatus::ActiveMovement;
            }),
        );

        let entry = store.get(&address).unwrap();
        assert_eq!(entry.activity.len(), 2);
        assert_eq!(entry.activity.newest(), Some("sig-2"));
        assert_eq!(entry.status, MonitorStatus::ActiveMovement);
    }

    #[test]
    fn one_entry_per_address() {
        let store = InMemoryMonitorStore::default();
        let address = Address::new("addr1");
        store.upsert(&address, Box::new(|_| {}));
        store.upsert(&address, Box::new(|_| {}));
        assert_eq!(
            store
                .entries
                .read()
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn remove_returns_and_clears_entry() {
        let store = InMemoryMonitorStore::default();
        let address = Address::new("addr1");
        store.upsert(&address, Box::new(|_| {}));

        let removed = store.remove(&address);
        assert!(removed.is_some());
        assert!(store.get(&address).is_none());
        assert!(store.remove(&address).is_none());
    }
}
