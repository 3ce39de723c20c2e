//! Contract storage boundary: per-contract key/value state with
//! commit/rollback semantics.

use std::collections::HashMap;
use vm_core::{Address, Hash};

/// Injected collaborator holding per-contract persistent key/value state.
///
/// `Commit`/`Rollback` bound one execution's staged writes: a successful
/// `Execute` commits its `StateChange`s through `set`; a reverted one
/// never calls `set` at all; `Rollback` exists for callers that stage
/// writes directly against the trait (e.g. multi-step deploys).
pub trait ContractStorage {
    fn get(&self, address: &Address, key: &Hash) -> Option<Vec<u8>>;
    fn set(&mut self, address: &Address, key: Hash, value: Vec<u8>);
    fn delete(&mut self, address: &Address, key: &Hash);
    fn has_key(&self, address: &Address, key: &Hash) -> bool;
    fn storage_root(&self, address: &Address) -> Hash;
    fn contract_storage(&self, address: &Address) -> HashMap<Hash, Vec<u8>>;
    fn storage_size(&self, address: &Address) -> usize;
    fn clear(&mut self, address: &Address);
    fn commit(&mut self);
    fn rollback(&mut self);
}

/// In-process reference implementation. `commit`/`rollback` are no-ops
/// here: every `set`/`delete` is applied immediately since there is no
/// staging buffer to reconcile, matching a single-process reference
/// backend rather than a transactional store.
#[derive(Default)]
pub struct InMemoryStorage {
    data: HashMap<Address, HashMap<Hash, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage {
            data: HashMap::new(),
        }
    }
}

impl ContractStorage for InMemoryStorage {
    fn get(&self, address: &Address, key: &Hash) -> Option<Vec<u8>> {
        self.data.get(address)?.get(key).cloned()
    }

    fn set(&mut self, address: &Address, key: Hash, value: Vec<u8>) {
        self.data.entry(*address).or_default().insert(key, value);
    }

    fn delete(&mut self, address: &Address, key: &Hash) {
        if let Some(slots) = self.data.get_mut(address) {
            slots.remove(key);
        }
    }

    fn has_key(&self, address: &Address, key: &Hash) -> bool {
        self.data
            .get(address)
            .map(|slots| slots.contains_key(key))
            .unwrap_or(false)
    }

    /// Reference implementation only: keccak over the sorted key/value
    /// pairs, not a Merkle root. Good enough to detect divergence between
    /// two in-memory stores; not a commitment scheme.
    fn storage_root(&self, address: &Address) -> Hash {
        let mut entries: Vec<(&Hash, &Vec<u8>)> = match self.data.get(address) {
            Some(slots) => slots.iter().collect(),
            None => return Hash::zero(),
        };
        entries.sort_by_key(|(key, _)| key.as_bytes().to_vec());
        let mut buf = Vec::new();
        for (key, value) in entries {
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(value);
        }
        Hash::from_slice(keccak_hash::keccak(&buf).as_bytes())
    }

    fn contract_storage(&self, address: &Address) -> HashMap<Hash, Vec<u8>> {
        self.data.get(address).cloned().unwrap_or_default()
    }

    fn storage_size(&self, address: &Address) -> usize {
        self.data.get(address).map(|slots| slots.len()).unwrap_or(0)
    }

    fn clear(&mut self, address: &Address) {
        self.data.remove(address);
    }

    fn commit(&mut self) {}

    fn rollback(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::from_slice(&[1; 20])
    }

    fn key(byte: u8) -> Hash {
        Hash::from_slice(&[byte; 32])
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut storage = InMemoryStorage::new();
        storage.set(&addr(), key(1), vec![9, 9]);
        assert_eq!(storage.get(&addr(), &key(1)), Some(vec![9, 9]));
    }

    #[test]
    fn delete_removes_key() {
        let mut storage = InMemoryStorage::new();
        storage.set(&addr(), key(1), vec![1]);
        storage.delete(&addr(), &key(1));
        assert!(!storage.has_key(&addr(), &key(1)));
    }

    #[test]
    fn clear_drops_whole_contract() {
        let mut storage = InMemoryStorage::new();
        storage.set(&addr(), key(1), vec![1]);
        storage.clear(&addr());
        assert_eq!(storage.storage_size(&addr()), 0);
    }

    #[test]
    fn storage_root_changes_with_content() {
        let mut storage = InMemoryStorage::new();
        let empty_root = storage.storage_root(&addr());
        storage.set(&addr(), key(1), vec![7]);
        assert_ne!(empty_root, storage.storage_root(&addr()));
    }
}
