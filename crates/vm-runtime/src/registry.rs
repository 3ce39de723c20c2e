//! Contract registry boundary: maps address -> contract record.

use crate::contract::Contract;
use crate::error::RuntimeError;
use std::collections::HashMap;
use vm_core::Address;

#[derive(Clone, Debug, Default)]
pub struct ContractStats {
    pub total_contracts: usize,
}

/// Injected collaborator mapping addresses to deployed contracts.
///
/// Register/Remove/UpdateContract are atomic: a caller never observes a
/// partially-applied mutation.
pub trait ContractRegistry {
    fn register(&mut self, contract: Contract) -> Result<(), RuntimeError>;
    fn get(&self, address: &Address) -> Option<Contract>;
    fn exists(&self, address: &Address) -> bool;
    fn remove(&mut self, address: &Address) -> Result<Contract, RuntimeError>;
    fn list(&self) -> Vec<Address>;
    fn count(&self) -> usize;
    fn generate_address(&mut self) -> Address;
    fn update_contract(&mut self, contract: Contract) -> Result<(), RuntimeError>;
    fn clear(&mut self);
    fn contract_stats(&self) -> ContractStats;
}

/// In-process reference implementation backed by a `HashMap`.
///
/// Addresses are generated deterministically from a monotonically
/// increasing nonce hashed with keccak, matching the teacher's own
/// address-derivation style.
#[derive(Default)]
pub struct InMemoryRegistry {
    contracts: HashMap<Address, Contract>,
    next_nonce: u64,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        InMemoryRegistry {
            contracts: HashMap::new(),
            next_nonce: 0,
        }
    }
}

impl ContractRegistry for InMemoryRegistry {
    fn register(&mut self, contract: Contract) -> Result<(), RuntimeError> {
        if self.contracts.contains_key(&contract.address) {
            return Err(RuntimeError::RegistrationFailed(contract.address));
        }
        self.contracts.insert(contract.address, contract);
        Ok(())
    }

    fn get(&self, address: &Address) -> Option<Contract> {
        self.contracts.get(address).cloned()
    }

    fn exists(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    fn remove(&mut self, address: &Address) -> Result<Contract, RuntimeError> {
        self.contracts
            .remove(address)
            .ok_or(RuntimeError::ContractNotFound(*address))
    }

    fn list(&self) -> Vec<Address> {
        self.contracts.keys().copied().collect()
    }

    fn count(&self) -> usize {
        self.contracts.len()
    }

    fn generate_address(&mut self) -> Address {
        let nonce = self.next_nonce;
        self.next_nonce += 1;
        let digest = keccak_hash::keccak(nonce.to_be_bytes());
        Address::from_slice(&digest.0[12..])
    }

    fn update_contract(&mut self, contract: Contract) -> Result<(), RuntimeError> {
        if !self.contracts.contains_key(&contract.address) {
            return Err(RuntimeError::UpdateFailed(contract.address));
        }
        self.contracts.insert(contract.address, contract);
        Ok(())
    }

    fn clear(&mut self) {
        self.contracts.clear();
    }

    fn contract_stats(&self) -> ContractStats {
        ContractStats {
            total_contracts: self.contracts.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_slice(&[byte; 20])
    }

    #[test]
    fn register_then_get_roundtrips() {
        let mut registry = InMemoryRegistry::new();
        let contract = Contract::new(addr(1), vec![0x00], addr(2));
        registry.register(contract.clone()).unwrap();
        assert_eq!(registry.get(&addr(1)), Some(contract));
    }

    #[test]
    fn duplicate_register_fails() {
        let mut registry = InMemoryRegistry::new();
        registry
            .register(Contract::new(addr(1), vec![], addr(2)))
            .unwrap();
        assert!(registry
            .register(Contract::new(addr(1), vec![], addr(2)))
            .is_err());
    }

    #[test]
    fn remove_rolls_back_deploy() {
        let mut registry = InMemoryRegistry::new();
        registry
            .register(Contract::new(addr(1), vec![], addr(2)))
            .unwrap();
        registry.remove(&addr(1)).unwrap();
        assert!(!registry.exists(&addr(1)));
    }

    #[test]
    fn generate_address_is_deterministic_and_unique() {
        let mut registry = InMemoryRegistry::new();
        let a = registry.generate_address();
        let b = registry.generate_address();
        assert_ne!(a, b);
    }
}
