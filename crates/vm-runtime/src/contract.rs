//! Deployed contract record.

use vm_core::{Address, Word};

/// A deployed contract: immutable code and address, mutable balance/nonce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    pub address: Address,
    pub code: Vec<u8>,
    pub creator: Address,
    pub balance: Word,
    pub nonce: u64,
}

impl Contract {
    pub fn new(address: Address, code: Vec<u8>, creator: Address) -> Self {
        Contract {
            address,
            code,
            creator,
            balance: Word::zero(),
            nonce: 0,
        }
    }
}
