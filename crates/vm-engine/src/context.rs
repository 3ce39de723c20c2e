//! Mutable block/chain context shared across every call the facade makes.

use vm_core::{Address, Word};

#[derive(Clone, Debug)]
pub struct BlockContext {
    pub block_number: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub difficulty: Word,
    pub gas_price: Word,
    pub chain_id: u64,
}

impl Default for BlockContext {
    fn default() -> Self {
        BlockContext {
            block_number: 0,
            timestamp: 0,
            coinbase: Address::zero(),
            difficulty: Word::zero(),
            gas_price: Word::zero(),
            chain_id: 1,
        }
    }
}
