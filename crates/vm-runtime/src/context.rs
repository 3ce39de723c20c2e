//! Per-call execution context.

use vm_core::{Address, Word};

/// Snapshot of everything one `Execute`/`Call` invocation needs that is
/// not part of the interpreter's own state (stack/memory/gas/PC).
///
/// Lives for exactly one invocation; never shared across concurrent
/// calls.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub address: Address,
    pub input: Vec<u8>,
    pub sender: Address,
    pub value: Word,
    pub gas_price: Word,
    pub block_number: u64,
    pub timestamp: u64,
    pub coinbase: Address,
    pub difficulty: Word,
    pub chain_id: u64,
}

impl ExecutionContext {
    pub fn new(address: Address, input: Vec<u8>, sender: Address, value: Word) -> Self {
        ExecutionContext {
            address,
            input,
            sender,
            value,
            gas_price: Word::zero(),
            block_number: 0,
            timestamp: 0,
            coinbase: Address::zero(),
            difficulty: Word::zero(),
            chain_id: 1,
        }
    }
}
