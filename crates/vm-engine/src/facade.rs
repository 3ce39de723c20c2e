//! Execution Engine Facade: `Deploy`/`Execute`/`Call`/`EstimateGas`
//! orchestration over the interpreter plus an injected registry/storage
//! pair.
//!
//! Grounded on the teacher's sibling `mazze-vm-interpreter` factory
//! (`Factory::create` dispatching to a concrete VM by capability) for the
//! `ContractEngine` capability-trait shape, and on `velas-evm`'s
//! `Runtime::new`/`run` for the call-then-report structure each facade
//! method follows.

use crate::context::BlockContext;
use crate::error::EngineError;
use parking_lot::RwLock;
use std::sync::Arc;
use vm_core::{Address, Word};
use vm_runtime::{
    Contract, ContractRegistry, ContractStorage, ExecutionContext, ExecutionResult, Interpreter,
};

/// Read-call gas limit used by `call`, matching the spec's recommendation.
pub const CALL_GAS_LIMIT: u64 = 1_000_000;
/// Gas limit used while estimating, matching the spec's recommendation.
pub const ESTIMATE_GAS_LIMIT: u64 = 10_000_000;
/// Floor under which an estimate is never reported, matching a plain
/// value-transfer's base cost in the opcode table's gas schedule.
pub const MIN_GAS_ESTIMATE: u64 = 21_000;
/// Safety buffer multiplier applied to a successful estimate.
pub const ESTIMATE_SAFETY_BUFFER: f64 = 1.2;

/// Capability trait modeling dynamic dispatch across VM/contract engines
/// (see the base specification's "dynamic dispatch" design note): any
/// engine implementation exposing these seven operations can stand in
/// for this one behind a `dyn ContractEngine`.
pub trait ContractEngine {
    fn deploy(
        &self,
        code: Vec<u8>,
        constructor: Vec<u8>,
        gas: u64,
        sender: Address,
        value: Word,
    ) -> Result<(Contract, ExecutionResult), EngineError>;

    fn execute(
        &self,
        address: Address,
        input: Vec<u8>,
        gas: u64,
        sender: Address,
        value: Word,
    ) -> Result<ExecutionResult, EngineError>;

    fn call(&self, address: Address, input: Vec<u8>, sender: Address) -> Result<Vec<u8>, EngineError>;

    fn estimate_gas(
        &self,
        address: Address,
        input: Vec<u8>,
        sender: Address,
        value: Word,
    ) -> Result<u64, EngineError>;

    fn set_block_context(&self, block_number: u64, timestamp: u64, coinbase: Address, difficulty: Word);
    fn set_gas_price(&self, gas_price: Word);
    fn set_chain_id(&self, chain_id: u64);
}

/// Default facade: an in-process registry and storage behind their own
/// `RwLock`s. `Execute`/`Call` take the registry's read lock for the
/// full call (they never mutate it); `Deploy` takes the write lock,
/// including across the constructor run, via an internal variant that
/// assumes the lock is already held so it never re-enters and deadlocks
/// itself.
pub struct Engine<R, S> {
    registry: Arc<RwLock<R>>,
    storage: Arc<RwLock<S>>,
    block: Arc<RwLock<BlockContext>>,
}

impl<R, S> Engine<R, S>
where
    R: ContractRegistry,
    S: ContractStorage,
{
    pub fn new(registry: R, storage: S) -> Self {
        Engine {
            registry: Arc::new(RwLock::new(registry)),
            storage: Arc::new(RwLock::new(storage)),
            block: Arc::new(RwLock::new(BlockContext::default())),
        }
    }

    fn build_context(&self, address: Address, input: Vec<u8>, sender: Address, value: Word) -> ExecutionContext {
        let block = self.block.read();
        ExecutionContext {
            address,
            input,
            sender,
            value,
            gas_price: block.gas_price.clone(),
            block_number: block.block_number,
            timestamp: block.timestamp,
            coinbase: block.coinbase,
            difficulty: block.difficulty.clone(),
            chain_id: block.chain_id,
        }
    }

    /// Runs `code` against `context` with `gas`. When `commit` is set, the
    /// resulting `StateChange`s are applied to `storage` on success
    /// (revert/error discard them regardless, matching the interpreter's
    /// own contract); `estimate_gas` passes `commit = false` so a
    /// speculative run never touches live storage.
    fn run(&self, code: &[u8], context: &ExecutionContext, gas: u64, commit: bool) -> ExecutionResult {
        let result = Interpreter::new(code, gas, context).run();
        if commit && result.success && !result.state_changes.is_empty() {
            let mut storage = self.storage.write();
            for change in &result.state_changes {
                storage.set(&change.address, change.key, change.value.clone());
            }
        }
        result
    }

    /// Deploy's constructor path. Assumes the registry write lock is
    /// already held by the caller.
    fn run_constructor(
        &self,
        registry: &mut R,
        mut contract: Contract,
        constructor: Vec<u8>,
        gas: u64,
        sender: Address,
        value: Word,
    ) -> Result<(Contract, ExecutionResult), EngineError> {
        let context = self.build_context(contract.address, Vec::new(), sender, value);
        let result = self.run(&constructor, &context, gas, true);
        if !result.success {
            registry.remove(&contract.address)?;
            return Err(EngineError::ConstructorFailed);
        }
        contract.nonce += 1;
        registry.update_contract(contract.clone())?;
        Ok((contract, result))
    }

    /// Shared body of `Execute`/`EstimateGas`: looks up the contract and
    /// runs it under `gas`. `commit` controls whether a successful run's
    /// state changes land in live storage; `estimate_gas` passes `false`
    /// so speculative execution never mutates the engine.
    fn execute_with(
        &self,
        address: Address,
        input: Vec<u8>,
        gas: u64,
        sender: Address,
        value: Word,
        commit: bool,
    ) -> Result<ExecutionResult, EngineError> {
        let registry = self.registry.read();
        let contract = registry
            .get(&address)
            .ok_or(vm_runtime::RuntimeError::ContractNotFound(address))?;
        if contract.code.is_empty() {
            return Err(vm_runtime::RuntimeError::InvalidContract.into());
        }
        let context = self.build_context(address, input, sender, value);
        Ok(self.run(&contract.code, &context, gas, commit))
    }
}

impl<R, S> ContractEngine for Engine<R, S>
where
    R: ContractRegistry,
    S: ContractStorage,
{
    fn deploy(
        &self,
        code: Vec<u8>,
        constructor: Vec<u8>,
        gas: u64,
        sender: Address,
        value: Word,
    ) -> Result<(Contract, ExecutionResult), EngineError> {
        let mut registry = self.registry.write();
        let address = registry.generate_address();
        let contract = Contract::new(address, code, sender);
        registry.register(contract.clone())?;

        if constructor.is_empty() {
            log::debug!("deployed {address} with no constructor");
            let result = ExecutionResult {
                success: true,
                return_data: Vec::new(),
                gas_used: 0,
                gas_remaining: gas,
                error: None,
                logs: Vec::new(),
                state_changes: Vec::new(),
            };
            return Ok((contract, result));
        }

        match self.run_constructor(&mut *registry, contract, constructor, gas, sender, value) {
            Ok(outcome) => {
                log::debug!("deployed {} with constructor", outcome.0.address);
                Ok(outcome)
            }
            Err(err) => {
                log::warn!("constructor failed, deploy rolled back: {err}");
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        address: Address,
        input: Vec<u8>,
        gas: u64,
        sender: Address,
        value: Word,
    ) -> Result<ExecutionResult, EngineError> {
        self.execute_with(address, input, gas, sender, value, true)
    }

    fn call(&self, address: Address, input: Vec<u8>, sender: Address) -> Result<Vec<u8>, EngineError> {
        let result = self.execute(address, input, CALL_GAS_LIMIT, sender, Word::zero())?;
        if !result.success {
            return Err(match result.error {
                None => EngineError::CallReverted,
                Some(err) => EngineError::CallFailed(err),
            });
        }
        Ok(result.return_data)
    }

    fn estimate_gas(
        &self,
        address: Address,
        input: Vec<u8>,
        sender: Address,
        value: Word,
    ) -> Result<u64, EngineError> {
        let result = self.execute_with(address, input, ESTIMATE_GAS_LIMIT, sender, value, false)?;
        let floor = result.gas_used.max(MIN_GAS_ESTIMATE);
        Ok((floor as f64 * ESTIMATE_SAFETY_BUFFER) as u64)
    }

    fn set_block_context(&self, block_number: u64, timestamp: u64, coinbase: Address, difficulty: Word) {
        let mut block = self.block.write();
        block.block_number = block_number;
        block.timestamp = timestamp;
        block.coinbase = coinbase;
        block.difficulty = difficulty;
    }

    fn set_gas_price(&self, gas_price: Word) {
        self.block.write().gas_price = gas_price;
    }

    fn set_chain_id(&self, chain_id: u64) {
        self.block.write().chain_id = chain_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm_runtime::{InMemoryRegistry, InMemoryStorage};

    fn engine() -> Engine<InMemoryRegistry, InMemoryStorage> {
        Engine::new(InMemoryRegistry::new(), InMemoryStorage::new())
    }

    #[test]
    fn deploy_without_constructor_succeeds_with_zero_gas() {
        let engine = engine();
        let (contract, result) = engine
            .deploy(vec![0x00], Vec::new(), 1000, Address::zero(), Word::zero())
            .unwrap();
        assert!(result.success);
        assert_eq!(result.gas_used, 0);
        assert!(!contract.address.is_zero());
    }

    #[test]
    fn s6_constructor_failure_rolls_back_registration() {
        let engine = engine();
        let err = engine
            .deploy(vec![0x00], vec![0xFE], 1000, Address::zero(), Word::zero())
            .unwrap_err();
        assert_eq!(err, EngineError::ConstructorFailed);
    }

    #[test]
    fn s6_invalid_jump_constructor_also_rolls_back() {
        let engine = engine();
        // PUSH1 0; JUMP as constructor: PC 0 is PUSH1 data, not JUMPDEST.
        let err = engine
            .deploy(vec![0x00], vec![0x60, 0x00, 0x56], 1000, Address::zero(), Word::zero())
            .unwrap_err();
        assert_eq!(err, EngineError::ConstructorFailed);
    }

    #[test]
    fn execute_against_missing_contract_is_invalid() {
        let engine = engine();
        let err = engine
            .execute(Address::zero(), Vec::new(), 1000, Address::zero(), Word::zero())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Runtime(vm_runtime::RuntimeError::ContractNotFound(_))
        ));
    }

    #[test]
    fn call_wraps_execute_with_fixed_gas() {
        let engine = engine();
        let (contract, _) = engine
            .deploy(vec![0x60, 0x07, 0x60, 0x05, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3], Vec::new(), 1000, Address::zero(), Word::zero())
            .unwrap();
        let data = engine.call(contract.address, Vec::new(), Address::zero()).unwrap();
        assert_eq!(data.len(), 32);
        assert_eq!(data[31], 12);
    }

    #[test]
    fn estimate_gas_does_not_commit_state_changes() {
        let engine = engine();
        // PUSH1 42; PUSH1 1; SSTORE.
        let (contract, _) = engine
            .deploy(vec![0x60, 0x2a, 0x60, 0x01, 0x55], Vec::new(), 1000, Address::zero(), Word::zero())
            .unwrap();

        engine
            .estimate_gas(contract.address, Vec::new(), Address::zero(), Word::zero())
            .unwrap();
        assert_eq!(engine.storage.read().storage_size(&contract.address), 0);

        engine
            .execute(contract.address, Vec::new(), 1000, Address::zero(), Word::zero())
            .unwrap();
        assert_eq!(engine.storage.read().storage_size(&contract.address), 1);
    }

    #[test]
    fn estimate_gas_applies_floor_and_buffer() {
        let engine = engine();
        let (contract, _) = engine
            .deploy(vec![0x00], Vec::new(), 1000, Address::zero(), Word::zero())
            .unwrap();
        let estimate = engine
            .estimate_gas(contract.address, Vec::new(), Address::zero(), Word::zero())
            .unwrap();
        assert_eq!(estimate, (MIN_GAS_ESTIMATE as f64 * ESTIMATE_SAFETY_BUFFER) as u64);
    }
}
