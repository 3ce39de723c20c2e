//! Interpreter output: the one `ExecutionResult` produced per `Execute`.

use vm_core::{Address, ExecError, Hash};

/// One emitted event (LOG0-LOG4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,
}

/// One storage write recorded during execution (applied to `ContractStorage`
/// on success, discarded on revert).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub address: Address,
    pub key: Hash,
    pub value: Vec<u8>,
}

/// Outcome of one interpreter run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub return_data: Vec<u8>,
    pub gas_used: u64,
    pub gas_remaining: u64,
    pub error: Option<ExecError>,
    pub logs: Vec<Log>,
    pub state_changes: Vec<StateChange>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.success
    }
}
