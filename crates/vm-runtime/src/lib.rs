//! Drives `vm-core` through one execution: the fetch-decode-execute
//! loop, the per-call context/result types, and the two injected
//! collaborators (contract registry, contract storage) the facade in
//! `vm-engine` wires together.

mod context;
mod contract;
mod error;
mod interpreter;
mod registry;
mod result;
mod storage;

pub use context::ExecutionContext;
pub use contract::Contract;
pub use error::RuntimeError;
pub use interpreter::Interpreter;
pub use registry::{ContractRegistry, ContractStats, InMemoryRegistry};
pub use result::{ExecutionResult, Log, StateChange};
pub use storage::{ContractStorage, InMemoryStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use vm_core::{Address, ExecError, Word};

    fn run(code: &[u8], gas_limit: u64) -> ExecutionResult {
        let context = ExecutionContext::new(Address::zero(), Vec::new(), Address::zero(), Word::zero());
        Interpreter::new(code, gas_limit, &context).run()
    }

    #[test]
    fn s1_arithmetic_push_add_stop() {
        let code = [0x60, 0x07, 0x60, 0x05, 0x01, 0x00];
        let result = run(&code, 1000);
        assert!(result.success);
        assert_eq!(result.gas_used, 9);
    }

    #[test]
    fn s2_out_of_gas() {
        let code = [0x60, 0x07, 0x60, 0x05, 0x01, 0x00];
        let result = run(&code, 5);
        assert!(!result.success);
        assert_eq!(result.error, Some(ExecError::OutOfGas));
        assert!(result.gas_used <= 5);
    }

    #[test]
    fn s3_invalid_opcode() {
        let code = [0x0C, 0x00];
        let result = run(&code, 1000);
        assert!(!result.success);
        assert_eq!(result.error, Some(ExecError::InvalidOpcode(0x0C)));
    }

    #[test]
    fn s6_invalid_jump_onto_push_data() {
        // PUSH1 0; JUMP -- PC 0 holds a PUSH1 opcode, not JUMPDEST.
        let code = [0x60, 0x00, 0x56];
        let result = run(&code, 1000);
        assert!(!result.success);
        assert_eq!(result.error, Some(ExecError::InvalidJump));
    }

    #[test]
    fn invalid_instruction_halts_without_success() {
        let code = [0xFE];
        let result = run(&code, 1000);
        assert!(!result.success);
        assert_eq!(result.error, Some(ExecError::InvalidInstruction));
    }

    #[test]
    fn jumpdest_enforced_for_valid_jump() {
        // PUSH1 3; JUMP; JUMPDEST; STOP
        let code = [0x60, 0x03, 0x56, 0x5B, 0x00];
        let result = run(&code, 1000);
        assert!(result.success);
    }

    #[test]
    fn revert_discards_side_effects_but_reports_failure() {
        // PUSH1 0; PUSH1 0; REVERT
        let code = [0x60, 0x00, 0x60, 0x00, 0xFD];
        let result = run(&code, 1000);
        assert!(!result.success);
        assert!(result.logs.is_empty());
    }

    #[test]
    fn div_by_zero_is_invalid_instruction() {
        // PUSH1 0; PUSH1 5; DIV; STOP
        let code = [0x60, 0x00, 0x60, 0x05, 0x04, 0x00];
        let result = run(&code, 1000);
        assert!(!result.success);
        assert_eq!(result.error, Some(ExecError::InvalidInstruction));
    }
}
