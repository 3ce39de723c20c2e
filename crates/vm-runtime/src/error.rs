//! Errors that cross the runtime's API boundary as `Result::Err`.
//!
//! VM execution failures stay inside `ExecutionResult` (see
//! `result.rs`) and never arrive here; these variants are for the
//! orchestration layer around the interpreter: contract validation,
//! registry, and storage.

use vm_core::Address;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("invalid contract")]
    InvalidContract,

    #[error("contract already registered at {0}")]
    RegistrationFailed(Address),

    #[error("no contract registered at {0}")]
    ContractNotFound(Address),

    #[error("constructor failed: {0}")]
    ConstructorFailed(vm_core::ExecError),

    #[error("update failed: no contract registered at {0}")]
    UpdateFailed(Address),
}
