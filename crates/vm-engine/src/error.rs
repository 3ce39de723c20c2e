//! Errors the facade propagates as `Result::Err`. VM execution failures
//! never arrive here — they stay inside `ExecutionResult::error`.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Runtime(#[from] vm_runtime::RuntimeError),

    #[error("constructor reverted or halted with an error before deployment completed")]
    ConstructorFailed,

    #[error("call failed: {0}")]
    CallFailed(vm_core::ExecError),

    #[error("call failed: execution reverted")]
    CallReverted,
}
