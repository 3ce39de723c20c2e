//! Execution Engine Facade: orchestrates `vm-runtime`'s interpreter,
//! registry, and storage behind `Deploy`/`Execute`/`Call`/`EstimateGas`.

mod context;
mod error;
mod facade;

pub use context::BlockContext;
pub use error::EngineError;
pub use facade::{
    ContractEngine, Engine, CALL_GAS_LIMIT, ESTIMATE_GAS_LIMIT, ESTIMATE_SAFETY_BUFFER,
    MIN_GAS_ESTIMATE,
};
