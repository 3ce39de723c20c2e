//! Core primitives for the deterministic, gas-metered contract execution
//! VM: arbitrary-precision words, the evaluation stack, byte-addressable
//! memory, the opcode table, jump-destination validity, gas accounting
//! and halt/error classification.
//!
//! This crate only defines the *shape* of execution; the fetch-decode-
//! execute loop that drives these pieces lives in `vm-runtime`.

pub mod address;
pub mod error;
pub mod gas;
pub mod hash;
pub mod memory;
pub mod opcode;
pub mod stack;
pub mod valids;
pub mod word;

pub use address::Address;
pub use error::{ExecError, ExitReason, ExitRevert, ExitSucceed};
pub use gas::GasMeter;
pub use hash::Hash;
pub use memory::Memory;
pub use opcode::{GasPriceTier, Instruction, Opcode, INSTRUCTIONS};
pub use stack::Stack;
pub use valids::Valids;
pub use word::Word;
