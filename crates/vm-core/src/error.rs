//! Halt classification and error kinds for the interpreter.
//!
//! Mirrors the teacher's `ExitReason`/`ExitError`/`ExitSucceed`/
//! `ExitRevert` split: hand-rolled `Display` impls rather than
//! `thiserror`, since this crate stays usable without `std`'s allocator
//! assumptions baked into `thiserror`'s derive.

use core::fmt;

/// Reasons execution can halt with a *successful* outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitSucceed {
    Stopped,
    Returned,
}

/// Reasons execution can halt after a `REVERT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitRevert {
    Reverted,
}

/// Errors that halt execution without success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecError {
    OutOfGas,
    StackUnderflow,
    StackOverflow,
    InvalidOpcode(u8),
    InvalidInstruction,
    InvalidJump,
    InvalidContract,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::OutOfGas => write!(f, "out of gas"),
            ExecError::StackUnderflow => write!(f, "stack underflow"),
            ExecError::StackOverflow => write!(f, "stack overflow"),
            ExecError::InvalidOpcode(op) => write!(f, "invalid opcode 0x{:02x}", op),
            ExecError::InvalidInstruction => write!(f, "invalid instruction"),
            ExecError::InvalidJump => write!(f, "invalid jump destination"),
            ExecError::InvalidContract => write!(f, "invalid contract"),
        }
    }
}

/// Complete classification of why execution stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Succeed(ExitSucceed),
    Revert(ExitRevert),
    Error(ExecError),
}

impl ExitReason {
    pub fn is_succeed(&self) -> bool {
        matches!(self, ExitReason::Succeed(_))
    }
}

impl From<ExitSucceed> for ExitReason {
    fn from(value: ExitSucceed) -> Self {
        ExitReason::Succeed(value)
    }
}

impl From<ExitRevert> for ExitReason {
    fn from(value: ExitRevert) -> Self {
        ExitReason::Revert(value)
    }
}

impl From<ExecError> for ExitReason {
    fn from(value: ExecError) -> Self {
        ExitReason::Error(value)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Succeed(ExitSucceed::Stopped) => write!(f, "stopped"),
            ExitReason::Succeed(ExitSucceed::Returned) => write!(f, "returned"),
            ExitReason::Revert(ExitRevert::Reverted) => write!(f, "reverted"),
            ExitReason::Error(err) => write!(f, "{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeed_variants_report_success() {
        assert!(ExitReason::from(ExitSucceed::Stopped).is_succeed());
        assert!(!ExitReason::from(ExitRevert::Reverted).is_succeed());
        assert!(!ExitReason::from(ExecError::OutOfGas).is_succeed());
    }
}
