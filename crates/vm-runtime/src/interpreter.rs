//! Fetch-decode-execute loop.
//!
//! Structured after the teacher's `Machine::step`/`eval` split: a single
//! step fetches one opcode, consumes its base gas, dispatches to a
//! handler that mutates stack/memory/PC, and reports whether execution
//! should continue, jump, or halt. `run` drives `step` to completion and
//! assembles the `ExecutionResult`.

use crate::context::ExecutionContext;
use crate::result::{ExecutionResult, Log, StateChange};
use vm_core::{
    Address, ExecError, ExitReason, ExitRevert, ExitSucceed, GasMeter, Hash, Memory, Opcode,
    Stack, Valids, Word, INSTRUCTIONS,
};

/// What a single opcode handler did to control flow.
enum Control {
    Continue,
    Jump(usize),
    Exit(ExitReason),
}

/// Owns the per-call VM state (stack, memory, gas, PC) and the growing
/// side-effect logs. One `Interpreter` is built per `Execute`/`Call` and
/// discarded after `run`.
pub struct Interpreter<'a> {
    code: &'a [u8],
    valids: Valids,
    position: usize,
    stack: Stack,
    memory: Memory,
    gas: GasMeter,
    context: &'a ExecutionContext,
    logs: Vec<Log>,
    state_changes: Vec<StateChange>,
    halted: Option<ExitReason>,
    pending_return: Vec<u8>,
}

const DEFAULT_STACK_LIMIT: usize = 1024;
const DEFAULT_MEMORY_LIMIT: usize = 1 << 24;

impl<'a> Interpreter<'a> {
    pub fn new(code: &'a [u8], gas_limit: u64, context: &'a ExecutionContext) -> Self {
        Interpreter {
            code,
            valids: Valids::new(code),
            position: 0,
            stack: Stack::new(DEFAULT_STACK_LIMIT),
            memory: Memory::new(DEFAULT_MEMORY_LIMIT),
            gas: GasMeter::new(gas_limit),
            context,
            logs: Vec::new(),
            state_changes: Vec::new(),
            halted: None,
            pending_return: Vec::new(),
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Drives `step` until the interpreter halts, then builds the
    /// `ExecutionResult`. Natural termination (PC runs off the end of
    /// code without STOP/RETURN/REVERT) is treated as an implicit STOP.
    pub fn run(mut self) -> ExecutionResult {
        loop {
            if let Some(reason) = self.halted {
                return self.finish(reason);
            }
            if self.position >= self.code.len() {
                return self.finish(ExitReason::Succeed(ExitSucceed::Stopped));
            }
            if self.gas.is_out() {
                return self.finish(ExitReason::Error(ExecError::OutOfGas));
            }
            self.step();
        }
    }

    fn finish(self, reason: ExitReason) -> ExecutionResult {
        let success = reason.is_succeed();
        log::trace!("interpreter halted: {reason}");
        let return_data = if success {
            self.return_value(reason)
        } else {
            Vec::new()
        };
        ExecutionResult {
            success,
            return_data,
            gas_used: self.gas.consumed(),
            gas_remaining: self.gas.remaining(),
            error: match reason {
                ExitReason::Error(err) => Some(err),
                _ => None,
            },
            logs: if success { self.logs } else { Vec::new() },
            state_changes: if success {
                self.state_changes
            } else {
                Vec::new()
            },
        }
    }

    /// RETURN sets an explicit slice via `Control::Exit`'s captured
    /// memory read (see `dispatch`); the natural-termination fallback
    /// here is the first 32 bytes of memory, per the core's documented
    /// placeholder policy (not load-bearing; callers should prefer an
    /// explicit RETURN).
    fn return_value(&self, reason: ExitReason) -> Vec<u8> {
        match reason {
            ExitReason::Succeed(ExitSucceed::Returned) => self.pending_return.clone(),
            _ => self.memory.get(0, 32),
        }
    }

    fn step(&mut self) {
        let opcode = self.code[self.position];
        let instruction = match INSTRUCTIONS.get(&opcode) {
            Some(instruction) => instruction,
            None => {
                self.halted = Some(ExitReason::Error(ExecError::InvalidOpcode(opcode)));
                return;
            }
        };

        if let Err(err) = self.gas.consume(instruction.base_gas, instruction.name) {
            self.halted = Some(ExitReason::Error(err));
            return;
        }

        match self.dispatch(Opcode(opcode)) {
            Ok(Control::Continue) => {
                self.position += instruction.size;
            }
            Ok(Control::Jump(target)) => {
                self.position = target;
            }
            Ok(Control::Exit(reason)) => {
                self.halted = Some(reason);
            }
            Err(err) => {
                self.halted = Some(ExitReason::Error(err));
            }
        }
    }

    fn dispatch(&mut self, opcode: Opcode) -> Result<Control, ExecError> {
        if opcode.is_push() {
            return self.push(opcode.push_immediate_len());
        }
        if opcode.is_dup() {
            self.stack.dup(opcode.dup_depth())?;
            return Ok(Control::Continue);
        }
        if opcode.is_swap() {
            self.stack.swap_top(opcode.swap_depth())?;
            return Ok(Control::Continue);
        }
        if opcode.is_log() {
            return self.log(opcode.log_topics());
        }

        match opcode {
            Opcode::STOP => Ok(Control::Exit(ExitSucceed::Stopped.into())),
            Opcode::ADD => self.binary_op(|a, b| Ok(a + b)),
            Opcode::MUL => self.binary_op(|a, b| Ok(a * b)),
            Opcode::SUB => self.binary_op(|a, b| Ok(a - b)),
            Opcode::DIV => self.binary_op(|a, b| a.checked_div(&b).ok_or(ExecError::InvalidInstruction)),
            Opcode::SDIV => self.signed_div(),
            Opcode::MOD => self.binary_op(|a, b| a.checked_rem(&b).ok_or(ExecError::InvalidInstruction)),
            Opcode::SMOD => self.signed_mod(),
            Opcode::ADDMOD => self.ternary_op(|a, b, m| {
                if m.is_zero() {
                    Err(ExecError::InvalidInstruction)
                } else {
                    Ok((a + b).checked_rem(&m).unwrap_or_else(Word::zero))
                }
            }),
            Opcode::MULMOD => self.ternary_op(|a, b, m| {
                if m.is_zero() {
                    Err(ExecError::InvalidInstruction)
                } else {
                    Ok((a * b).checked_rem(&m).unwrap_or_else(Word::zero))
                }
            }),
            Opcode::SIGNEXTEND => self.binary_op(signextend),

            Opcode::LT => self.binary_op(|a, b| Ok(bool_word(a < b))),
            Opcode::GT => self.binary_op(|a, b| Ok(bool_word(a > b))),
            Opcode::SLT => self.binary_op(|a, b| {
                Ok(bool_word(a.signed_cmp(&b) == std::cmp::Ordering::Less))
            }),
            Opcode::SGT => self.binary_op(|a, b| {
                Ok(bool_word(a.signed_cmp(&b) == std::cmp::Ordering::Greater))
            }),
            Opcode::EQ => self.binary_op(|a, b| Ok(bool_word(a == b))),
            Opcode::ISZERO => self.unary_op(|a| Ok(bool_word(a.is_zero()))),
            Opcode::AND => self.binary_op(|a, b| Ok(a.bit_and(&b))),
            Opcode::OR => self.binary_op(|a, b| Ok(a.bit_or(&b))),
            Opcode::XOR => self.binary_op(|a, b| Ok(a.bit_xor(&b))),
            Opcode::NOT => self.unary_op(|a| {
                let mask = Word::from_u64(1).shl(vm_core::word::SIGN_BITS) - Word::one();
                Ok(mask.bit_xor(&a))
            }),
            Opcode::BYTE => self.binary_op(|index, value| {
                let index = index.to_usize().unwrap_or(usize::MAX);
                Ok(Word::from_u64(value.byte_at(index) as u64))
            }),

            Opcode::SHA3 => self.sha3(),

            Opcode::ADDRESS => self.push_address(self.context.address),
            Opcode::ORIGIN => self.push_address(self.context.sender),
            Opcode::CALLER => self.push_address(self.context.sender),
            Opcode::CALLVALUE => self.push_word(self.context.value.clone()),
            Opcode::CALLDATALOAD => self.calldataload(),
            Opcode::CALLDATASIZE => {
                self.push_word(Word::from_u64(self.context.input.len() as u64))
            }
            Opcode::CALLDATACOPY => self.data_copy_from_input(),
            Opcode::CODESIZE => self.push_word(Word::from_u64(self.code.len() as u64)),
            Opcode::CODECOPY => self.data_copy_from_code(),
            Opcode::GASPRICE => self.push_word(self.context.gas_price.clone()),
            Opcode::EXTCODESIZE => self.unary_op(|_addr| Ok(Word::zero())),
            Opcode::EXTCODECOPY => {
                self.stack.pop()?;
                self.stack.pop()?;
                self.stack.pop()?;
                self.stack.pop()?;
                Ok(Control::Continue)
            }
            Opcode::RETURNDATASIZE => self.push_word(Word::zero()),
            Opcode::RETURNDATACOPY => {
                self.stack.pop()?;
                self.stack.pop()?;
                self.stack.pop()?;
                Ok(Control::Continue)
            }
            Opcode::EXTCODEHASH => self.unary_op(|_addr| Ok(Word::zero())),
            Opcode::BLOCKHASH => self.unary_op(|_number| Ok(Word::zero())),
            Opcode::COINBASE => self.push_address(self.context.coinbase),
            Opcode::TIMESTAMP => self.push_word(Word::from_u64(self.context.timestamp)),
            Opcode::NUMBER => self.push_word(Word::from_u64(self.context.block_number)),
            Opcode::DIFFICULTY => self.push_word(self.context.difficulty.clone()),
            Opcode::GASLIMIT => self.push_word(Word::from_u64(self.gas.limit())),
            Opcode::CHAINID => self.push_word(Word::from_u64(self.context.chain_id)),
            Opcode::SELFBALANCE => self.push_word(Word::zero()),
            Opcode::BALANCE => self.unary_op(|_addr| Ok(Word::zero())),

            Opcode::POP => {
                self.stack.pop()?;
                Ok(Control::Continue)
            }
            Opcode::MLOAD => self.mload(),
            Opcode::MSTORE => self.mstore(32),
            Opcode::MSTORE8 => self.mstore(1),
            Opcode::SLOAD => self.sload(),
            Opcode::SSTORE => self.sstore(),
            Opcode::JUMP => {
                let dest = self.stack.pop()?;
                self.jump(dest)
            }
            Opcode::JUMPI => {
                let dest = self.stack.pop()?;
                let cond = self.stack.pop()?;
                if cond.is_zero() {
                    Ok(Control::Continue)
                } else {
                    self.jump(dest)
                }
            }
            Opcode::PC => self.push_word(Word::from_u64(self.position as u64)),
            Opcode::MSIZE => self.push_word(Word::from_u64(self.memory.len() as u64)),
            Opcode::GAS => self.push_word(Word::from_u64(self.gas.remaining())),
            Opcode::JUMPDEST => Ok(Control::Continue),

            Opcode::RETURN => self.halt_return(),
            Opcode::REVERT => self.halt_revert(),
            Opcode::INVALID => Err(ExecError::InvalidInstruction),
            Opcode::SUICIDE => {
                self.stack.pop()?;
                Ok(Control::Exit(ExitSucceed::Stopped.into()))
            }

            // CALL-family and CREATE-family: accepted by the opcode table
            // (gas charged, stack shape honored) but never dispatch a real
            // sub-call, consistent with the cross-contract-reentrancy
            // non-goal. Each pops its declared operands and pushes a
            // synthetic failure word.
            Opcode::CREATE => self.synthetic_call_failure(3),
            Opcode::CREATE2 => self.synthetic_call_failure(4),
            Opcode::CALL | Opcode::CALLCODE => self.synthetic_call_failure(7),
            Opcode::DELEGATECALL | Opcode::STATICCALL => self.synthetic_call_failure(6),

            _ => Err(ExecError::InvalidOpcode(opcode.0)),
        }
    }

    fn unary_op(&mut self, f: impl FnOnce(Word) -> Result<Word, ExecError>) -> Result<Control, ExecError> {
        let a = self.stack.pop()?;
        self.stack.push(f(a)?)?;
        Ok(Control::Continue)
    }

    fn binary_op(
        &mut self,
        f: impl FnOnce(Word, Word) -> Result<Word, ExecError>,
    ) -> Result<Control, ExecError> {
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        self.stack.push(f(a, b)?)?;
        Ok(Control::Continue)
    }

    fn ternary_op(
        &mut self,
        f: impl FnOnce(Word, Word, Word) -> Result<Word, ExecError>,
    ) -> Result<Control, ExecError> {
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        let c = self.stack.pop()?;
        self.stack.push(f(a, b, c)?)?;
        Ok(Control::Continue)
    }

    fn signed_div(&mut self) -> Result<Control, ExecError> {
        self.binary_op(|a, b| {
            if b.is_zero() {
                return Err(ExecError::InvalidInstruction);
            }
            let negative = a.is_negative() != b.is_negative();
            let magnitude_a = if a.is_negative() { a.twos_complement_negate() } else { a };
            let magnitude_b = if b.is_negative() { b.twos_complement_negate() } else { b };
            let quotient = magnitude_a
                .checked_div(&magnitude_b)
                .ok_or(ExecError::InvalidInstruction)?;
            Ok(if negative {
                quotient.twos_complement_negate()
            } else {
                quotient
            })
        })
    }

    fn signed_mod(&mut self) -> Result<Control, ExecError> {
        self.binary_op(|a, b| {
            if b.is_zero() {
                return Err(ExecError::InvalidInstruction);
            }
            let negative = a.is_negative();
            let magnitude_a = if a.is_negative() { a.twos_complement_negate() } else { a };
            let magnitude_b = if b.is_negative() { b.twos_complement_negate() } else { b };
            let remainder = magnitude_a
                .checked_rem(&magnitude_b)
                .ok_or(ExecError::InvalidInstruction)?;
            Ok(if negative {
                remainder.twos_complement_negate()
            } else {
                remainder
            })
        })
    }

    fn push(&mut self, len: usize) -> Result<Control, ExecError> {
        let start = self.position + 1;
        let end = (start + len).min(self.code.len());
        let mut bytes = vec![0u8; len];
        if start < self.code.len() {
            bytes[..end - start].copy_from_slice(&self.code[start..end]);
        }
        self.stack.push(Word::from_big_endian(&bytes))?;
        Ok(Control::Continue)
    }

    fn push_word(&mut self, value: Word) -> Result<Control, ExecError> {
        self.stack.push(value)?;
        Ok(Control::Continue)
    }

    fn push_address(&mut self, address: Address) -> Result<Control, ExecError> {
        self.push_word(Word::from_big_endian(address.as_bytes()))
    }

    fn calldataload(&mut self) -> Result<Control, ExecError> {
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let mut bytes = [0u8; 32];
        for (i, slot) in bytes.iter_mut().enumerate() {
            *slot = self
                .context
                .input
                .get(offset.saturating_add(i))
                .copied()
                .unwrap_or(0);
        }
        self.push_word(Word::from_big_endian(&bytes))
    }

    fn data_copy_from_input(&mut self) -> Result<Control, ExecError> {
        let dest = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let len = self.bounded_len(self.stack.pop()?.to_usize().unwrap_or(usize::MAX));
        let mut bytes = vec![0u8; len];
        for (i, slot) in bytes.iter_mut().enumerate() {
            *slot = self
                .context
                .input
                .get(offset.saturating_add(i))
                .copied()
                .unwrap_or(0);
        }
        self.memory.set(dest, &bytes);
        Ok(Control::Continue)
    }

    fn data_copy_from_code(&mut self) -> Result<Control, ExecError> {
        let dest = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let len = self.bounded_len(self.stack.pop()?.to_usize().unwrap_or(usize::MAX));
        let mut bytes = vec![0u8; len];
        for (i, slot) in bytes.iter_mut().enumerate() {
            *slot = self.code.get(offset.saturating_add(i)).copied().unwrap_or(0);
        }
        self.memory.set(dest, &bytes);
        Ok(Control::Continue)
    }

    fn mload(&mut self) -> Result<Control, ExecError> {
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let bytes = self.memory.get(offset, 32);
        self.push_word(Word::from_big_endian(&bytes))
    }

    fn mstore(&mut self, width: usize) -> Result<Control, ExecError> {
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let value = self.stack.pop()?;
        let mut buf = vec![0u8; width];
        if width == 1 {
            buf[0] = value.low_byte();
        } else {
            value.to_big_endian(&mut buf);
        }
        self.memory.set(offset, &buf);
        Ok(Control::Continue)
    }

    fn sload(&mut self) -> Result<Control, ExecError> {
        let key = self.stack.pop()?;
        let mut key_bytes = [0u8; 32];
        key.to_big_endian(&mut key_bytes);
        // No injected ContractStorage at this layer; reads observe only
        // what this execution itself wrote via SSTORE.
        let stored = self
            .state_changes
            .iter()
            .rev()
            .find(|change| {
                change.address == self.context.address && change.key.as_bytes() == &key_bytes[..]
            })
            .map(|change| change.value.clone());
        self.push_word(Word::from_big_endian(&stored.unwrap_or_default()))
    }

    fn sstore(&mut self) -> Result<Control, ExecError> {
        let key = self.stack.pop()?;
        let value = self.stack.pop()?;
        let mut key_bytes = [0u8; 32];
        key.to_big_endian(&mut key_bytes);
        let mut value_bytes = [0u8; 32];
        value.to_big_endian(&mut value_bytes);
        self.state_changes.push(StateChange {
            address: self.context.address,
            key: Hash::from_slice(&key_bytes),
            value: value_bytes.to_vec(),
        });
        Ok(Control::Continue)
    }

    fn jump(&mut self, dest: Word) -> Result<Control, ExecError> {
        let target = dest.to_usize().ok_or(ExecError::InvalidJump)?;
        if self.valids.is_valid(target) {
            Ok(Control::Jump(target))
        } else {
            Err(ExecError::InvalidJump)
        }
    }

    fn log(&mut self, topic_count: usize) -> Result<Control, ExecError> {
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let len = self.bounded_len(self.stack.pop()?.to_usize().unwrap_or(usize::MAX));
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            let topic = self.stack.pop()?;
            let mut bytes = [0u8; 32];
            topic.to_big_endian(&mut bytes);
            topics.push(Hash::from_slice(&bytes));
        }
        let data = self.memory.get(offset, len);
        self.logs.push(Log {
            address: self.context.address,
            topics,
            data,
        });
        Ok(Control::Continue)
    }

    fn sha3(&mut self) -> Result<Control, ExecError> {
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let len = self.bounded_len(self.stack.pop()?.to_usize().unwrap_or(usize::MAX));
        let data = self.memory.get(offset, len);
        let digest = keccak_hash::keccak(&data);
        self.push_word(Word::from_big_endian(digest.as_bytes()))
    }

    fn halt_return(&mut self) -> Result<Control, ExecError> {
        let offset = self.stack.pop()?.to_usize().unwrap_or(usize::MAX);
        let len = self.bounded_len(self.stack.pop()?.to_usize().unwrap_or(usize::MAX));
        self.pending_return = self.memory.get(offset, len);
        Ok(Control::Exit(ExitSucceed::Returned.into()))
    }

    /// Clamps an attacker-controlled length to the interpreter's memory
    /// limit so a single CALLDATACOPY/SHA3/LOG/RETURN cannot force an
    /// allocation larger than the memory this execution could ever
    /// legitimately grow into.
    fn bounded_len(&self, len: usize) -> usize {
        len.min(DEFAULT_MEMORY_LIMIT)
    }

    fn halt_revert(&mut self) -> Result<Control, ExecError> {
        self.stack.pop()?;
        self.stack.pop()?;
        Ok(Control::Exit(ExitRevert::Reverted.into()))
    }

    fn synthetic_call_failure(&mut self, pops: usize) -> Result<Control, ExecError> {
        for _ in 0..pops {
            self.stack.pop()?;
        }
        self.push_word(Word::zero())
    }
}

fn bool_word(value: bool) -> Word {
    if value {
        Word::one()
    } else {
        Word::zero()
    }
}

/// SIGNEXTEND under the core's assumed `SIGN_BITS`-wide convention: `size`
/// names the zero-indexed source byte; bits above it are replicated from
/// that byte's sign bit. A `size` at or past the assumed width is a no-op.
fn signextend(size: Word, value: Word) -> Result<Word, ExecError> {
    let size = match size.to_usize() {
        Some(size) if size < (vm_core::word::SIGN_BITS / 8) as usize => size,
        _ => return Ok(value),
    };
    let bit_index = (size as u32) * 8 + 7;
    let sign_bit_set = value.shr(bit_index).low_byte() & 1 == 1;
    let keep_mask = Word::one().shl(bit_index + 1) - Word::one();
    if sign_bit_set {
        let full_mask = Word::one().shl(vm_core::word::SIGN_BITS) - Word::one();
        let high_bits = full_mask.bit_xor(&keep_mask);
        Ok(value.bit_or(&high_bits))
    } else {
        Ok(value.bit_and(&keep_mask))
    }
}
