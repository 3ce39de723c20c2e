//! Monotonic gas budget consumer.
//!
//! Grounded on the upstream gasometer crate that sits alongside the
//! teacher's own `core`/`runtime` split (see DESIGN.md): a simple
//! `Result`-returning consume that becomes permanently `Err` once gas is
//! exhausted, rather than the teacher's `Result<GasometerInner, ExitError>`
//! wrapper — simplified here since this core has no per-opcode memory
//! cost schedule to recompute on every call.

use crate::error::ExecError;

/// Tracks a gas budget for one execution. Once exhausted, the meter is
/// terminal: further `consume` calls keep failing.
#[derive(Clone, Debug)]
pub struct GasMeter {
    limit: u64,
    consumed: u64,
    out: bool,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        GasMeter {
            limit,
            consumed: 0,
            out: false,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn is_out(&self) -> bool {
        self.out
    }

    /// Consumes `amount` gas for an operation named `label` (used only for
    /// diagnostics/logging). Fails without mutating `consumed` if the
    /// meter is already terminal or the consumption would overflow the
    /// limit.
    pub fn consume(&mut self, amount: u64, label: &'static str) -> Result<(), ExecError> {
        if self.out {
            return Err(ExecError::OutOfGas);
        }
        match self.consumed.checked_add(amount) {
            Some(total) if total <= self.limit => {
                self.consumed = total;
                Ok(())
            }
            _ => {
                log::trace!("gas meter exhausted consuming {amount} for {label}");
                self.out = true;
                Err(ExecError::OutOfGas)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_within_limit_succeeds() {
        let mut meter = GasMeter::new(10);
        meter.consume(6, "ADD").unwrap();
        assert_eq!(meter.consumed(), 6);
        assert_eq!(meter.remaining(), 4);
    }

    #[test]
    fn consume_past_limit_is_terminal() {
        let mut meter = GasMeter::new(5);
        assert!(meter.consume(10, "PUSH1").is_err());
        assert!(meter.is_out());
        assert!(meter.consume(0, "STOP").is_err());
        assert_eq!(meter.consumed(), 0, "failed consume must not mutate consumed");
    }

    #[test]
    fn s1_arithmetic_scenario_gas_accounting() {
        let mut meter = GasMeter::new(1000);
        meter.consume(3, "PUSH1").unwrap();
        meter.consume(3, "PUSH1").unwrap();
        meter.consume(3, "ADD").unwrap();
        meter.consume(0, "STOP").unwrap();
        assert_eq!(meter.consumed(), 9);
    }

    #[test]
    fn s2_out_of_gas_scenario() {
        let mut meter = GasMeter::new(5);
        meter.consume(3, "PUSH1").unwrap();
        assert!(meter.consume(3, "PUSH1").is_err());
        assert!(meter.consumed() <= 5);
    }
}
