//! Arbitrary-precision, non-negative machine word.
//!
//! A conforming EVM truncates every arithmetic result back into a 256-bit
//! ring. This core deliberately does not: `Word` is plain arbitrary
//! precision (see the base specification's open question in `DESIGN.md`).
//! Opcodes that need a *signed* interpretation (SLT, SGT, SDIV, SMOD,
//! SIGNEXTEND) borrow the usual 256-bit two's-complement convention only
//! to decide a sign; they never mask the magnitude back into 256 bits.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use std::fmt;
use std::ops::{Add, Mul, Rem, Sub};

/// Width, in bits, assumed only for sign-interpretation of signed opcodes.
pub const SIGN_BITS: u32 = 256;

/// A non-negative, arbitrary-precision integer manipulated by the VM.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Word(BigUint);

impl Word {
    pub fn zero() -> Self {
        Word(BigUint::zero())
    }

    pub fn one() -> Self {
        Word(BigUint::one())
    }

    pub fn from_u64(value: u64) -> Self {
        Word(BigUint::from(value))
    }

    pub fn from_big_endian(bytes: &[u8]) -> Self {
        Word(BigUint::from_bytes_be(bytes))
    }

    pub fn to_big_endian(&self, out: &mut [u8]) {
        let bytes = self.0.to_bytes_be();
        let len = bytes.len().min(out.len());
        for slot in out.iter_mut() {
            *slot = 0;
        }
        let start = out.len() - len;
        out[start..].copy_from_slice(&bytes[bytes.len() - len..]);
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_usize(&self) -> Option<usize> {
        use num_traits::ToPrimitive;
        self.0.to_usize()
    }

    pub fn to_u64(&self) -> Option<u64> {
        use num_traits::ToPrimitive;
        self.0.to_u64()
    }

    pub fn low_byte(&self) -> u8 {
        self.0.to_bytes_le().first().copied().unwrap_or(0)
    }

    /// Interprets this word as a two's-complement signed integer under the
    /// assumed `SIGN_BITS`-wide convention and reports whether it is
    /// negative.
    pub fn is_negative(&self) -> bool {
        let sign_bit = BigUint::one() << (SIGN_BITS - 1);
        self.0 >= sign_bit && self.0 < (BigUint::one() << SIGN_BITS)
    }

    /// Returns the two's-complement negation of this word under the
    /// assumed `SIGN_BITS`-wide convention (used to recover the magnitude
    /// of a negative operand for signed division/remainder/comparison).
    pub fn twos_complement_negate(&self) -> Word {
        let modulus = BigUint::one() << SIGN_BITS;
        Word((&modulus - &self.0) % &modulus)
    }

    /// Signed comparison under the assumed 256-bit two's-complement
    /// convention.
    pub fn signed_cmp(&self, other: &Word) -> std::cmp::Ordering {
        match (self.is_negative(), other.is_negative()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (true, true) => self
                .twos_complement_negate()
                .0
                .cmp(&other.twos_complement_negate().0)
                .reverse(),
            (false, false) => self.0.cmp(&other.0),
        }
    }

    pub fn pow(&self, exponent: &Word) -> Word {
        use num_traits::ToPrimitive;
        let exp = exponent.0.to_u32().unwrap_or(u32::MAX);
        Word(self.0.pow(exp))
    }

    pub fn checked_div(&self, other: &Word) -> Option<Word> {
        if other.is_zero() {
            None
        } else {
            Some(Word(self.0.div_floor(&other.0)))
        }
    }

    pub fn checked_rem(&self, other: &Word) -> Option<Word> {
        if other.is_zero() {
            None
        } else {
            Some(Word(self.0.mod_floor(&other.0)))
        }
    }

    pub fn bit_and(&self, other: &Word) -> Word {
        Word(&self.0 & &other.0)
    }

    pub fn bit_or(&self, other: &Word) -> Word {
        Word(&self.0 | &other.0)
    }

    pub fn bit_xor(&self, other: &Word) -> Word {
        Word(&self.0 ^ &other.0)
    }

    pub fn shl(&self, bits: u32) -> Word {
        Word(&self.0 << bits)
    }

    pub fn shr(&self, bits: u32) -> Word {
        Word(&self.0 >> bits)
    }

    pub fn byte_at(&self, index: usize) -> u8 {
        let bytes = self.0.to_bytes_be();
        if index >= bytes.len() {
            0
        } else {
            bytes[index]
        }
    }
}

impl Add for Word {
    type Output = Word;
    fn add(self, rhs: Word) -> Word {
        Word(self.0 + rhs.0)
    }
}

impl Sub for Word {
    type Output = Word;
    fn sub(self, rhs: Word) -> Word {
        if self.0 >= rhs.0 {
            Word(self.0 - rhs.0)
        } else {
            // Plain arbitrary-precision arithmetic has no ring to wrap
            // into; saturate at zero rather than panic on underflow.
            Word::zero()
        }
    }
}

impl Mul for Word {
    type Output = Word;
    fn mul(self, rhs: Word) -> Word {
        Word(self.0 * rhs.0)
    }
}

impl Rem for Word {
    type Output = Word;
    fn rem(self, rhs: Word) -> Word {
        if rhs.is_zero() {
            Word::zero()
        } else {
            Word(self.0 % rhs.0)
        }
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Word::from_u64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_does_not_truncate_past_256_bits() {
        let two_pow_256 = Word::from_u64(1).shl(256);
        let sum = two_pow_256.clone() + two_pow_256.clone();
        assert!(sum > two_pow_256);
    }

    #[test]
    fn subtraction_saturates_at_zero() {
        let small = Word::from_u64(1);
        let big = Word::from_u64(2);
        assert_eq!(small - big, Word::zero());
    }

    #[test]
    fn signed_cmp_treats_high_bit_as_negative() {
        let neg_one = Word::from_u64(1).shl(256) - Word::from_u64(1);
        let one = Word::from_u64(1);
        assert_eq!(neg_one.signed_cmp(&one), std::cmp::Ordering::Less);
    }

    #[test]
    fn big_endian_roundtrip() {
        let word = Word::from_u64(0x1234);
        let mut buf = [0u8; 32];
        word.to_big_endian(&mut buf);
        let back = Word::from_big_endian(&buf);
        assert_eq!(word, back);
    }

    #[test]
    fn division_by_zero_is_none() {
        assert!(Word::from_u64(1).checked_div(&Word::zero()).is_none());
    }
}
