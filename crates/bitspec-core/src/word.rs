//! Fixed-width bit vectors
//!
//! A [`Word`] is an unsigned value reduced modulo `2^width`. Signed
//! operations reinterpret it as two's complement. Width 0 is the empty word:
//! every arithmetic operation on it yields the empty word again.
//!
//! Bit indices passed to [`Word::bit`] and [`Word::with_bit`] count from the
//! most significant bit, matching sequence indexing in the surface language.
//! [`Word::extract`] counts from the least significant bit, matching the
//! solver's `extract`.

use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{EvalError, EvalResult};

/// A fixed-width bit vector value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Word {
    width: u32,
    value: BigUint,
}

fn modulus(width: u32) -> BigUint {
    BigUint::one() << width
}

fn mask(width: u32) -> BigUint {
    modulus(width) - 1u32
}

impl Word {
    /// Create a word, reducing `value` modulo `2^width`
    pub fn new(width: u32, value: &BigInt) -> Self {
        let m = BigInt::from(modulus(width));
        let reduced = value.mod_floor(&m);
        Self {
            width,
            value: reduced.to_biguint().unwrap_or_default(),
        }
    }

    /// Create a word from an unsigned value, reducing modulo `2^width`
    pub fn from_unsigned(width: u32, value: BigUint) -> Self {
        Self {
            width,
            value: value & mask(width),
        }
    }

    /// The all-zero word
    pub fn zero(width: u32) -> Self {
        Self {
            width,
            value: BigUint::zero(),
        }
    }

    /// The empty word
    pub fn empty() -> Self {
        Self::zero(0)
    }

    /// Width in bits
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Check if this is the empty word
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// Unsigned value
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Unsigned value as an integer
    pub fn to_unsigned(&self) -> BigInt {
        BigInt::from(self.value.clone())
    }

    /// Two's complement value
    pub fn to_signed(&self) -> BigInt {
        if self.width > 0 && self.msb() {
            BigInt::from(self.value.clone()) - BigInt::from(modulus(self.width))
        } else {
            BigInt::from(self.value.clone())
        }
    }

    /// Value as u64, if it fits
    pub fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }

    fn msb(&self) -> bool {
        self.width > 0 && self.value.bit(u64::from(self.width - 1))
    }

    fn check_width(&self, op: &str, other: &Word) -> EvalResult<()> {
        if self.width != other.width {
            return Err(EvalError::internal(format!(
                "{op}: word width mismatch ({} vs {})",
                self.width, other.width
            )));
        }
        Ok(())
    }

    fn check_index(&self, op: &str, idx: u32) -> EvalResult<u64> {
        if idx >= self.width {
            return Err(EvalError::internal(format!(
                "{op}: bit index {idx} out of range for width {}",
                self.width
            )));
        }
        Ok(u64::from(self.width - 1 - idx))
    }

    // Bits

    /// Bit at `idx`, counting from the most significant bit
    pub fn bit(&self, idx: u32) -> EvalResult<bool> {
        let pos = self.check_index("bit", idx)?;
        Ok(self.value.bit(pos))
    }

    /// Copy with the bit at `idx` (from the most significant bit) replaced
    pub fn with_bit(&self, idx: u32, b: bool) -> EvalResult<Word> {
        let pos = self.check_index("with_bit", idx)?;
        let mut value = self.value.clone();
        value.set_bit(pos, b);
        Ok(Word {
            width: self.width,
            value,
        })
    }

    /// Pack bits, most significant first
    pub fn from_bits(bits: &[bool]) -> Self {
        let width = bits.len() as u32;
        let mut value = BigUint::zero();
        for (i, b) in bits.iter().enumerate() {
            if *b {
                value.set_bit(u64::from(width) - 1 - i as u64, true);
            }
        }
        Word { width, value }
    }

    /// Unpack bits, most significant first
    pub fn to_bits(&self) -> Vec<bool> {
        (0..self.width)
            .map(|i| self.value.bit(u64::from(self.width - 1 - i)))
            .collect()
    }

    // Structure

    /// Concatenate, with `self` in the high bits
    pub fn concat(&self, low: &Word) -> Word {
        Word {
            width: self.width + low.width,
            value: (&self.value << low.width) | &low.value,
        }
    }

    /// Split into the high `left` bits and the remaining low bits
    pub fn split(&self, left: u32) -> EvalResult<(Word, Word)> {
        if left > self.width {
            return Err(EvalError::internal(format!(
                "split: {left} bits requested from a {}-bit word",
                self.width
            )));
        }
        let right = self.width - left;
        let high = Word::from_unsigned(left, &self.value >> right);
        let low = Word::from_unsigned(right, self.value.clone());
        Ok((high, low))
    }

    /// `len` bits starting at bit `lo`, counting from the least significant bit
    pub fn extract(&self, lo: u32, len: u32) -> EvalResult<Word> {
        if u64::from(lo) + u64::from(len) > u64::from(self.width) {
            return Err(EvalError::internal(format!(
                "extract: bits [{lo}, {lo}+{len}) out of range for width {}",
                self.width
            )));
        }
        Ok(Word::from_unsigned(len, &self.value >> lo))
    }

    /// Zero-extend to `width` bits
    pub fn zero_extend(&self, width: u32) -> Word {
        Word::from_unsigned(width, self.value.clone())
    }

    // Logic

    pub fn and(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("and", other)?;
        Ok(Word::from_unsigned(self.width, &self.value & &other.value))
    }

    pub fn or(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("or", other)?;
        Ok(Word::from_unsigned(self.width, &self.value | &other.value))
    }

    pub fn xor(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("xor", other)?;
        Ok(Word::from_unsigned(self.width, &self.value ^ &other.value))
    }

    pub fn complement(&self) -> Word {
        Word::from_unsigned(self.width, &self.value ^ mask(self.width))
    }

    // Arithmetic

    pub fn add(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("add", other)?;
        Ok(Word::from_unsigned(self.width, &self.value + &other.value))
    }

    pub fn sub(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("sub", other)?;
        let value = (&self.value + modulus(self.width)) - &other.value;
        Ok(Word::from_unsigned(self.width, value))
    }

    pub fn mul(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("mul", other)?;
        Ok(Word::from_unsigned(self.width, &self.value * &other.value))
    }

    pub fn neg(&self) -> Word {
        Word::new(self.width, &-self.to_unsigned())
    }

    /// Unsigned division
    pub fn udiv(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("udiv", other)?;
        if other.value.is_zero() {
            return Err(EvalError::DivideByZero);
        }
        Ok(Word::from_unsigned(self.width, &self.value / &other.value))
    }

    /// Unsigned remainder
    pub fn urem(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("urem", other)?;
        if other.value.is_zero() {
            return Err(EvalError::DivideByZero);
        }
        Ok(Word::from_unsigned(self.width, &self.value % &other.value))
    }

    /// Signed division, truncating toward zero. `MIN / -1` wraps to `MIN`.
    pub fn sdiv(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("sdiv", other)?;
        if other.value.is_zero() {
            return Err(EvalError::DivideByZero);
        }
        // BigInt division truncates
        Ok(Word::new(self.width, &(self.to_signed() / other.to_signed())))
    }

    /// Signed remainder; the result has the sign of the dividend
    pub fn srem(&self, other: &Word) -> EvalResult<Word> {
        self.check_width("srem", other)?;
        if other.value.is_zero() {
            return Err(EvalError::DivideByZero);
        }
        Ok(Word::new(self.width, &(self.to_signed() % other.to_signed())))
    }

    /// Ceiling of the base-2 logarithm; `lg2 0 == 0`
    pub fn lg2(&self) -> Word {
        let lg = if self.value <= BigUint::one() {
            0
        } else {
            (&self.value - 1u32).bits()
        };
        Word::new(self.width, &BigInt::from(lg))
    }

    // Shifts and rotates

    pub fn shl(&self, amount: u64) -> Word {
        if amount >= u64::from(self.width) {
            return Word::zero(self.width);
        }
        Word::from_unsigned(self.width, &self.value << amount)
    }

    pub fn lshr(&self, amount: u64) -> Word {
        if amount >= u64::from(self.width) {
            return Word::zero(self.width);
        }
        Word::from_unsigned(self.width, &self.value >> amount)
    }

    /// Arithmetic right shift, filling with the sign bit
    pub fn ashr(&self, amount: u64) -> Word {
        let amount = amount.min(u64::from(self.width));
        let signed = self.to_signed();
        let shifted = if signed.is_negative() {
            // Floor division by 2^amount
            signed.div_floor(&(BigInt::one() << amount))
        } else {
            signed >> amount
        };
        Word::new(self.width, &shifted)
    }

    pub fn rotl(&self, amount: u64) -> Word {
        if self.width == 0 {
            return self.clone();
        }
        let r = amount % u64::from(self.width);
        if r == 0 {
            return self.clone();
        }
        let high = &self.value << r;
        let low = &self.value >> (u64::from(self.width) - r);
        Word::from_unsigned(self.width, high | low)
    }

    pub fn rotr(&self, amount: u64) -> Word {
        if self.width == 0 {
            return self.clone();
        }
        let r = amount % u64::from(self.width);
        self.rotl(u64::from(self.width) - r)
    }

    // Comparisons

    pub fn ult(&self, other: &Word) -> EvalResult<bool> {
        self.check_width("ult", other)?;
        Ok(self.value < other.value)
    }

    pub fn slt(&self, other: &Word) -> EvalResult<bool> {
        self.check_width("slt", other)?;
        Ok(self.to_signed() < other.to_signed())
    }

    pub fn equals(&self, other: &Word) -> EvalResult<bool> {
        self.check_width("eq", other)?;
        Ok(self.value == other.value)
    }

    /// Shift amount as u64, saturating for huge values
    pub fn shift_amount(&self) -> u64 {
        self.value.to_u64().unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == 0 {
            return write!(f, "[]");
        }
        if self.width % 4 == 0 {
            let digits = (self.width / 4) as usize;
            write!(f, "0x{:0>digits$}", self.value.to_str_radix(16))
        } else {
            let digits = self.width as usize;
            write!(f, "0b{:0>digits$}", self.value.to_str_radix(2))
        }
    }
}

impl From<&Word> for BigInt {
    fn from(w: &Word) -> Self {
        BigInt::from_biguint(Sign::Plus, w.value.clone())
    }
}
