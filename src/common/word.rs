use std::ops::{BitAnd, BitOr, BitXor, Shl, Shr};

use i256::I256;
use primitive_types::U512;
use serde::{Serialize, Serializer};

type U256 = primitive_types::U256;

#[derive(Default, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Word(U256);

impl Word {
    pub fn mul_modulo(&self, that: &Word, modulo: &Word) -> Word {
        if modulo.is_zero() {
            return Word::zero();
        }
        let res = self.0.full_mul(that.0) % U512::from(modulo.0);
        Word(U256::from_big_endian(&res.to_big_endian()[32..]))
    }

    pub fn add_modulo(&self, that: &Word, modulo: &Word) -> Word {
        if modulo.is_zero() {
            return Word::zero();
        }
        let res = (U512::from(self.0) + U512::from(that.0)) % U512::from(modulo.0);
        Word(U256::from_big_endian(&res.to_big_endian()[32..]))
    }
}

impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::fmt::LowerHex for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Word {
    pub fn into_bytes(&self) -> [u8; 32] {
        self.0.to_big_endian()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `None` when the value does not fit into `usize`.
    pub fn to_usize(&self) -> Option<usize> {
        if self.0 > U256::from(usize::MAX) {
            None
        } else {
            Some(self.0.low_u64() as usize)
        }
    }

    /// `None` when the value does not fit into `u64`.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0 > U256::from(u64::MAX) {
            None
        } else {
            Some(self.0.low_u64())
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let word = primitive_types::U256::from_big_endian(bytes);
        Self(word)
    }

    pub fn zero() -> Self {
        Self(primitive_types::U256::zero())
    }

    pub fn one() -> Self {
        Self(primitive_types::U256::one())
    }

    pub fn max() -> Self {
        Self(primitive_types::U256::max_value())
    }

    pub fn bit(&self, index: usize) -> bool {
        self.0.bit(index)
    }

    /// Number of significant bytes, as priced by EXP.
    pub fn byte_len(&self) -> usize {
        self.0.bits().div_ceil(8)
    }

    pub fn pow(&self, exp: Self) -> Self {
        let (ret, _) = self.0.overflowing_pow(exp.0);
        Self(ret)
    }

    pub fn overflowing_add(&self, rhs: Self) -> (Self, bool) {
        let (word, flag) = self.0.overflowing_add(rhs.0);
        (Self(word), flag)
    }

    pub fn overflowing_mul(&self, rhs: Self) -> (Self, bool) {
        let (word, flag) = self.0.overflowing_mul(rhs.0);
        (Self(word), flag)
    }

    pub fn overflowing_sub(&self, rhs: Self) -> (Self, bool) {
        let (word, flag) = self.0.overflowing_sub(rhs.0);
        (Self(word), flag)
    }

    pub fn checked_add(&self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    fn signed(&self) -> I256 {
        I256::from_be_bytes(self.into_bytes())
    }

    fn from_signed(value: I256) -> Self {
        Self::from_bytes(&value.to_be_bytes())
    }

    pub fn is_negative(&self) -> bool {
        self.bit(255)
    }

    pub fn signed_div(&self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::zero();
        }
        let (a, b) = (self.signed(), rhs.signed());
        if a == I256::MIN && b == I256::from(-1) {
            return Self::from_signed(I256::MIN);
        }
        Self::from_signed(a / b)
    }

    pub fn signed_rem(&self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::zero();
        }
        let (a, b) = (self.signed(), rhs.signed());
        if b == I256::from(-1) {
            return Self::zero();
        }
        Self::from_signed(a % b)
    }

    pub fn signed_lt(&self, rhs: &Self) -> bool {
        self.signed() < rhs.signed()
    }

    pub fn signed_gt(&self, rhs: &Self) -> bool {
        self.signed() > rhs.signed()
    }

    /// Arithmetic shift right, filling with the sign bit.
    pub fn sar(&self, shift: &Self) -> Self {
        let negative = self.is_negative();
        match shift.to_usize() {
            Some(shift) if shift < 256 => Self::from_signed(self.signed() >> shift),
            _ if negative => Self::max(),
            _ => Self::zero(),
        }
    }

    /// Byte at `index` counting from the most significant end.
    pub fn byte(&self, index: &Self) -> Self {
        match index.to_usize() {
            Some(index) if index < 32 => Self::from(self.into_bytes()[index]),
            _ => Self::zero(),
        }
    }

    /// Extend the sign of the `(size + 1)`-byte wide value in the low bytes.
    pub fn sign_extend(&self, size: &Self) -> Self {
        match size.to_usize() {
            Some(size) if size < 31 => {
                let bit = size * 8 + 7;
                let mask = (Self::one() << (bit + 1)) - Self::one();
                if self.bit(bit) {
                    *self | !mask
                } else {
                    *self & mask
                }
            }
            _ => *self,
        }
    }
}

impl From<bool> for Word {
    fn from(value: bool) -> Self {
        if value { Self::one() } else { Self::zero() }
    }
}

impl From<u8> for Word {
    fn from(value: u8) -> Self {
        Self(primitive_types::U256::from(value))
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Self(primitive_types::U256::from(value))
    }
}

impl From<usize> for Word {
    fn from(value: usize) -> Self {
        Self(primitive_types::U256::from(value))
    }
}

impl std::ops::Sub<Word> for Word {
    type Output = Word;

    fn sub(self, rhs: Word) -> Self::Output {
        Word(self.0 - rhs.0)
    }
}

impl std::ops::Add<Word> for Word {
    type Output = Word;

    fn add(self, rhs: Word) -> Self::Output {
        Word(self.0 + rhs.0)
    }
}

impl std::ops::Div<Word> for Word {
    type Output = Word;

    fn div(self, rhs: Word) -> Self::Output {
        Word(self.0 / rhs.0)
    }
}

impl std::ops::Rem<Word> for Word {
    type Output = Word;

    fn rem(self, rhs: Word) -> Self::Output {
        Word(self.0 % rhs.0)
    }
}

impl BitAnd for Word {
    type Output = Word;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for Word {
    type Output = Word;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitXor for Word {
    type Output = Word;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl std::ops::Not for Word {
    type Output = Word;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl Shl<usize> for Word {
    type Output = Word;

    fn shl(self, rhs: usize) -> Self::Output {
        if rhs >= 256 {
            return Self::zero();
        }
        Self(self.0 << rhs)
    }
}

impl Shr<usize> for Word {
    type Output = Word;

    fn shr(self, rhs: usize) -> Self::Output {
        if rhs >= 256 {
            return Self::zero();
        }
        Self(self.0 >> rhs)
    }
}

impl Serialize for Word {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:#x}", self.0))
    }
}

/// Extract the message of an `Error(string)` revert payload.
pub fn decode_error_string(ret: &[u8]) -> Option<String> {
    if ret.len() < 4 + 32 + 32 {
        return None;
    }
    let offset = Word::from_bytes(&ret[4..4 + 32]).to_usize()?;
    let start = offset.checked_add(4)?.checked_add(32)?;
    let size = Word::from_bytes(ret.get(start - 32..start)?).to_usize()?;
    let data = ret.get(start..start.checked_add(size)?)?;
    String::from_utf8(data.to_vec()).ok()
}
