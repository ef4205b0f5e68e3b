use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::{decode, hash::keccak256, word::Word};

#[derive(Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn zero() -> Self {
        Self([0u8; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| byte == &0)
    }

    /// Address of a contract deployed by this account with CREATE.
    pub fn create(&self, nonce: u64) -> Address {
        // https://www.evm.codes/?fork=cancun#f0
        // address = keccak256(rlp([sender_address,sender_nonce]))[12:]
        // Breakdown (nonce 1627):
        //   0xd8   = List prefix (0xc0 + 24 bytes total length)
        //   0x94   = Address prefix (0x80 + 20 bytes)
        //   5bc1c1942f2333acb9ce156525bc079fad983f13 = Factory address (20 bytes)
        //   0x82   = Nonce prefix (0x80 + 2 bytes)
        //   065b   = Nonce value 1627 in big-endian (2 bytes)
        let nonce_bytes = nonce
            .to_be_bytes()
            .into_iter()
            .skip_while(|byte| byte == &0)
            .collect::<Vec<_>>();

        let mut nonce_rlp = Vec::with_capacity(9);
        match nonce_bytes.as_slice() {
            [] => nonce_rlp.push(0x80u8),
            [byte] if *byte < 0x80 => nonce_rlp.push(*byte),
            bytes => {
                nonce_rlp.push(0x80u8 + bytes.len() as u8);
                nonce_rlp.extend_from_slice(bytes);
            }
        }

        let mut buffer = Vec::with_capacity(2 + 20 + nonce_rlp.len());
        buffer.push(0xc0u8 + (1 + self.0.len() + nonce_rlp.len()) as u8);
        buffer.push(0x80u8 + self.0.len() as u8);
        buffer.extend_from_slice(&self.0);
        buffer.extend_from_slice(&nonce_rlp);

        Self::from_hash(keccak256(&buffer))
    }

    /// Address of a contract deployed by this account with CREATE2.
    pub fn create2(&self, salt: &Word, init_code_hash: &[u8; 32]) -> Address {
        // https://www.evm.codes/?fork=cancun#f5
        // address = keccak256(0xff + sender_address + salt + keccak256(initialisation_code))[12:]
        let mut buffer = Vec::with_capacity(1 + 20 + 32 + 32);
        buffer.push(0xffu8);
        buffer.extend_from_slice(&self.0);
        buffer.extend_from_slice(&salt.into_bytes());
        buffer.extend_from_slice(init_code_hash);
        Self::from_hash(keccak256(&buffer))
    }

    fn from_hash(hash: [u8; 32]) -> Address {
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..32]);
        Address(addr)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl From<&Address> for Word {
    fn from(value: &Address) -> Self {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(&value.0);
        Word::from_bytes(&bytes)
    }
}

impl From<&Word> for Address {
    fn from(value: &Word) -> Self {
        let bytes: [u8; 32] = value.into_bytes();
        let mut ret = Address::default();
        ret.0[..].copy_from_slice(&bytes[12..]);
        ret
    }
}

impl From<[u8; 20]> for Address {
    fn from(value: [u8; 20]) -> Self {
        Self(value)
    }
}

impl TryFrom<&str> for Address {
    type Error = crate::common::error::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != 40 && value.len() != 42 {
            return Err(crate::common::error::Error::InvalidAddress);
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(value.trim_start_matches("0x"), &mut bytes)
            .map_err(|_| crate::common::error::Error::InvalidAddress)?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex = hex::encode(self.0);
        let hex = format!("0x{hex}");
        serializer.serialize_str(&hex)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let hex: String = Deserialize::deserialize(deserializer)?;
        Address::try_from(hex.as_str()).map_err(|_| {
            D::Error::invalid_value(serde::de::Unexpected::Str(&hex), &"Invalid address")
        })
    }
}

pub const fn addr(s: &str) -> Address {
    Address(decode(s))
}
