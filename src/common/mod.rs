use serde::{Serialize, Serializer};

pub mod account;
pub mod address;
pub mod error;
pub mod hash;
pub mod message;
pub mod word;

pub use word::Word;

/// Decode hex text into bytes, accepting an optional `0x`/`0X` prefix.
///
/// Empty input (or a bare prefix) decodes to an empty vector.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, error::Error> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits).map_err(|e| {
        let preview: String = text.chars().take(16).collect();
        error::Error::MalformedHex(format!("{e} (input: '{preview}')"))
    })
}

/// Lowercase hex without prefix.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Hex(Vec<u8>);

impl Hex {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Hex {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Hex {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Hex {
    fn from(value: [u8; N]) -> Self {
        Self(value.to_vec())
    }
}

impl std::fmt::Debug for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = hex::encode(&self.0);
        f.write_str(&hex)
    }
}

impl std::fmt::Display for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = hex::encode(&self.0);
        f.write_str(&hex)
    }
}

impl Serialize for Hex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex = format!("0x{}", hex::encode(&self.0));
        serializer.serialize_str(&hex)
    }
}

/// Compile-time hex decoding into a fixed-size, left-padded array.
const fn decode<const N: usize>(s: &str) -> [u8; N] {
    let s = s.as_bytes();
    let mut b = [0u8; N];
    let mut n = s.len();
    let parity = s.len() % 2;

    if s.is_empty() {
        return b;
    }
    let min = if s[0] == b'0' && s.len() > 1 && s[1] == b'x' {
        2
    } else {
        0
    };

    let mut i = N;
    while n > min {
        let c = s[n - 1];
        let c = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => panic!("Invalid hex"),
        };

        if n % 2 == parity {
            b[i - 1] = c;
        } else {
            b[i - 1] += c << 4;
            i -= 1;
        }

        n -= 1;
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(
            decode("123456789abcdef"),
            [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]
        );
        assert_eq!(
            decode("0x0123456789abcdef"),
            [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]
        );
        assert_eq!(decode::<4>("0xff"), [0, 0, 0, 0xff]);
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("0x600035").unwrap(), vec![0x60, 0x00, 0x35]);
        assert_eq!(decode_hex("0XABcd").unwrap(), vec![0xab, 0xcd]);
        assert_eq!(decode_hex("abcd").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_decode_hex_empty() {
        assert!(decode_hex("").unwrap().is_empty());
        assert!(decode_hex("0x").unwrap().is_empty());
    }

    #[test]
    fn test_decode_hex_malformed() {
        assert!(matches!(
            decode_hex("0x123"),
            Err(error::Error::MalformedHex(_))
        ));
        assert!(matches!(
            decode_hex("zz"),
            Err(error::Error::MalformedHex(_))
        ));
        assert!(matches!(
            decode_hex("0x0x00"),
            Err(error::Error::MalformedHex(_))
        ));
    }

    #[test]
    fn test_hex_normalized() {
        for s in ["0xDEADbeef", "deadBEEF", "0X00ff"] {
            let normalized = s
                .trim_start_matches("0x")
                .trim_start_matches("0X")
                .to_ascii_lowercase();
            assert_eq!(encode_hex(&decode_hex(s).unwrap()), normalized, "{s}");
        }
    }
}
