// ABI encoding and hashing helpers
//
// Only the subset of the Solidity ABI that rule literals and tracker
// defaults need: static words, and the single-value `abi.encode` layout of
// a dynamic string or bytes value (offset word, length word, data padded to
// a multiple of 32 bytes).

use primitive_types::U256;
use tiny_keccak::{Hasher, Keccak};

use crate::rule_compiler::lexer::{decode_hex, encode_hex};

pub const WORD_SIZE: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

/// First four bytes of the keccak256 of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_uint(value: &U256) -> Vec<u8> {
    let mut word = [0u8; WORD_SIZE];
    value.to_big_endian(&mut word);
    word.to_vec()
}

pub fn encode_bool(value: bool) -> Vec<u8> {
    encode_uint(&U256::from(value as u8))
}

/// The 20 low-order bytes of an address value
pub fn address_bytes(value: &U256) -> Vec<u8> {
    let word = encode_uint(value);
    word[WORD_SIZE - 20..].to_vec()
}

/// `abi.encode` of a single string or bytes value
pub fn encode_dynamic(data: &[u8]) -> Vec<u8> {
    let mut encoded = encode_uint(&U256::from(WORD_SIZE));
    encoded.extend(dynamic_tail(data));
    encoded
}

/// `abi.encode` of an array of static values, each already a 32-byte word
pub fn encode_static_array(words: &[Vec<u8>]) -> Vec<u8> {
    let mut encoded = encode_uint(&U256::from(WORD_SIZE));
    encoded.extend(encode_uint(&U256::from(words.len())));
    for word in words {
        encoded.extend_from_slice(word);
    }
    encoded
}

/// `abi.encode` of an array of strings or byte strings
pub fn encode_dynamic_array(items: &[Vec<u8>]) -> Vec<u8> {
    let tails: Vec<Vec<u8>> = items.iter().map(|item| dynamic_tail(item)).collect();

    let mut encoded = encode_uint(&U256::from(WORD_SIZE));
    encoded.extend(encode_uint(&U256::from(items.len())));

    // element offsets are relative to the first offset word
    let mut offset = items.len() * WORD_SIZE;
    for tail in &tails {
        encoded.extend(encode_uint(&U256::from(offset)));
        offset += tail.len();
    }
    for tail in tails {
        encoded.extend(tail);
    }
    encoded
}

/// Length word followed by the data padded to a multiple of 32 bytes
fn dynamic_tail(data: &[u8]) -> Vec<u8> {
    let padded_len = data.len().div_ceil(WORD_SIZE) * WORD_SIZE;
    let mut tail = encode_uint(&U256::from(data.len()));
    tail.extend_from_slice(data);
    tail.resize(WORD_SIZE + padded_len, 0);
    tail
}

/// Numeric stand-in for a string or bytes literal in an instruction set:
/// keccak256 of its ABI encoding.
pub fn literal_hash(data: &[u8]) -> U256 {
    U256::from_big_endian(&keccak256(&encode_dynamic(data)))
}

/// Serde helpers writing U256 values as `0x` hex strings
pub mod u256_hex {
    use primitive_types::U256;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(val: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{:x}", val))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let hex_str = String::deserialize(d)?;
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(&hex_str);
        U256::from_str_radix(hex_str, 16).map_err(serde::de::Error::custom)
    }
}

pub mod u256_hex_vec {
    use primitive_types::U256;
    use serde::ser::SerializeSeq;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[U256], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&format!("0x{:x}", value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<U256>, D::Error> {
        let strings = Vec::<String>::deserialize(d)?;
        strings
            .iter()
            .map(|hex_str| {
                let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
                U256::from_str_radix(hex_str, 16).map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

/// Serde helpers writing byte strings as `0x` hex
pub mod bytes_hex {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let hex_str = String::deserialize(d)?;
        let digits = hex_str.strip_prefix("0x").unwrap_or(&hex_str);
        super::decode_hex(digits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hex string '{}'", hex_str)))
    }
}

pub mod bytes_hex_vec {
    use serde::ser::SerializeSeq;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for bytes in values {
            seq.serialize_element(&super::encode_hex(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(d)?;
        strings
            .iter()
            .map(|hex_str| {
                let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
                super::decode_hex(digits).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid hex string '{}'", hex_str))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_of_empty_input() {
        assert_eq!(
            encode_hex(&keccak256(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_transfer_selector() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_dynamic_encoding_layout() {
        let encoded = encode_dynamic(b"open");
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 0x20);
        assert_eq!(encoded[63], 4);
        assert_eq!(&encoded[64..68], b"open");
        assert!(encoded[68..].iter().all(|byte| *byte == 0));

        assert_eq!(encode_dynamic(b"").len(), 64);
        assert_eq!(encode_dynamic(&[7u8; 33]).len(), 128);
    }

    #[test]
    fn test_array_layouts() {
        let words = vec![encode_uint(&U256::from(1)), encode_uint(&U256::from(2))];
        let encoded = encode_static_array(&words);
        assert_eq!(encoded.len(), 4 * WORD_SIZE);
        assert_eq!(encoded[63], 2);
        assert_eq!(encoded[127], 2);

        let encoded = encode_dynamic_array(&[b"ab".to_vec(), b"cde".to_vec()]);
        // offset, length, two element offsets, two (length, data) tails
        assert_eq!(encoded.len(), 8 * WORD_SIZE);
        assert_eq!(encoded[95], 0x40);
        assert_eq!(encoded[127], 0x80);
        assert_eq!(encoded[159], 2);
        assert_eq!(&encoded[160..162], b"ab");
        assert_eq!(encoded[223], 3);
        assert_eq!(&encoded[224..227], b"cde");
    }

    #[test]
    fn test_literal_hash_distinguishes_values() {
        assert_eq!(literal_hash(b"open"), literal_hash(b"open"));
        assert_ne!(literal_hash(b"open"), literal_hash(b"closed"));
        assert_eq!(
            literal_hash(b"open"),
            U256::from_big_endian(&keccak256(&encode_dynamic(b"open")))
        );
    }

    #[test]
    fn test_static_words() {
        assert_eq!(encode_bool(true)[31], 1);
        assert_eq!(encode_bool(false), vec![0u8; 32]);
        let address = U256::from_str_radix("1234567890123456789012345678901234567890", 16).unwrap();
        let bytes = address_bytes(&address);
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[0], 0x12);
        assert_eq!(bytes[19], 0x90);
    }
}
