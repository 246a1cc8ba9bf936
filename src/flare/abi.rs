//! Minimal Solidity ABI helpers for the handful of Flare calls we make.

use sha3::{Digest, Keccak256};

use crate::error::FlareError;

pub const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// 4-byte function selector for a canonical signature such as `foo(bytes21)`
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// UTF-8 string right-padded with zeros into a `bytes32`, as `0x` hex
pub fn bytes32_hex(text: &str) -> String {
    let mut word = [0u8; WORD];
    let bytes = text.as_bytes();
    let len = bytes.len().min(WORD);
    word[..len].copy_from_slice(&bytes[..len]);
    format!("0x{}", hex::encode(word))
}

pub fn decode_hex(data: &str) -> Result<Vec<u8>, FlareError> {
    hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| FlareError::Abi(format!("invalid hex '{}': {}", data, e)))
}

/// Call data for a function taking a single fixed-size `bytesN` (N <= 32)
pub fn encode_fixed_bytes_call(signature: &str, value: &[u8]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    let mut word = [0u8; WORD];
    let len = value.len().min(WORD);
    word[..len].copy_from_slice(&value[..len]);
    data.extend_from_slice(&word);
    data
}

/// Call data for a function taking a single dynamic `bytes` or `string`
pub fn encode_dynamic_call(signature: &str, value: &[u8]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&uint_word(WORD as u128));
    data.extend_from_slice(&uint_word(value.len() as u128));
    data.extend_from_slice(value);
    let padding = (WORD - value.len() % WORD) % WORD;
    data.extend(std::iter::repeat(0u8).take(padding));
    data
}

pub fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], FlareError> {
    data.get(index * WORD..(index + 1) * WORD).ok_or_else(|| {
        FlareError::Abi(format!(
            "return data too short: {} bytes, wanted word {}",
            data.len(),
            index
        ))
    })
}

/// Unsigned integer return value that fits in 128 bits
pub fn decode_uint(data: &[u8], index: usize) -> Result<u128, FlareError> {
    let word = word_at(data, index)?;
    if word[..16].iter().any(|byte| *byte != 0) {
        return Err(FlareError::Abi(
            "uint return value exceeds 128 bits".to_string(),
        ));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// `address` return value as a checksum-free `0x` hex string
pub fn decode_address(data: &[u8], index: usize) -> Result<String, FlareError> {
    let word = word_at(data, index)?;
    Ok(format!("0x{}", hex::encode(&word[12..])))
}
