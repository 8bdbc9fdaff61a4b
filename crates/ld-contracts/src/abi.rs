//! Minimal Solidity ABI codec for the lottery contracts.
//!
//! Every function the front-end calls takes and returns only static types, so calls are
//! a selector followed by 32-byte words and results are read word by word.

use alloy_primitives::{Address, U256, keccak256};
use thiserror::Error;

pub const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("return data too short: need {needed} bytes, got {actual}")]
    ShortData { needed: usize, actual: usize },
    #[error("word {index} does not fit in 64 bits")]
    Overflow { index: usize },
    #[error("word {index} is not a valid bool")]
    InvalidBool { index: usize },
    #[error("word {index} is not a valid address")]
    InvalidAddress { index: usize },
}

/// First 4 bytes of keccak256 of the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

pub fn encode_call(signature: &str, args: &[U256]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_be_bytes::<32>());
    }
    data
}

fn word(data: &[u8], index: usize) -> Result<&[u8], AbiError> {
    let start = index * WORD;
    let end = start + WORD;
    if data.len() < end {
        return Err(AbiError::ShortData {
            needed: end,
            actual: data.len(),
        });
    }
    Ok(&data[start..end])
}

pub fn decode_uint(data: &[u8], index: usize) -> Result<U256, AbiError> {
    Ok(U256::from_be_slice(word(data, index)?))
}

pub fn decode_u64(data: &[u8], index: usize) -> Result<u64, AbiError> {
    let bytes = word(data, index)?;
    if bytes[..24].iter().any(|byte| *byte != 0) {
        return Err(AbiError::Overflow { index });
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&bytes[24..]);
    Ok(u64::from_be_bytes(low))
}

pub fn decode_bool(data: &[u8], index: usize) -> Result<bool, AbiError> {
    let bytes = word(data, index)?;
    if bytes[..31].iter().any(|byte| *byte != 0) {
        return Err(AbiError::InvalidBool { index });
    }
    match bytes[31] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(AbiError::InvalidBool { index }),
    }
}

pub fn decode_address(data: &[u8], index: usize) -> Result<Address, AbiError> {
    let bytes = word(data, index)?;
    if bytes[..12].iter().any(|byte| *byte != 0) {
        return Err(AbiError::InvalidAddress { index });
    }
    Ok(Address::from_slice(&bytes[12..]))
}
