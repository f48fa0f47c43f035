//! TRON address encoding.
//!
//! A TRON address is base58check over 21 bytes: the `0x41` network byte followed by
//! the last 20 bytes of keccak256(uncompressed public key without its `0x04` tag).

use crate::error::{Error, Result};
use sha3::{Digest, Keccak256};

pub const ADDRESS_PREFIX: u8 = 0x41;
pub const ADDRESS_LEN: usize = 34;

/// Cheap shape check used to recognise an address typed into the chat:
/// exactly 34 characters starting with `T`.
///
/// TRON-specific and deliberately loose (no alphabet or checksum check). Swap this
/// out per chain; use [`decode_address`] where a real address is required.
pub fn looks_like_address(text: &str) -> bool {
    text.starts_with('T') && text.chars().count() == ADDRESS_LEN
}

/// Decode and checksum-verify a base58 address into its 21 raw bytes.
pub fn decode_address(address: &str) -> Result<[u8; 21]> {
    let raw = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| Error::InvalidInput(format!("address {address}: {e}")))?;
    let bytes: [u8; 21] = raw
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("address {address}: wrong length")))?;
    if bytes[0] != ADDRESS_PREFIX {
        return Err(Error::InvalidInput(format!("address {address}: wrong network byte")));
    }
    Ok(bytes)
}

pub fn encode_address(raw: &[u8; 21]) -> String {
    bs58::encode(raw).with_check().into_string()
}

/// Address for an uncompressed SEC1 public key (65 bytes, `0x04` tag).
pub fn address_from_public_key(uncompressed: &[u8]) -> Result<String> {
    if uncompressed.len() != 65 || uncompressed[0] != 0x04 {
        return Err(Error::Key("expected 65-byte uncompressed public key".into()));
    }
    let hash = Keccak256::digest(&uncompressed[1..]);
    let mut raw = [0u8; 21];
    raw[0] = ADDRESS_PREFIX;
    raw[1..].copy_from_slice(&hash[12..]);
    Ok(encode_address(&raw))
}

/// Left-padded 32-byte ABI word for an address argument.
pub fn abi_address_word(address: &str) -> Result<[u8; 32]> {
    let raw = decode_address(address)?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&raw[1..]);
    Ok(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mainnet USDT contract
    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    #[test]
    fn test_shape_check() {
        assert!(looks_like_address(USDT));
        assert!(!looks_like_address("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6"));
        assert!(!looks_like_address("XR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"));
        assert!(!looks_like_address(""));
    }

    #[test]
    fn test_decode_known_address() {
        let raw = decode_address(USDT).unwrap();
        assert_eq!(raw[0], ADDRESS_PREFIX);
        assert_eq!(encode_address(&raw), USDT);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // Same shape, last character changed
        assert!(decode_address("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6u").is_err());
    }

    #[test]
    fn test_abi_word_is_left_padded() {
        let word = abi_address_word(USDT).unwrap();
        assert!(word[..12].iter().all(|b| *b == 0));
        assert_eq!(&word[12..], &decode_address(USDT).unwrap()[1..]);
    }
}
