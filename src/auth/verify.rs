//! secp256k1 signature recovery for `personal_sign` messages.

use super::{Address, AuthError};
use crate::integrity::digest::keccak256;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

/// Prefix wallets prepend before hashing a `personal_sign` message.
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Hash a message the way `personal_sign` does:
/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(message.len().to_string().as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Derive the account address of a public key: the last 20 bytes of the
/// keccak256 of its uncompressed encoding, without the 0x04 tag.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(&bytes)
}

/// Decode a 65-byte `r || s || v` signature.
///
/// Accepts an optional `0x` prefix and `v` in {0, 1, 27, 28}. High-s
/// signatures are normalized with the recovery id flipped to match.
fn decode_signature(signature_hex: &str) -> Result<(Signature, RecoveryId), AuthError> {
    let trimmed = signature_hex.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let bytes = hex::decode(hex_part)
        .map_err(|e| AuthError::MalformedSignature(format!("Invalid hex: {}", e)))?;

    if bytes.len() != 65 {
        return Err(AuthError::MalformedSignature(format!(
            "Invalid signature length: expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        other => {
            return Err(AuthError::MalformedSignature(format!(
                "Invalid recovery byte: {}",
                other
            )))
        }
    };

    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| AuthError::MalformedSignature(format!("Invalid r/s: {}", e)))?;
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| AuthError::MalformedSignature("Invalid recovery id".to_string()))?;

    match signature.normalize_s() {
        Some(low_s) => {
            let flipped = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
            Ok((low_s, flipped))
        }
        None => Ok((signature, recovery_id)),
    }
}

/// Recover the address that signed `message` with `personal_sign`.
pub fn recover_address(message: &[u8], signature_hex: &str) -> Result<Address, AuthError> {
    let (signature, recovery_id) = decode_signature(signature_hex)?;
    let hash = personal_message_hash(message);

    let key = VerifyingKey::recover_from_prehash(&hash, &signature, recovery_id)
        .map_err(|_| AuthError::SignatureInvalid)?;
    Ok(address_of(&key))
}

/// Verify that `signature_hex` over `message` was produced by `claimed`.
///
/// # Returns
/// * `Ok(true)` if the recovered signer equals the claimed address
/// * `Ok(false)` if recovery fails or yields another address
/// * `Err(AuthError::MalformedSignature)` if the signature cannot be decoded
pub fn verify_signature(
    message: &[u8],
    signature_hex: &str,
    claimed: &Address,
) -> Result<bool, AuthError> {
    match recover_address(message, signature_hex) {
        Ok(recovered) => Ok(&recovered == claimed),
        Err(AuthError::SignatureInvalid) => Ok(false),
        Err(e) => Err(e),
    }
}
