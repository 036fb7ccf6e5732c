//! Intent and transaction digests.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

type Blake2b256 = Blake2b<U32>;

/// Intent prefix for transaction data.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];
/// Intent prefix for personal messages.
const PERSONAL_MESSAGE_INTENT: [u8; 3] = [3, 0, 0];

const TRANSACTION_DIGEST_SALT: &[u8] = b"TransactionData::";

pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Digest a wallet signs for a personal message.
///
/// The message is length-prefixed (ULEB128) behind the personal message
/// intent before hashing.
pub fn personal_message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(PERSONAL_MESSAGE_INTENT);
    hasher.update(uleb128(message.len()));
    hasher.update(message);
    hasher.finalize().into()
}

/// Digest a wallet signs for transaction bytes.
pub fn transaction_intent_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_INTENT);
    hasher.update(tx_bytes);
    hasher.finalize().into()
}

/// Ledger digest of built transaction bytes, base58 encoded.
pub fn transaction_digest(tx_bytes: &[u8]) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_DIGEST_SALT);
    hasher.update(tx_bytes);
    let hash: [u8; 32] = hasher.finalize().into();
    bs58::encode(hash).into_string()
}

fn uleb128(mut value: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}
