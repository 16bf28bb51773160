//! Key encoding utilities for `RocksDB`.
//!
//! Account keys are the 16 UUID bytes. Conversion and transaction keys are the
//! 16 ULID bytes, which sort by creation time. Per-account index keys are
//! `account_id || ulid`, so a prefix scan walks one account's records in
//! chronological order.

use artesia_core::{AccountId, ConversionId, TransactionId};

/// Length of an index key: account UUID followed by a ULID.
pub const INDEX_KEY_LEN: usize = 32;

/// Create an account key from an account ID.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a conversion key from a conversion ID.
#[must_use]
pub fn conversion_key(conversion_id: &ConversionId) -> Vec<u8> {
    conversion_id.to_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a per-account index key.
///
/// Format: `account_id (16 bytes) || ulid (16 bytes)`
#[must_use]
pub fn account_index_key(account_id: &AccountId, ulid_bytes: [u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(INDEX_KEY_LEN);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&ulid_bytes);
    key
}

/// Create a prefix for iterating an account's index entries.
#[must_use]
pub fn account_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the ULID half of a per-account index key.
///
/// Returns `None` if the key is not exactly 32 bytes.
#[must_use]
pub fn index_suffix(key: &[u8]) -> Option<[u8; 16]> {
    if key.len() != INDEX_KEY_LEN {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..]);
    Some(bytes)
}

/// Decode a 16-byte ULID key.
#[must_use]
pub fn ulid_key(key: &[u8]) -> Option<[u8; 16]> {
    key.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_key_length() {
        assert_eq!(account_key(&AccountId::generate()).len(), 16);
    }

    #[test]
    fn index_key_format() {
        let account_id = AccountId::generate();
        let conversion_id = ConversionId::generate();
        let key = account_index_key(&account_id, conversion_id.to_bytes());

        assert_eq!(key.len(), INDEX_KEY_LEN);
        assert!(key.starts_with(&account_prefix(&account_id)));
        assert_eq!(
            index_suffix(&key).map(ConversionId::from_bytes),
            Some(conversion_id)
        );
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(index_suffix(&[0u8; 31]).is_none());
        assert!(ulid_key(&[0u8; 15]).is_none());
        assert!(ulid_key(&[0u8; 16]).is_some());
    }
}
