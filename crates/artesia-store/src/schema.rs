//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Conversion records, keyed by `conversion_id` (ULID).
    pub const CONVERSIONS: &str = "conversions";

    /// Index: conversions by account, keyed by `account_id || conversion_id`.
    /// Value is empty (index only).
    pub const CONVERSIONS_BY_ACCOUNT: &str = "conversions_by_account";

    /// Index: conversions still in `Processing`, keyed by `conversion_id`.
    /// Value is empty (index only).
    pub const PROCESSING: &str = "processing";

    /// Credit transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by account, keyed by `account_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_ACCOUNT: &str = "transactions_by_account";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::CONVERSIONS,
        cf::CONVERSIONS_BY_ACCOUNT,
        cf::PROCESSING,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_ACCOUNT,
    ]
}
