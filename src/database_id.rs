//! Database ID type definitions.

/// Alias for the integer type used for mapping to account IDs.
pub type AccountId = i64;
/// Alias for the integer type used for mapping to ledger entry IDs.
pub type EntryId = i64;
/// Alias for the integer type used for mapping to transfer IDs.
pub type TransferId = i64;
