//! Error types for the RGB++ orchestration core.
//!
//! Every failure carries a stable kind (see [`Error::code`]) plus the values
//! that caused it, so callers can diagnose without parsing messages.

use thiserror::Error;

use crate::core::network::Chain;

/// Result type alias for RGB++ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the RGB++ core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Cell & UTXO Errors
    // ═══════════════════════════════════════════════════════════════════

    /// No spendable capacity cell for the given owner
    #[error("No live cell: {0}")]
    NoLiveCell(String),

    /// No asset cell whose type script matches the requested asset
    #[error("No matching asset cell for {asset}")]
    NoMatchingAssetCell {
        /// Asset identity (type script args, hex)
        asset: String,
    },

    /// Selected inputs cannot cover the required capacity
    #[error("Insufficient capacity: required {required}, available {available}")]
    InsufficientCapacity {
        /// Required capacity in shannons
        required: u64,
        /// Available capacity in shannons
        available: u64,
    },

    /// Change output cannot absorb the transaction fee
    #[error("Insufficient fee capacity: required {required}, available {available}")]
    InsufficientFee {
        /// Capacity the change output needs after the fee
        required: u64,
        /// Capacity left for the change output
        available: u64,
    },

    /// Asset cells do not hold enough tokens
    #[error("Insufficient asset amount: required {required}, available {available}")]
    InsufficientAssetAmount {
        /// Required token amount
        required: u128,
        /// Available token amount
        available: u128,
    },

    /// Bitcoin UTXOs cannot cover outputs plus fee
    #[error("Insufficient BTC balance: required {required} sats, available {available} sats")]
    InsufficientBtcBalance {
        /// Required satoshis
        required: u64,
        /// Available satoshis
        available: u64,
    },

    /// A transaction input references a cell that is no longer live
    #[error("Missing previous output cell {tx_hash}:{index}")]
    MissingPreviousOutputCell {
        /// Transaction hash of the out point
        tx_hash: String,
        /// Output index of the out point
        index: u32,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Codec Errors
    // ═══════════════════════════════════════════════════════════════════

    /// RGB++ lock args have the wrong width
    #[error("Malformed binding args: expected {expected} bytes, got {actual}")]
    MalformedBindingArgs {
        /// Expected byte width
        expected: usize,
        /// Actual byte width
        actual: usize,
    },

    /// Malformed molecule or hex input
    #[error("Invalid encoding of {what}: {reason}")]
    InvalidEncoding {
        /// Structure being decoded
        what: String,
        /// What was wrong
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Signing & Submission Errors
    // ═══════════════════════════════════════════════════════════════════

    /// The wallet failed to sign the PSBT
    #[error("PSBT signing failed: {0}")]
    PsbtSigningFailure(String),

    /// PSBT construction or finalization failed
    #[error("PSBT error: {0}")]
    Psbt(String),

    /// Signer changed fields other than witnesses
    #[error("Signer mutated transaction field: {0}")]
    SignerMutatedTransaction(String),

    /// The network rejected a transaction
    #[error("{chain} submission failed: {reason}")]
    NetworkSubmission {
        /// Chain the transaction was sent to
        chain: Chain,
        /// Underlying network error
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Collaborator Errors
    // ═══════════════════════════════════════════════════════════════════

    /// CKB cell collector failed
    #[error("Collector error: {0}")]
    Collector(String),

    /// Bitcoin data source failed
    #[error("BTC data source error: {0}")]
    DataSource(String),

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Configuration could not be read, parsed or validated
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`]
    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::InvalidEncoding`]
    pub fn encoding(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidEncoding {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying with more funds or later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NoLiveCell(_)
                | Error::InsufficientCapacity { .. }
                | Error::InsufficientFee { .. }
                | Error::InsufficientBtcBalance { .. }
                | Error::NetworkSubmission { .. }
                | Error::Collector(_)
                | Error::DataSource(_)
        )
    }

    /// Returns true for errors raised while assembling, before any broadcast
    pub fn is_build_error(&self) -> bool {
        (1000..4000).contains(&self.code())
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Cell & UTXO errors: 1xxx
            Error::NoLiveCell(_) => 1001,
            Error::NoMatchingAssetCell { .. } => 1002,
            Error::InsufficientCapacity { .. } => 1003,
            Error::InsufficientFee { .. } => 1004,
            Error::InsufficientAssetAmount { .. } => 1005,
            Error::InsufficientBtcBalance { .. } => 1006,
            Error::MissingPreviousOutputCell { .. } => 1007,

            // Codec errors: 2xxx
            Error::MalformedBindingArgs { .. } => 2001,
            Error::InvalidEncoding { .. } => 2002,

            // Validation errors: 3xxx
            Error::InvalidParameter { .. } => 3001,
            Error::ZeroAmount => 3002,
            Error::Overflow { .. } => 3003,
            Error::InvariantViolation(_) => 3004,

            // Signing & submission errors: 4xxx
            Error::PsbtSigningFailure(_) => 4001,
            Error::Psbt(_) => 4002,
            Error::SignerMutatedTransaction(_) => 4003,
            Error::NetworkSubmission { .. } => 4004,

            // Collaborator errors: 5xxx
            Error::Collector(_) => 5001,
            Error::DataSource(_) => 5002,

            // Configuration errors: 6xxx
            Error::Config(_) => 6001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::NoLiveCell("".into()).code(),
            Error::NoMatchingAssetCell { asset: "".into() }.code(),
            Error::InsufficientCapacity { required: 0, available: 0 }.code(),
            Error::InsufficientFee { required: 0, available: 0 }.code(),
            Error::MalformedBindingArgs { expected: 36, actual: 0 }.code(),
            Error::MissingPreviousOutputCell { tx_hash: "".into(), index: 0 }.code(),
            Error::NetworkSubmission { chain: Chain::Ckb, reason: "".into() }.code(),
            Error::PsbtSigningFailure("".into()).code(),
            Error::Config("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientCapacity {
            required: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));

        let err = Error::NetworkSubmission {
            chain: Chain::Bitcoin,
            reason: "txn-mempool-conflict".into(),
        };
        assert_eq!(err.to_string(), "BTC submission failed: txn-mempool-conflict");
    }

    #[test]
    fn test_build_errors_fail_fast() {
        assert!(Error::MalformedBindingArgs { expected: 36, actual: 10 }.is_build_error());
        assert!(Error::NoLiveCell("x".into()).is_build_error());
        assert!(!Error::NetworkSubmission { chain: Chain::Ckb, reason: "x".into() }.is_build_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::InsufficientCapacity { required: 0, available: 0 }.is_recoverable());
        assert!(!Error::InvariantViolation("test".into()).is_recoverable());
    }
}
