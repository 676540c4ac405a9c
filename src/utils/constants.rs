//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// CKB CAPACITY CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Shannons per CKB (1 CKB = 100,000,000 shannons)
pub const CKB_UNIT: u64 = 100_000_000;

/// Width of the `capacity` field of a cell
pub const CELL_CAPACITY_SIZE: usize = 8;

/// `code_hash` (32) + `hash_type` (1) of a script
pub const SCRIPT_FIXED_SIZE: usize = 33;

/// xUDT amount stored as a little-endian u128
pub const UDT_CELL_DATA_SIZE: usize = 16;

/// Type args assumed for an xUDT cell when the type script is not known yet
pub const DEFAULT_TYPE_ARGS_SIZE: usize = 32;

/// Args width of the unique type script used by token info cells
pub const UNIQUE_TYPE_ARGS_SIZE: usize = 20;

/// Full size of a unique type script
pub const UNIQUE_TYPE_SIZE: usize = SCRIPT_FIXED_SIZE + UNIQUE_TYPE_ARGS_SIZE;

/// Args width of spore and cluster type scripts
pub const SPORE_TYPE_ARGS_SIZE: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// RGB++ CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// RGB++ lock args: u32 out index + 32-byte BTC txid
pub const RGBPP_LOCK_ARGS_SIZE: usize = 36;

/// Full size of an RGB++ lock script
pub const RGBPP_LOCK_SIZE: usize = SCRIPT_FIXED_SIZE + RGBPP_LOCK_ARGS_SIZE;

/// Extra bytes a cell grows by when its RGB++ lock becomes a BTC time lock
pub const BTC_TIME_CELL_INCREASED_SIZE: usize = 95;

/// BTC txid used in output lock args until the real BTC transaction is known
pub const RGBPP_TX_ID_PLACEHOLDER: [u8; 32] = [0u8; 32];

/// Output 0 of an RGB++ BTC transaction carries the commitment
pub const RGBPP_COMMITMENT_OUTPUT_INDEX: u32 = 0;

/// Witness of an RGB++ lock input before the unlock witness is known
pub const RGBPP_WITNESS_PLACEHOLDER: [u8; 1] = [0xff];

/// Tag hashed in front of every commitment
pub const RGBPP_COMMITMENT_TAG: &[u8] = b"RGB++";

/// Commitment format version
pub const RGBPP_COMMITMENT_VERSION: [u8; 2] = [0, 0];

/// RGBPPUnlock witness version
pub const RGBPP_UNLOCK_VERSION: u16 = 0;

/// Commitment covers at most this many inputs and outputs
pub const RGBPP_MAX_COMMITTED_CELLS: usize = 255;

/// Confirmations before a BTC time cell can be unlocked on CKB
pub const BTC_TIME_LOCK_CONFIRMATIONS: u32 = 6;

// ═══════════════════════════════════════════════════════════════════════════════
// FEE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a secp256k1 recoverable signature
pub const SECP256K1_WITNESS_LOCK_SIZE: usize = 65;

/// Default CKB fee rate in shannons per 1000 bytes
pub const DEFAULT_CKB_FEE_RATE: u64 = 1_100;

/// Minimum CKB fee rate accepted by nodes, shannons per 1000 bytes
pub const MIN_CKB_FEE_RATE: u64 = 1_000;

/// Fee budget reserved before the real transaction size is known (0.2 CKB)
pub const INITIAL_FEE_BUDGET: u64 = 20_000_000;

/// Serialized size overhead of a transaction inside a block
pub const TX_BLOCK_OVERHEAD: usize = 4;

// ═══════════════════════════════════════════════════════════════════════════════
// BITCOIN CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum dust limit in satoshis
pub const DUST_LIMIT_SATS: u64 = 546;

/// Value of an output that carries RGB++ assets
pub const RGBPP_UTXO_DUST: u64 = 546;

/// Default BTC fee rate in sat/vB
pub const DEFAULT_BTC_FEE_RATE: u64 = 10;
