//! Cell capacity requirements.
//!
//! A CKB cell must hold at least as many CKB as the bytes it occupies. The
//! per-kind formulas below add one spare CKB on top so that freshly built
//! cells never sit exactly at the limit.

use crate::ckb::types::{CellOutput, Script};
use crate::codec::spore::{ClusterData, SporeData};
use crate::codec::token_info::TokenInfo;
use crate::utils::constants::*;

/// Cell shapes with a fixed capacity formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// xUDT cell under an ordinary lock
    Udt {
        /// Lock args width
        lock_args_size: usize,
        /// Type args width
        type_args_size: usize,
    },
    /// xUDT cell under an RGB++ lock, sized to survive becoming a BTC time cell
    RgbppUdt {
        /// Type args width
        type_args_size: usize,
    },
    /// Token info cell guarded by a unique type
    TokenInfo {
        /// Lock args width
        lock_args_size: usize,
        /// Encoded token info length
        info_len: usize,
    },
    /// Cluster cell under an RGB++ lock
    Cluster {
        /// Encoded cluster data length
        data_len: usize,
    },
    /// Spore cell under an RGB++ lock
    Spore {
        /// Encoded spore data length
        data_len: usize,
    },
}

/// Minimum capacity, in shannons, of a cell of `kind`
pub fn cell_capacity(kind: CellKind) -> u64 {
    let size = match kind {
        CellKind::Udt {
            lock_args_size,
            type_args_size,
        } => {
            SCRIPT_FIXED_SIZE
                + lock_args_size
                + SCRIPT_FIXED_SIZE
                + type_args_size
                + CELL_CAPACITY_SIZE
                + UDT_CELL_DATA_SIZE
        }
        CellKind::RgbppUdt { type_args_size } => {
            RGBPP_LOCK_SIZE
                + SCRIPT_FIXED_SIZE
                + type_args_size
                + CELL_CAPACITY_SIZE
                + UDT_CELL_DATA_SIZE
                + BTC_TIME_CELL_INCREASED_SIZE
        }
        CellKind::TokenInfo {
            lock_args_size,
            info_len,
        } => SCRIPT_FIXED_SIZE + lock_args_size + UNIQUE_TYPE_SIZE + CELL_CAPACITY_SIZE + info_len,
        CellKind::Cluster { data_len } => {
            RGBPP_LOCK_SIZE + SCRIPT_FIXED_SIZE + SPORE_TYPE_ARGS_SIZE + CELL_CAPACITY_SIZE + data_len
        }
        CellKind::Spore { data_len } => {
            RGBPP_LOCK_SIZE
                + SCRIPT_FIXED_SIZE
                + SPORE_TYPE_ARGS_SIZE
                + CELL_CAPACITY_SIZE
                + data_len
                + BTC_TIME_CELL_INCREASED_SIZE
        }
    };
    (size as u64 + 1) * CKB_UNIT
}

/// Capacity of an xUDT cell owned by `lock`; `type_script` defaults to 32-byte args
pub fn udt_cell_capacity(lock: &Script, type_script: Option<&Script>) -> u64 {
    cell_capacity(CellKind::Udt {
        lock_args_size: lock.args.len(),
        type_args_size: type_script.map_or(DEFAULT_TYPE_ARGS_SIZE, |t| t.args.len()),
    })
}

/// Capacity of an xUDT cell under an RGB++ lock
pub fn rgbpp_udt_cell_capacity(type_script: Option<&Script>) -> u64 {
    cell_capacity(CellKind::RgbppUdt {
        type_args_size: type_script.map_or(DEFAULT_TYPE_ARGS_SIZE, |t| t.args.len()),
    })
}

/// Capacity of a token info cell owned by `lock`
pub fn token_info_cell_capacity(lock: &Script, info: &TokenInfo) -> u64 {
    cell_capacity(CellKind::TokenInfo {
        lock_args_size: lock.args.len(),
        info_len: info.encoded_len(),
    })
}

/// Capacity of a cluster cell
pub fn cluster_cell_capacity(data: &ClusterData) -> u64 {
    cell_capacity(CellKind::Cluster {
        data_len: data.encode().len(),
    })
}

/// Capacity of a spore cell
pub fn spore_cell_capacity(data: &SporeData) -> u64 {
    cell_capacity(CellKind::Spore {
        data_len: data.encode().len(),
    })
}

/// Exact occupied capacity of an arbitrary output, without the spare CKB
pub fn occupied_capacity(output: &CellOutput, data: &[u8]) -> u64 {
    output.occupied_capacity(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckb::types::HashType;
    use crate::codec::hash::H256;

    fn secp_lock() -> Script {
        Script::new(H256([1; 32]), HashType::Type, vec![0; 20])
    }

    #[test]
    fn test_udt_cell_capacity() {
        // 33 + 20 + 33 + 32 + 8 + 16 = 142, plus one spare CKB
        assert_eq!(udt_cell_capacity(&secp_lock(), None), 143 * CKB_UNIT);
    }

    #[test]
    fn test_rgbpp_udt_cell_capacity() {
        // 69 + 65 + 8 + 16 + 95 = 253, plus one spare CKB
        assert_eq!(rgbpp_udt_cell_capacity(None), 254 * CKB_UNIT);
    }

    #[test]
    fn test_token_info_cell_capacity() {
        let info = TokenInfo::new(8, "XUDT Test Token", "XTT");
        // (20 + 33) + 53 + 8 + (3 + 15 + 3), plus one spare CKB
        assert_eq!(token_info_cell_capacity(&secp_lock(), &info), 136 * CKB_UNIT);
    }

    #[test]
    fn test_spore_exceeds_cluster_by_time_lock_growth() {
        let spore = cell_capacity(CellKind::Spore { data_len: 10 });
        let cluster = cell_capacity(CellKind::Cluster { data_len: 10 });
        assert_eq!(spore - cluster, 95 * CKB_UNIT);
    }

    #[test]
    fn test_formula_covers_occupied_capacity() {
        let xudt = Script::new(H256([2; 32]), HashType::Type, vec![0; 32]);
        let output = CellOutput::new(0, secp_lock(), Some(xudt.clone()));
        let required = udt_cell_capacity(&secp_lock(), Some(&xudt));
        assert_eq!(required, occupied_capacity(&output, &[0u8; 16]) + CKB_UNIT);
    }
}
