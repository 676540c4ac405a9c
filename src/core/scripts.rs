//! Deployed script registry.
//!
//! Resolves code hashes and cell deps for every script the core attaches,
//! per CKB network and, on testnet, per Bitcoin test network.

use crate::ckb::types::{CellDep, DepType, HashType, OutPoint, Script};
use crate::codec::hash::H256;
use crate::codec::rgbpp::{BtcTimeLockArgs, RgbppLockArgs};
use crate::core::network::{BtcTestnetType, Network};

/// Scripts with a known deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// secp256k1-blake160 sighash-all lock
    Secp256k1,
    /// Extensible UDT type
    Xudt,
    /// Unique type, guards token info cells
    UniqueType,
    /// RGB++ lock
    RgbppLock,
    /// BTC time lock
    BtcTimeLock,
    /// Spore type
    Spore,
    /// Cluster type
    Cluster,
}

/// Where a script's code lives on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Code hash scripts reference
    pub code_hash: H256,
    /// How the code hash is matched
    pub hash_type: HashType,
    /// Cell deps a transaction needs to run the script
    pub cell_deps: Vec<CellDep>,
}

const fn nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => panic!("invalid hex digit"),
    }
}

const fn h256(s: &str) -> H256 {
    let bytes = s.as_bytes();
    assert!(bytes.len() == 66, "expected 0x followed by 64 hex digits");
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[i] = (nibble(bytes[2 + 2 * i]) << 4) | nibble(bytes[3 + 2 * i]);
        i += 1;
    }
    H256(out)
}

struct Entry {
    code_hash: H256,
    hash_type: HashType,
    dep_tx: H256,
    dep_indices: &'static [u32],
    dep_type: DepType,
}

const SECP256K1_CODE_HASH: H256 =
    h256("0x9bd7e06f3ecf4be0f2fcd2188b23f1b9fcc88e5d4b65a8637b17723bbda3cce8");

mod mainnet {
    use super::*;

    pub(super) const SECP256K1: Entry = Entry {
        code_hash: SECP256K1_CODE_HASH,
        hash_type: HashType::Type,
        dep_tx: h256("0x71a7ba8fc96349fea0ed3a5c47992e3b4084b031a42264a018e0072e8172e46c"),
        dep_indices: &[0],
        dep_type: DepType::DepGroup,
    };
    pub(super) const XUDT: Entry = Entry {
        code_hash: h256("0x50bd8d6680b8b9cf98b73f3c08faf8b2a21914311954118ad6609be6e78a1b95"),
        hash_type: HashType::Type,
        dep_tx: h256("0xc07844ce21b38e4b071dd0e1ee3b0e27afd8d7532491327f39b786343f558ab7"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
    pub(super) const UNIQUE_TYPE: Entry = Entry {
        code_hash: h256("0x2c8c11c985da60b0a330c61a85507416d6382c130ba67f0c47ab071e00aec628"),
        hash_type: HashType::Type,
        dep_tx: h256("0x67524c01c0cb5492e499c7c7e406f2f9d823e162d6b0cf432eacde0c9808c2ad"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
    pub(super) const RGBPP_LOCK: Entry = Entry {
        code_hash: h256("0xbc6c568a1a0d0a09f6844dc9d74ddb4343c32143ff25f727c59edf4fb72d6936"),
        hash_type: HashType::Type,
        dep_tx: h256("0x04c5c3e69f1aa6ee27fb9de3d15a81704e387ab3b453965adbe0b6ca343c6f41"),
        dep_indices: &[0, 1],
        dep_type: DepType::Code,
    };
    pub(super) const BTC_TIME_LOCK: Entry = Entry {
        code_hash: h256("0x70d64497a075bd651e98ac030455ea200637ee325a12ad08aff03f1a117e5a62"),
        hash_type: HashType::Type,
        dep_tx: h256("0x6257bf4297ee75fcebe2654d8c5f8d93bc9fc1b3dc62b8cef54ffe166162e996"),
        dep_indices: &[0, 1],
        dep_type: DepType::Code,
    };
    pub(super) const SPORE: Entry = Entry {
        code_hash: h256("0x4a4dce1df3dffff7f8b2cd7dff7303df3b6150c9788cb75dcf6747247132b9f5"),
        hash_type: HashType::Data1,
        dep_tx: h256("0x96b198fb5ddbd1eed57ed667068f1f1e55d07907b4c0dbd38675a69ea1b69824"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
    pub(super) const CLUSTER: Entry = Entry {
        code_hash: h256("0x7366a61534fa7c7e6225ecc0d828ea3b5366adec2b58206f2ee84995fe030075"),
        hash_type: HashType::Data1,
        dep_tx: h256("0xe464b7fb9311c5e2820e61c99afc615d6b98bdefbe318c34868c010cbd0dc938"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
}

mod testnet {
    use super::*;

    pub(super) const SECP256K1: Entry = Entry {
        code_hash: SECP256K1_CODE_HASH,
        hash_type: HashType::Type,
        dep_tx: h256("0xf8de3bb47d055cdf460d93a2a6e1b05f7432f9777c8c474abf4eec1d4aee5d37"),
        dep_indices: &[0],
        dep_type: DepType::DepGroup,
    };
    pub(super) const XUDT: Entry = Entry {
        code_hash: h256("0x25c29dc317811a6f6f3985a7a9ebc4838bd388d19d0feeecf0bcd60f6c0975bb"),
        hash_type: HashType::Type,
        dep_tx: h256("0xbf6fb538763efec2a70a6a3dcb7242787087e1030c4e7d86585bc63a9d337f5f"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
    pub(super) const UNIQUE_TYPE: Entry = Entry {
        code_hash: h256("0x8e341bcfec6393dcd41e635733ff2dca00a6af546949f70c57a706c0f344df8b"),
        hash_type: HashType::Type,
        dep_tx: h256("0xff91b063c78ed06f10a1ed436122bd7d671f9a72ef5f5fa28d05252c17cf4cef"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
    pub(super) const RGBPP_LOCK: Entry = Entry {
        code_hash: h256("0x61ca7a4796a4eb19ca4f0d065cb9b10ddcf002f10f7cbb810c706cb6bb5c3248"),
        hash_type: HashType::Type,
        dep_tx: h256("0xf1de59e973b85791ec32debbba08dff80c63197e895eb95d67fc1e9f6b413e00"),
        dep_indices: &[0, 1],
        dep_type: DepType::Code,
    };
    pub(super) const BTC_TIME_LOCK: Entry = Entry {
        code_hash: h256("0x00cdf8fab0f8ac638758ebf5ea5e4052b1d71e8a77b9f43139718621f6849326"),
        hash_type: HashType::Type,
        dep_tx: h256("0xde0f87878a97500f549418e5d46d2f7704c565a262aa17036c9c1c13ad638529"),
        dep_indices: &[0, 1],
        dep_type: DepType::Code,
    };
    pub(super) const SIGNET_RGBPP_LOCK: Entry = Entry {
        code_hash: h256("0xd07598deec7ce7b5665310386b4abd06a6d48843e953c5cc2112ad0d5a220364"),
        hash_type: HashType::Type,
        dep_tx: h256("0x61efdeddbaa0bb4132c0eb174b3e8002ff5ec430f61ba46f30768d683c516eec"),
        dep_indices: &[0, 1],
        dep_type: DepType::Code,
    };
    pub(super) const SIGNET_BTC_TIME_LOCK: Entry = Entry {
        code_hash: h256("0x80a09eca26d77cea1f5a69471c59481be7404febf40ee90f886c36a948385b55"),
        hash_type: HashType::Type,
        dep_tx: h256("0x5364b3535965e9eac9a35dd7af8e9e45a61d30a16e115923c032f80b28783e21"),
        dep_indices: &[0, 1],
        dep_type: DepType::Code,
    };
    pub(super) const SPORE: Entry = Entry {
        code_hash: h256("0x685a60219309029d01310311dba953d67029170ca4848a4ff638e57002130a0d"),
        hash_type: HashType::Data1,
        dep_tx: h256("0x5e8d2a517d50fd4bb4d01737a7952a1f1d35c8afc77240695bb569cd7d9d5a1f"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
    pub(super) const CLUSTER: Entry = Entry {
        code_hash: h256("0x0bbe768b519d8ea7b96d58f1182eb7e6ef96c541fbd9526975077ee09f049058"),
        hash_type: HashType::Data1,
        dep_tx: h256("0xcebb174d6e300e26074aea2f5dbd7f694bb4fe3de52b6dfe205e54f90164510a"),
        dep_indices: &[0],
        dep_type: DepType::Code,
    };
}

/// Script deployments for one network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRegistry {
    network: Network,
    btc_testnet_type: BtcTestnetType,
}

impl ScriptRegistry {
    /// Registry for a network
    pub fn new(network: Network, btc_testnet_type: BtcTestnetType) -> Self {
        Self {
            network,
            btc_testnet_type,
        }
    }

    /// Network this registry resolves against
    pub fn network(&self) -> Network {
        self.network
    }

    fn entry(&self, kind: ScriptKind) -> &'static Entry {
        let signet = self.btc_testnet_type == BtcTestnetType::Signet;
        match (self.network, kind) {
            (Network::Mainnet, ScriptKind::Secp256k1) => &mainnet::SECP256K1,
            (Network::Mainnet, ScriptKind::Xudt) => &mainnet::XUDT,
            (Network::Mainnet, ScriptKind::UniqueType) => &mainnet::UNIQUE_TYPE,
            (Network::Mainnet, ScriptKind::RgbppLock) => &mainnet::RGBPP_LOCK,
            (Network::Mainnet, ScriptKind::BtcTimeLock) => &mainnet::BTC_TIME_LOCK,
            (Network::Mainnet, ScriptKind::Spore) => &mainnet::SPORE,
            (Network::Mainnet, ScriptKind::Cluster) => &mainnet::CLUSTER,
            (Network::Testnet, ScriptKind::Secp256k1) => &testnet::SECP256K1,
            (Network::Testnet, ScriptKind::Xudt) => &testnet::XUDT,
            (Network::Testnet, ScriptKind::UniqueType) => &testnet::UNIQUE_TYPE,
            (Network::Testnet, ScriptKind::RgbppLock) if signet => &testnet::SIGNET_RGBPP_LOCK,
            (Network::Testnet, ScriptKind::RgbppLock) => &testnet::RGBPP_LOCK,
            (Network::Testnet, ScriptKind::BtcTimeLock) if signet => &testnet::SIGNET_BTC_TIME_LOCK,
            (Network::Testnet, ScriptKind::BtcTimeLock) => &testnet::BTC_TIME_LOCK,
            (Network::Testnet, ScriptKind::Spore) => &testnet::SPORE,
            (Network::Testnet, ScriptKind::Cluster) => &testnet::CLUSTER,
        }
    }

    /// Deployment of a script
    pub fn deployment(&self, kind: ScriptKind) -> Deployment {
        let entry = self.entry(kind);
        Deployment {
            code_hash: entry.code_hash,
            hash_type: entry.hash_type,
            cell_deps: self.cell_deps(kind),
        }
    }

    /// Cell deps needed to run a script
    pub fn cell_deps(&self, kind: ScriptKind) -> Vec<CellDep> {
        let entry = self.entry(kind);
        entry
            .dep_indices
            .iter()
            .map(|&index| CellDep::new(OutPoint::new(entry.dep_tx, index), entry.dep_type))
            .collect()
    }

    /// Script of `kind` with the given args
    pub fn script(&self, kind: ScriptKind, args: Vec<u8>) -> Script {
        let entry = self.entry(kind);
        Script::new(entry.code_hash, entry.hash_type, args)
    }

    /// Whether `script` runs the code of `kind`, whatever its args
    pub fn is_kind(&self, script: &Script, kind: ScriptKind) -> bool {
        let entry = self.entry(kind);
        script.code_hash == entry.code_hash && script.hash_type == entry.hash_type
    }

    /// RGB++ lock bound to a BTC outpoint
    pub fn rgbpp_lock(&self, args: &RgbppLockArgs) -> Script {
        self.script(ScriptKind::RgbppLock, args.encode())
    }

    /// BTC time lock releasing to a CKB lock
    pub fn btc_time_lock(&self, args: &BtcTimeLockArgs) -> Script {
        self.script(ScriptKind::BtcTimeLock, args.encode())
    }

    /// xUDT type with the given args
    pub fn xudt_type(&self, args: Vec<u8>) -> Script {
        self.script(ScriptKind::Xudt, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secp_code_hash_shared_across_networks() {
        let main = ScriptRegistry::new(Network::Mainnet, BtcTestnetType::Testnet3);
        let test = ScriptRegistry::new(Network::Testnet, BtcTestnetType::Testnet3);
        assert_eq!(
            main.deployment(ScriptKind::Secp256k1).code_hash,
            test.deployment(ScriptKind::Secp256k1).code_hash
        );
        assert_ne!(
            main.cell_deps(ScriptKind::Secp256k1),
            test.cell_deps(ScriptKind::Secp256k1)
        );
    }

    #[test]
    fn test_signet_overrides_rgbpp_scripts_only() {
        let testnet3 = ScriptRegistry::new(Network::Testnet, BtcTestnetType::Testnet3);
        let signet = ScriptRegistry::new(Network::Testnet, BtcTestnetType::Signet);
        assert_ne!(
            testnet3.deployment(ScriptKind::RgbppLock),
            signet.deployment(ScriptKind::RgbppLock)
        );
        assert_eq!(
            testnet3.deployment(ScriptKind::Xudt),
            signet.deployment(ScriptKind::Xudt)
        );
    }

    #[test]
    fn test_rgbpp_lock_has_code_and_config_deps() {
        let registry = ScriptRegistry::new(Network::Mainnet, BtcTestnetType::Testnet3);
        let deps = registry.cell_deps(ScriptKind::RgbppLock);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].out_point.index, 1);

        let lock = registry.rgbpp_lock(&RgbppLockArgs::placeholder(1));
        assert!(registry.is_kind(&lock, ScriptKind::RgbppLock));
        assert!(!registry.is_kind(&lock, ScriptKind::BtcTimeLock));
    }
}
