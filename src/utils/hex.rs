//! `0x`-prefixed hex helpers and serde adapters matching the CKB JSON-RPC shape.

use crate::error::{Error, Result};

/// Strip an optional `0x` prefix
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Encode bytes as `0x`-prefixed lowercase hex
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed (or bare) hex
pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(strip_0x(s)).map_err(|e| Error::encoding("hex", e.to_string()))
}

/// Serde adapter for `Vec<u8>` as `0x` hex
pub mod bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter for `Vec<Vec<u8>>` as a list of `0x` hex strings
pub mod bytes_vec {
    use serde::{de::Error as _, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for item in value {
            seq.serialize_element(&super::to_hex(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|s| super::from_hex(s).map_err(D::Error::custom))
            .collect()
    }
}

/// Serde adapter for `Option<Vec<u8>>`; `None` is `null`
pub mod opt_bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&super::to_hex(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| super::from_hex(&s).map_err(D::Error::custom))
            .transpose()
    }
}

/// Serde adapter for `u64` as a `0x` hex quantity
pub mod u64_hex {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        u64::from_str_radix(super::strip_0x(&s), 16).map_err(D::Error::custom)
    }
}

/// Serde adapter for `u32` as a `0x` hex quantity
pub mod u32_hex {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let s = String::deserialize(deserializer)?;
        u32::from_str_radix(super::strip_0x(&s), 16).map_err(D::Error::custom)
    }
}
