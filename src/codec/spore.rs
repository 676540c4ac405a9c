//! Spore and cluster cell data.
//!
//! ```text
//! table SporeData   { content_type: Bytes, content: Bytes, cluster_id: BytesOpt }
//! table ClusterData { name: Bytes, description: Bytes }
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::molecule::*;
use crate::error::Result;
use crate::utils::hex;

/// Data of a spore cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SporeData {
    /// MIME type of the content
    pub content_type: String,
    /// Content bytes
    #[serde(with = "hex::bytes")]
    pub content: Vec<u8>,
    /// Cluster the spore belongs to
    #[serde(default, with = "hex::opt_bytes")]
    pub cluster_id: Option<Vec<u8>>,
}

impl SporeData {
    /// Molecule encoding
    pub fn encode(&self) -> Vec<u8> {
        pack_table(&[
            pack_bytes(self.content_type.as_bytes()),
            pack_bytes(&self.content),
            pack_option(self.cluster_id.as_deref().map(pack_bytes)),
        ])
    }

    /// Decode the molecule encoding
    pub fn decode(data: &[u8]) -> Result<Self> {
        let fields = unpack_table(data, 3, "SporeData")?;
        Ok(Self {
            content_type: utf8(unpack_bytes(fields[0], "SporeData.content_type")?, "SporeData.content_type")?,
            content: unpack_bytes(fields[1], "SporeData.content")?,
            cluster_id: unpack_option(fields[2], |f| unpack_bytes(f, "SporeData.cluster_id"))?,
        })
    }
}

/// Data of a cluster cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterData {
    /// Cluster name
    pub name: String,
    /// Cluster description
    pub description: String,
}

impl ClusterData {
    /// Molecule encoding
    pub fn encode(&self) -> Vec<u8> {
        pack_table(&[
            pack_bytes(self.name.as_bytes()),
            pack_bytes(self.description.as_bytes()),
        ])
    }

    /// Decode the molecule encoding
    pub fn decode(data: &[u8]) -> Result<Self> {
        let fields = unpack_table(data, 2, "ClusterData")?;
        Ok(Self {
            name: utf8(unpack_bytes(fields[0], "ClusterData.name")?, "ClusterData.name")?,
            description: utf8(
                unpack_bytes(fields[1], "ClusterData.description")?,
                "ClusterData.description",
            )?,
        })
    }
}

fn utf8(bytes: Vec<u8>, what: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| crate::error::Error::encoding(what, e.to_string()))
}
