//! Integrity metadata keys.
//!
//! Each logical field has been stored under several key names over time.
//! Reads take the first alias holding a non-empty value; writes go to every
//! alias so older readers keep working.

use crate::storage::{PostStore, StoreError};

/// One logical metadata field and its ordered key aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaField {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub const SHA256: MetaField = MetaField {
    name: "sha256",
    keys: &["bcpcontentsha256hash", "bcp_content_sha256_hash", "bcpsha256"],
};

pub const KECCAK256: MetaField = MetaField {
    name: "keccak256",
    keys: &["bcp_keccak256"],
};

pub const ON_CHAIN: MetaField = MetaField {
    name: "on_chain",
    keys: &["bcpverified", "bcp_verified"],
};

pub const IPFS_CID: MetaField = MetaField {
    name: "ipfs_cid",
    keys: &["bcpipfscid", "bcp_ipfs_cid"],
};

pub const CONTRACT_TX: MetaField = MetaField {
    name: "contract_tx",
    keys: &["bcp_contract_tx"],
};

/// Stored form of a boolean flag.
pub fn flag_value(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true"))
}

/// First non-empty value among the field's aliases.
pub async fn read(
    posts: &PostStore,
    content_id: &str,
    field: &MetaField,
) -> Result<Option<String>, StoreError> {
    for key in field.keys {
        if let Some(value) = posts.get_meta(content_id, key).await? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Write `value` under every alias of the field.
pub async fn write(
    posts: &PostStore,
    content_id: &str,
    field: &MetaField,
    value: &str,
) -> Result<(), StoreError> {
    for key in field.keys {
        posts.set_meta(content_id, key, value).await?;
    }
    Ok(())
}
