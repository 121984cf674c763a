//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models represent records kept in the key-value store.

use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Request for a sign-in nonce.
#[derive(Debug, Deserialize)]
pub struct NonceRequest {
    #[serde(default)]
    pub address: String,
}

/// Response containing the nonce to embed in the challenge message.
#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub success: bool,
    pub nonce: String,
}

/// Request to verify a signed challenge message.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub signature: String, // hex, 65 bytes
    #[serde(default)]
    pub nonce: String,
    #[serde(default, alias = "chainId")]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub message: String,
}

/// Response after successful verification.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub token: String,
    pub user_id: String,
}

/// Profile registration for a wallet that already holds a session.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: String,
    pub redirect: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============================================================================
// Post Models
// ============================================================================

/// Create (no `id`) or update (with `id`) a post.
#[derive(Debug, Deserialize)]
pub struct SavePostRequest {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub status: Option<PostStatus>,
}

/// Post as returned to clients, with its integrity state.
#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: String,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub author_id: String,
    pub updated_at: u64,
    pub sha256: String,
    pub keccak256: String,
    pub verified: bool,
    pub on_chain: bool,
    pub ipfs_cid: String,
    pub contract_tx: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub success: bool,
    pub data: PostView,
}

/// Integrity metadata update. Each field accepts its legacy alias.
#[derive(Debug, Default, Deserialize)]
pub struct IntegrityMetaUpdate {
    #[serde(default, alias = "bcpipfscid", alias = "bcp_ipfs_cid")]
    pub ipfs_cid: Option<String>,
    #[serde(default, alias = "bcpverified", alias = "bcp_verified")]
    pub verified: Option<bool>,
    #[serde(default, alias = "bcp_contract_tx")]
    pub contract_tx: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityMeta {
    pub sha256: String,
    pub ipfs_cid: String,
    pub verified: bool,
    pub contract_tx: String,
}

#[derive(Debug, Serialize)]
pub struct IntegrityMetaResponse {
    pub success: bool,
    pub data: IntegrityMeta,
}

// ============================================================================
// Storage Models
// ============================================================================

/// Live sign-in nonce for one address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNonce {
    pub address: String,
    pub nonce: String,
    pub issued_at: u64,
}

/// Session data as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user_id: String,
    pub address: String,
    pub created_at: u64,
}

/// Wallet-bound identity as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub id: String,
    pub address: String,
    pub display_name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    #[serde(default)]
    pub profile_set: bool,
    pub created_at: u64,
}

/// Post as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPost {
    pub id: String,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub author_id: String,
    pub created_at: u64,
    pub updated_at: u64,
}

// ============================================================================
// Post Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Publish,
    Draft,
    Pending,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Publish => "publish",
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_request_accepts_camel_case_chain_id() {
        let req: VerifyRequest = serde_json::from_str(
            r#"{"address":"0xab","signature":"0x00","nonce":"n","chainId":5,"message":"m"}"#,
        )
        .unwrap();
        assert_eq!(req.chain_id, Some(5));

        let req: VerifyRequest = serde_json::from_str(r#"{"chain_id":1}"#).unwrap();
        assert_eq!(req.chain_id, Some(1));
        assert!(req.address.is_empty());
    }

    #[test]
    fn test_meta_update_accepts_aliases() {
        let update: IntegrityMetaUpdate =
            serde_json::from_str(r#"{"bcp_ipfs_cid":"bafybeigdyrzt","bcpverified":true}"#)
                .unwrap();
        assert_eq!(update.ipfs_cid.as_deref(), Some("bafybeigdyrzt"));
        assert_eq!(update.verified, Some(true));
        assert!(update.contract_tx.is_none());
    }

    #[test]
    fn test_post_status_serde() {
        let status: PostStatus = serde_json::from_str(r#""draft""#).unwrap();
        assert_eq!(status, PostStatus::Draft);
        assert_eq!(serde_json::to_string(&PostStatus::Publish).unwrap(), r#""publish""#);
        assert!(serde_json::from_str::<PostStatus>(r#""trash""#).is_err());
    }
}
