//! Wallet signer capability
//!
//! The signer is whatever the user grants: a browser-extension bridge, a
//! hardware wallet, a test double. It is injected into the session, never
//! looked up from ambient state. Failures come back raw and are classified by
//! the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classifier::RawFailure;
use crate::submitter::EntryFunctionPayload;

/// Account exposed by the signer after a successful connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub address: String,
    #[serde(default, rename = "publicKey", alias = "public_key")]
    pub public_key: Option<String>,
}

/// Signers answer either with a bare hash or with a pending-transaction object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignAndSubmitResponse {
    Hash(String),
    Pending { hash: String },
}

impl SignAndSubmitResponse {
    pub fn into_hash(self) -> String {
        match self {
            Self::Hash(hash) | Self::Pending { hash } => hash,
        }
    }
}

#[async_trait]
pub trait Signer: Send + Sync {
    async fn connect(&self) -> Result<WalletAccount, RawFailure>;

    async fn disconnect(&self) -> Result<(), RawFailure>;

    async fn is_connected(&self) -> bool;

    /// Ask the user to authorize `payload` and broadcast it
    async fn sign_and_submit_transaction(
        &self,
        payload: &EntryFunctionPayload,
    ) -> Result<SignAndSubmitResponse, RawFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_shapes() {
        let bare: SignAndSubmitResponse = serde_json::from_value(json!("0xabc")).unwrap();
        assert_eq!(bare.into_hash(), "0xabc");

        let pending: SignAndSubmitResponse =
            serde_json::from_value(json!({ "hash": "0xdef", "sender": "0x1" })).unwrap();
        assert_eq!(pending.into_hash(), "0xdef");
    }

    #[test]
    fn test_wallet_account_accepts_both_key_spellings() {
        let a: WalletAccount =
            serde_json::from_value(json!({ "address": "0x1", "publicKey": "0xpk" })).unwrap();
        let b: WalletAccount =
            serde_json::from_value(json!({ "address": "0x1", "public_key": "0xpk" })).unwrap();
        assert_eq!(a, b);

        let c: WalletAccount = serde_json::from_value(json!({ "address": "0x1" })).unwrap();
        assert!(c.public_key.is_none());
    }
}
