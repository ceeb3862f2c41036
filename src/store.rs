//! Session persistence: the connected wallet address and per-wallet history
//!
//! History lists are stored newest first under `txHistory_<address>`.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::history::{history_key, TransactionHistoryItem};

const CONNECTED_WALLET_KEY: &[u8] = b"connectedWallet";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),
    #[error("history encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("stored value is not valid UTF-8")]
    InvalidUtf8,
}

pub trait SessionStore: Send + Sync {
    fn persisted_address(&self) -> Result<Option<String>, StoreError>;

    fn persist_address(&self, address: &str) -> Result<(), StoreError>;

    fn clear_address(&self) -> Result<(), StoreError>;

    /// History of `wallet_address`, newest first
    fn history(&self, wallet_address: &str) -> Result<Vec<TransactionHistoryItem>, StoreError>;

    /// Prepend `item` to its wallet's history
    fn append_history(&self, item: &TransactionHistoryItem) -> Result<(), StoreError>;
}

/// sled-backed store
pub struct SledStore {
    db: sled::Db,
    session: sled::Tree,
    history: sled::Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let session = db.open_tree("session")?;
        let history = db.open_tree("history")?;
        Ok(Self {
            db,
            session,
            history,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

impl SessionStore for SledStore {
    fn persisted_address(&self) -> Result<Option<String>, StoreError> {
        match self.session.get(CONNECTED_WALLET_KEY)? {
            Some(raw) => String::from_utf8(raw.to_vec())
                .map(Some)
                .map_err(|_| StoreError::InvalidUtf8),
            None => Ok(None),
        }
    }

    fn persist_address(&self, address: &str) -> Result<(), StoreError> {
        self.session.insert(CONNECTED_WALLET_KEY, address.as_bytes())?;
        Ok(())
    }

    fn clear_address(&self) -> Result<(), StoreError> {
        self.session.remove(CONNECTED_WALLET_KEY)?;
        Ok(())
    }

    fn history(&self, wallet_address: &str) -> Result<Vec<TransactionHistoryItem>, StoreError> {
        match self.history.get(history_key(wallet_address))? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn append_history(&self, item: &TransactionHistoryItem) -> Result<(), StoreError> {
        let key = history_key(&item.wallet_address);
        // Compare-and-swap loop so concurrent appends never drop an entry
        loop {
            let current = self.history.get(&key)?;
            let mut items: Vec<TransactionHistoryItem> = match &current {
                Some(raw) => serde_json::from_slice(raw)?,
                None => Vec::new(),
            };
            items.insert(0, item.clone());
            let encoded = serde_json::to_vec(&items)?;

            match self.history.compare_and_swap(&key, current, Some(encoded))? {
                Ok(()) => {
                    debug!(wallet = %item.wallet_address, entries = items.len(), "History entry stored");
                    return Ok(());
                }
                Err(_) => continue,
            }
        }
    }
}

/// In-process store for tests and read-only tooling
#[derive(Debug, Default)]
pub struct MemoryStore {
    address: RwLock<Option<String>>,
    history: DashMap<String, Vec<TransactionHistoryItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn persisted_address(&self) -> Result<Option<String>, StoreError> {
        Ok(self.address.read().clone())
    }

    fn persist_address(&self, address: &str) -> Result<(), StoreError> {
        *self.address.write() = Some(address.to_string());
        Ok(())
    }

    fn clear_address(&self) -> Result<(), StoreError> {
        *self.address.write() = None;
        Ok(())
    }

    fn history(&self, wallet_address: &str) -> Result<Vec<TransactionHistoryItem>, StoreError> {
        Ok(self
            .history
            .get(&history_key(wallet_address))
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    fn append_history(&self, item: &TransactionHistoryItem) -> Result<(), StoreError> {
        self.history
            .entry(history_key(&item.wallet_address))
            .or_default()
            .insert(0, item.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryStatus, RecordType};

    fn item(wallet: &str, title: &str) -> TransactionHistoryItem {
        TransactionHistoryItem::new(wallet, RecordType::Sample, title, "desc", "0xhash")
    }

    fn exercise(store: &dyn SessionStore) {
        assert!(store.persisted_address().unwrap().is_none());
        store.persist_address("0xabc").unwrap();
        assert_eq!(store.persisted_address().unwrap().as_deref(), Some("0xabc"));

        store.append_history(&item("0xabc", "first")).unwrap();
        store
            .append_history(&item("0xabc", "second").with_status(HistoryStatus::Pending))
            .unwrap();
        store.append_history(&item("0xdef", "other")).unwrap();

        let history = store.history("0xabc").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].title, "second");
        assert_eq!(history[0].status, HistoryStatus::Pending);
        assert_eq!(history[1].title, "first");
        assert_eq!(store.history("0xdef").unwrap().len(), 1);
        assert!(store.history("0x999").unwrap().is_empty());

        store.clear_address().unwrap();
        assert!(store.persisted_address().unwrap().is_none());
        // History outlives the session
        assert_eq!(store.history("0xabc").unwrap().len(), 2);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sled_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        exercise(&store);
    }

    #[test]
    fn test_sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.persist_address("0xabc").unwrap();
            store.append_history(&item("0xabc", "kept")).unwrap();
            store.flush().unwrap();
        }

        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.persisted_address().unwrap().as_deref(), Some("0xabc"));
        assert_eq!(store.history("0xabc").unwrap()[0].title, "kept");
    }
}
