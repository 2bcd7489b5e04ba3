//! Deployment address book: network -> contract name -> address.
//!
//! Read at startup by every operation (via [`crate::context::Deployment`]),
//! written only by deployment steps. The file-backed store writes through a
//! temp file and renames, so a crashed or concurrent script run never leaves
//! a half-written book behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use alloy_primitives::Address;

/// `{ network: { contract: address } }`
type AddressBook = BTreeMap<String, BTreeMap<String, Address>>;

/// Address book storage trait
pub trait DeploymentStore: Send + Sync + 'static {
    /// Address recorded for a contract on a network, if any
    fn get(&self, network: &str, contract: &str) -> Result<Option<Address>, StoreError>;
    /// Record (or replace) a contract address on a network
    fn put(&self, network: &str, contract: &str, address: Address) -> Result<(), StoreError>;
    /// Every contract recorded for a network
    fn network(&self, network: &str) -> Result<BTreeMap<String, Address>, StoreError>;
}

/// Errors from address book storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O or lock failure
    #[error("storage error: {0}")]
    Storage(Box<str>),
    /// File contents do not parse as an address book
    #[error("malformed address book: {0}")]
    Malformed(Box<str>),
    /// Lookup for a required contract came back empty
    #[error("no address recorded for {contract} on {network}")]
    Missing {
        /// Network the lookup ran against
        network: Box<str>,
        /// Contract name that was missing
        contract: Box<str>,
    },
}

/// In-memory address book for testing
pub struct InMemoryStore {
    data: RwLock<AddressBook>,
}

impl InMemoryStore {
    /// Empty book
    pub fn new() -> Self {
        Self {
            data: RwLock::new(AddressBook::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentStore for InMemoryStore {
    fn get(&self, network: &str, contract: &str) -> Result<Option<Address>, StoreError> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.get(network).and_then(|n| n.get(contract)).copied())
    }

    fn put(&self, network: &str, contract: &str, address: Address) -> Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        data.entry(network.to_owned())
            .or_default()
            .insert(contract.to_owned(), address);
        Ok(())
    }

    fn network(&self, network: &str) -> Result<BTreeMap<String, Address>, StoreError> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.get(network).cloned().unwrap_or_default())
    }
}

/// JSON-file-backed address book with atomic writes
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the given file; the file may not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<AddressBook, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Malformed(e.to_string().into())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AddressBook::new()),
            Err(e) => Err(StoreError::Storage(e.to_string().into())),
        }
    }

    fn persist(&self, book: &AddressBook) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        serde_json::to_writer_pretty(&mut tmp, book)
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(())
    }
}

impl DeploymentStore for JsonFileStore {
    fn get(&self, network: &str, contract: &str) -> Result<Option<Address>, StoreError> {
        Ok(self
            .load()?
            .get(network)
            .and_then(|n| n.get(contract))
            .copied())
    }

    fn put(&self, network: &str, contract: &str, address: Address) -> Result<(), StoreError> {
        let mut book = self.load()?;
        book.entry(network.to_owned())
            .or_default()
            .insert(contract.to_owned(), address);
        self.persist(&book)
    }

    fn network(&self, network: &str) -> Result<BTreeMap<String, Address>, StoreError> {
        Ok(self.load()?.get(network).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const VAULT: Address = address!("2000000000000000000000000000000000000002");
    const SWAP: Address = address!("3000000000000000000000000000000000000003");

    #[test]
    fn in_memory_roundtrip() {
        let store = InMemoryStore::new();
        store.put("mainnet", "vault", VAULT).unwrap();

        assert_eq!(store.get("mainnet", "vault").unwrap(), Some(VAULT));
        assert_eq!(store.get("mainnet", "swap").unwrap(), None);
        assert_eq!(store.get("kovan", "vault").unwrap(), None);
    }

    #[test]
    fn file_store_roundtrip_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");
        let store = JsonFileStore::new(&path);

        store.put("mainnet", "vault", VAULT).unwrap();
        store.put("mainnet", "swap", SWAP).unwrap();
        store.put("kovan", "vault", SWAP).unwrap();

        assert_eq!(store.get("mainnet", "vault").unwrap(), Some(VAULT));
        assert_eq!(store.network("mainnet").unwrap().len(), 2);

        // On-disk schema is { network: { contract: address } }
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw["mainnet"]["vault"].is_string());
    }

    #[test]
    fn rewrites_replace_rather_than_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");
        let store = JsonFileStore::new(&path);

        store.put("mainnet", "vault", VAULT).unwrap();
        store.put("mainnet", "vault", SWAP).unwrap();

        assert_eq!(store.get("mainnet", "vault").unwrap(), Some(SWAP));
        assert_eq!(store.network("mainnet").unwrap().len(), 1);
    }

    #[test]
    fn malformed_file_is_reported_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.json");
        std::fs::write(&path, b"not json").unwrap();
        let store = JsonFileStore::new(&path);

        assert!(matches!(
            store.get("mainnet", "vault"),
            Err(StoreError::Malformed(_))
        ));
        // A failed load never triggers a write
        assert!(matches!(
            store.put("mainnet", "vault", VAULT),
            Err(StoreError::Malformed(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"not json");
    }
}
