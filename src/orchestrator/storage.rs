//! Secure and ordinary key-value storage contracts (§6, §9). Generalizes
//! this codebase's `storage::DeniableStorage` doc-hidden app contract into
//! concrete, testable traits — replacing the platform JNI Keystore
//! bindings entirely; the host application supplies an implementation
//! backed by whatever secure enclave its platform offers.

use crate::error::StorageError;

#[derive(Default, Clone, Copy)]
pub struct SecureStoreOptions {
    pub require_auth: bool,
}

/// OS-level secure storage (Keychain/Keystore equivalent). Holds the
/// storage-protection passphrase; never holds raw key blobs (§3
/// `UserIdentity`).
pub trait SecureStore: Send + Sync {
    fn get(&self, key: &str, options: SecureStoreOptions) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, key: &str, value: &[u8], options: SecureStoreOptions) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Ordinary application storage for passphrase-protected key blobs.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory test double for both traits, used by this crate's own unit
/// tests and available to host applications writing their own tests.
#[derive(Default)]
pub struct InMemoryStore {
    data: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for InMemoryStore {
    fn get(&self, key: &str, _options: SecureStoreOptions) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8], _options: SecureStoreOptions) -> Result<(), StorageError> {
        self.data.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}
